use crate::GenError;

/// Tolerance used when comparing breakpoint times and change triggers.
pub const TIME_RESOLUTION: f64 = 1e-5;
/// Flat hold appended before and after a chunk's active content [s].
pub const TIME_PAD: f64 = 5.0;
/// Hard ceiling on breakpoints per curve, bounds consolidation memory.
pub const MAX_BREAKPOINTS: usize = 50_000;

/// A piecewise-linear curve as ordered (time, value) breakpoints.
///
/// Times are strictly increasing; curves are never empty once built.
#[derive(Debug, Clone)]
pub struct BreakpointCurve {
    name: String,
    curve_type: i32,
    times: Vec<f64>,
    values: Vec<f64>,
}

/// One curve re-based onto a chunk window, with lead-in and trailing pads.
///
/// `constant` marks a curve whose value never changes across the window
/// interior; such curves carry no points and are omitted from output.
#[derive(Debug, Clone)]
pub struct WindowSlice {
    pub initial_value: f64,
    pub points: Vec<(f64, f64)>,
    pub constant: bool,
}

impl BreakpointCurve {
    pub fn new(name: impl Into<String>, curve_type: i32) -> Self {
        BreakpointCurve {
            name: name.into(),
            curve_type,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn curve_type(&self) -> i32 {
        self.curve_type
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn time(&self, index: usize) -> f64 {
        self.times[index]
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn last_value(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Appends a breakpoint; time must exceed the last stored time.
    pub fn append(&mut self, time: f64, value: f64) -> Result<(), GenError> {
        if self.times.len() >= MAX_BREAKPOINTS {
            return Err(GenError::TooManyBreakpoints {
                name: self.name.clone(),
                max: MAX_BREAKPOINTS,
            });
        }
        if let Some(&last) = self.times.last() {
            if time <= last {
                return Err(GenError::TimeOrder {
                    name: self.name.clone(),
                    index: self.times.len(),
                    time,
                });
            }
        }
        self.times.push(time);
        self.values.push(value);
        Ok(())
    }

    fn insert(&mut self, index: usize, time: f64, value: f64) -> Result<(), GenError> {
        if self.times.len() >= MAX_BREAKPOINTS {
            return Err(GenError::TooManyBreakpoints {
                name: self.name.clone(),
                max: MAX_BREAKPOINTS,
            });
        }
        self.times.insert(index, time);
        self.values.insert(index, value);
        Ok(())
    }

    /// Largest index whose time is at most `t` plus tolerance, or `None`
    /// when `t` precedes the first breakpoint.
    pub fn find_place(&self, t: f64) -> Option<usize> {
        let n = self.times.partition_point(|&x| x <= t + TIME_RESOLUTION);
        if n == 0 {
            None
        } else {
            Some(n - 1)
        }
    }

    /// Linear interpolation, flat-extrapolating beyond either end.
    pub fn interpolate(&self, t: f64) -> f64 {
        match self.find_place(t) {
            None => self.values[0],
            Some(i) if i + 1 < self.times.len() => {
                let t0 = self.times[i];
                let t1 = self.times[i + 1];
                (t - t0) / (t1 - t0) * (self.values[i + 1] - self.values[i]) + self.values[i]
            }
            Some(_) => self.values[self.values.len() - 1],
        }
    }

    /// Merges breakpoint timelines so both curves end up with the union of
    /// the two original time sets, each inserted value taken from the
    /// receiving curve's own interpolation.
    ///
    /// The earlier-ending curve is first flat-extended to the later final
    /// time. Aliasing the two arguments is unrepresentable here.
    pub fn consolidate(&mut self, other: &mut BreakpointCurve) -> Result<(), GenError> {
        let self_end = self.last_time();
        let other_end = other.last_time();
        if self_end < other_end {
            let held = self.last_value();
            self.append(other_end, held)?;
        } else if self_end > other_end {
            let held = other.last_value();
            other.append(self_end, held)?;
        }
        Self::insert_missing(self, other)?;
        Self::insert_missing(other, self)?;
        Ok(())
    }

    fn insert_missing(dst: &mut BreakpointCurve, src: &BreakpointCurve) -> Result<(), GenError> {
        for i in 0..src.len() {
            let t = src.times[i];
            match dst.find_place(t) {
                Some(j) if (t - dst.times[j]).abs() < TIME_RESOLUTION => {}
                Some(j) => {
                    let v = dst.interpolate(t);
                    dst.insert(j + 1, t, v)?;
                }
                None => {
                    let v = dst.values[0];
                    dst.insert(0, t, v)?;
                }
            }
        }
        Ok(())
    }

    /// Extracts the sub-curve over `[begin, end]`, re-based so the first
    /// retained sample sits behind a flat lead-in pad, with a flat trailing
    /// pad appended.
    pub fn extract_window(&self, begin: f64, end: f64) -> WindowSlice {
        let j_begin = self.find_place(begin);
        let j_end = self.find_place(end).max(j_begin);
        let anchor = j_begin.unwrap_or(0);
        let initial_value = self.values[anchor];

        let Some(j_end) = j_end else {
            return WindowSlice {
                initial_value,
                points: Vec::new(),
                constant: true,
            };
        };

        let body_start = j_begin.map_or(0, |j| j + 1);
        let changes = (body_start..j_end)
            .filter(|&k| k > 0)
            .any(|k| self.values[k] != self.values[k - 1]);
        if !changes {
            return WindowSlice {
                initial_value,
                points: Vec::new(),
                constant: true,
            };
        }

        let mut points = Vec::with_capacity(j_end - body_start + 4);
        points.push((0.0, initial_value));
        points.push((TIME_PAD, initial_value));
        for k in body_start..=j_end {
            points.push((self.times[k] - begin + TIME_PAD, self.values[k]));
        }
        let held = points[points.len() - 1].1;
        points.push((end - begin + 4.0 * TIME_PAD, held));

        WindowSlice {
            initial_value,
            points,
            constant: false,
        }
    }
}
