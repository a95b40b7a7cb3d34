use crate::curve::TIME_RESOLUTION;
use crate::random::{
    build_variable, kind_or_uniform, DistributionKind, RandomVariable, SeedAllocator,
};
use crate::tokens::{TokenFile, TokenLine};
use crate::GenError;

/// Field counts selecting the randomization line layout.
pub const REGULAR_FIELDS: usize = 16;
pub const SWITCH_FIELDS: usize = 7;
pub const CONSTANT_FIELDS: usize = 6;

/// Most variables a single randomization file may define.
pub const MAX_SPEC_VARIABLES: usize = 75;

/// One randomized delta waveform source: four random variables feeding a
/// sample-and-hold stage and a slew-rate limiter, ticked at a fixed period.
pub struct WaveformGenerator {
    name: String,
    kind: DistributionKind,
    update: f64,
    abs_min: f64,
    abs_max: f64,
    initial_value: f64,
    off_time: f64,
    input: Box<dyn RandomVariable>,
    rise: Box<dyn RandomVariable>,
    fall: Box<dyn RandomVariable>,
    hold: Box<dyn RandomVariable>,
    // sample-and-hold state
    held_value: f64,
    frozen: bool,
    hold_timer: i64,
    // slew limiter state
    rise_rate: f64,
    fall_rate: f64,
    limiter_state: f64,
    limited: bool,
    // last emitted (clamped) output and the latched switch candidate
    last_output: f64,
    switch_target: f64,
}

impl std::fmt::Debug for WaveformGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformGenerator")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("update", &self.update)
            .field("abs_min", &self.abs_min)
            .field("abs_max", &self.abs_max)
            .field("initial_value", &self.initial_value)
            .field("off_time", &self.off_time)
            .field("held_value", &self.held_value)
            .field("frozen", &self.frozen)
            .field("hold_timer", &self.hold_timer)
            .field("rise_rate", &self.rise_rate)
            .field("fall_rate", &self.fall_rate)
            .field("limiter_state", &self.limiter_state)
            .field("limited", &self.limited)
            .field("last_output", &self.last_output)
            .field("switch_target", &self.switch_target)
            .finish()
    }
}

/// Monostable retrigger timer.
///
/// Non-negative state counts down an armed hold; negative state counts up
/// toward re-arming. A trigger in either region re-arms the full on-delay.
/// The integer truncations mirror the rig tooling this feeds.
fn retrigger_timer(
    trigger: bool,
    update: f64,
    on_delay: f64,
    off_delay: f64,
    init_output: bool,
    state: i64,
    init: bool,
) -> (bool, i64) {
    let armed = (on_delay / update) as i64;
    let disarmed = -((off_delay / update + 1.0) as i64);
    if init {
        let state = if init_output { armed } else { disarmed };
        return (init_output, state);
    }
    let mut state = state;
    if state >= 0 {
        if trigger {
            state = armed;
        } else {
            state -= 1;
            if state < 0 {
                state = disarmed;
            }
        }
    } else if trigger {
        state += 1;
        if state >= 0 {
            state = armed;
        }
    } else {
        state = disarmed;
    }
    (state >= 0, state)
}

impl WaveformGenerator {
    pub fn from_tokens(
        line: &TokenLine,
        file: &str,
        seeds: &mut SeedAllocator,
    ) -> Result<Self, GenError> {
        let tokens = &line.tokens;
        let name = tokens
            .first()
            .cloned()
            .ok_or_else(|| GenError::parse(file, line.line_no, 1, "empty variable line"))?;

        if tokens.len() == REGULAR_FIELDS {
            let update = line.parse_f64(file, 1)?;
            if update <= 0.0 {
                return Err(GenError::BadUpdateRate { name, update });
            }
            let dist = tokens[2].as_str();
            if dist == "SWITCH" || dist == "ONESWITCH" {
                return Err(GenError::parse(
                    file,
                    line.line_no,
                    3,
                    "switch variables use the 7-field layout",
                ));
            }
            let in_min = line.parse_f64(file, 3)?;
            let in_max = line.parse_f64(file, 4)?;
            let rise_min = line.parse_f64(file, 6)?;
            let rise_max = line.parse_f64(file, 7)?;
            let fall_min = line.parse_f64(file, 9)?;
            let fall_max = line.parse_f64(file, 10)?;
            let hold_min = line.parse_f64(file, 12)?;
            let hold_max = line.parse_f64(file, 13)?;
            let abs_min = line.parse_f64(file, 14)?;
            let abs_max = line.parse_f64(file, 15)?;

            let kind = kind_or_uniform(dist, &name);
            let input = build_variable(kind, &name, in_min, in_max, seeds);
            let rise_kind = kind_or_uniform(&tokens[5], "RISE");
            let rise = build_variable(rise_kind, "RISE", rise_min, rise_max, seeds);
            let fall_kind = kind_or_uniform(&tokens[8], "FALL");
            let fall = build_variable(fall_kind, "FALL", fall_min, fall_max, seeds);
            let hold_kind = kind_or_uniform(&tokens[11], "HOLD");
            let hold = build_variable(hold_kind, "HOLD", hold_min, hold_max, seeds);

            Ok(Self::assemble(
                name, kind, update, abs_min, abs_max, 0.0, 0.0, input, rise, fall, hold,
            ))
        } else if tokens.len() == SWITCH_FIELDS {
            let keyword = tokens[2].as_str();
            let kind = match keyword {
                "SWITCH" => DistributionKind::Switch,
                "ONESWITCH" => DistributionKind::OneSwitch,
                _ => {
                    return Err(GenError::parse(
                        file,
                        line.line_no,
                        3,
                        format!("expected SWITCH or ONESWITCH, found '{keyword}'"),
                    ))
                }
            };
            let update = line.parse_f64(file, 1)?;
            if update <= 0.0 {
                return Err(GenError::BadUpdateRate { name, update });
            }
            let hold_min = line.parse_f64(file, 4)?;
            let hold_max = line.parse_f64(file, 5)?;
            let last = line.parse_f64(file, 6)?;
            let (initial_value, off_time) = match kind {
                DistributionKind::Switch => (last, 0.0),
                _ => (0.0, last),
            };

            // a toggle must be able to cross the full band in one update
            let toggle_rate = 1.0 / update + 1.0;
            let input = build_variable(kind, &name, -1.0, 1.0, seeds);
            let rise = build_variable(
                DistributionKind::Constant,
                "RISE",
                toggle_rate,
                toggle_rate,
                seeds,
            );
            let fall = build_variable(
                DistributionKind::Constant,
                "FALL",
                -toggle_rate,
                -toggle_rate,
                seeds,
            );
            let hold_kind = kind_or_uniform(&tokens[3], "HOLD");
            let hold = build_variable(hold_kind, "HOLD", hold_min, hold_max, seeds);

            Ok(Self::assemble(
                name,
                kind,
                update,
                0.0,
                1.0,
                initial_value,
                off_time,
                input,
                rise,
                fall,
                hold,
            ))
        } else if tokens.len() == CONSTANT_FIELDS {
            let keyword = tokens[1].as_str();
            let kind = match keyword {
                "UNIFORMCONSTANT" => DistributionKind::UniformConstant,
                "NORMALCONSTANT" => DistributionKind::NormalConstant,
                _ => {
                    return Err(GenError::parse(
                        file,
                        line.line_no,
                        2,
                        format!("expected UNIFORMCONSTANT or NORMALCONSTANT, found '{keyword}'"),
                    ))
                }
            };
            let min = line.parse_f64(file, 2)?;
            let max = line.parse_f64(file, 3)?;
            let abs_min = line.parse_f64(file, 4)?;
            let abs_max = line.parse_f64(file, 5)?;

            let input = build_variable(kind, &name, min, max, seeds);
            let rise = build_variable(DistributionKind::Constant, "RISE", 1.0, 1.0, seeds);
            let fall = build_variable(DistributionKind::Constant, "FALL", -1.0, -1.0, seeds);
            let hold = build_variable(DistributionKind::Constant, "HOLD", 0.0, 0.0, seeds);

            Ok(Self::assemble(
                name, kind, 1.0, abs_min, abs_max, 0.0, 0.0, input, rise, fall, hold,
            ))
        } else {
            Err(GenError::parse(
                file,
                line.line_no,
                1,
                format!("unrecognized variable layout ({} fields)", tokens.len()),
            ))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        name: String,
        kind: DistributionKind,
        update: f64,
        abs_min: f64,
        abs_max: f64,
        initial_value: f64,
        off_time: f64,
        input: Box<dyn RandomVariable>,
        rise: Box<dyn RandomVariable>,
        fall: Box<dyn RandomVariable>,
        hold: Box<dyn RandomVariable>,
    ) -> Self {
        WaveformGenerator {
            name,
            kind,
            update,
            abs_min,
            abs_max,
            initial_value,
            off_time,
            input,
            rise,
            fall,
            hold,
            held_value: 0.0,
            frozen: true,
            hold_timer: 0,
            rise_rate: 0.0,
            fall_rate: 0.0,
            limiter_state: 0.0,
            limited: false,
            last_output: 0.0,
            switch_target: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&self) -> f64 {
        self.update
    }

    pub fn kind(&self) -> DistributionKind {
        self.kind
    }

    /// Advances one update period and returns the emitted value at `t`.
    /// The first call of a run must pass `init`.
    pub fn step(&mut self, t: f64, init: bool) -> f64 {
        let rise_sample = self.rise.sample(init);
        let hold_sample = self.hold.sample(init);
        let fall_sample = self.fall.sample(init);

        let mut output = match self.kind {
            DistributionKind::UniformConstant | DistributionKind::NormalConstant => {
                // the stored construction draw is both input and output
                let value = self.input.sample(init);
                self.limiter_state = value;
                value
            }
            DistributionKind::Switch => {
                let target = if init {
                    self.initial_value
                } else {
                    self.input.sample_from_previous(self.last_output)
                };
                self.rate_limited(target, rise_sample, fall_sample, hold_sample, init)
            }
            DistributionKind::OneSwitch => {
                if init {
                    self.switch_target = 0.0;
                } else if self.last_output == 0.0 {
                    self.switch_target = self.input.sample_from_previous(self.last_output);
                }
                let target = self.switch_target;
                self.rate_limited(target, rise_sample, fall_sample, hold_sample, init)
            }
            _ => {
                let target = self.input.sample(init);
                self.rate_limited(target, rise_sample, fall_sample, hold_sample, init)
            }
        };

        if self.kind == DistributionKind::OneSwitch && t > self.off_time {
            output = 0.0;
        }
        let output = output.clamp(self.abs_min, self.abs_max);
        self.last_output = output;
        output
    }

    fn rate_limited(
        &mut self,
        target: f64,
        rise_sample: f64,
        fall_sample: f64,
        hold_sample: f64,
        init: bool,
    ) -> f64 {
        if init {
            self.limiter_state = target;
        }
        let (held, was_frozen) = self.sample_and_hold(target, hold_sample, init);
        // rise/fall rates stay latched for the duration of a hold
        if !was_frozen {
            self.rise_rate = rise_sample;
            self.fall_rate = fall_sample;
        }
        let mut output = held;
        self.limited = false;
        let output_max = self.update * self.rise_rate + self.limiter_state;
        let output_min = self.update * self.fall_rate + self.limiter_state;
        if output > output_max {
            output = output_max;
            self.limited = true;
        } else if output < output_min {
            output = output_min;
            self.limited = true;
        }
        self.limiter_state = output;
        output
    }

    fn sample_and_hold(&mut self, target: f64, hold_sample: f64, init: bool) -> (f64, bool) {
        if init {
            self.held_value = target;
            self.frozen = true;
        }
        let output = if self.frozen { self.held_value } else { target };
        // trigger when the released value wants to move, or when the
        // previous tick's limiter clamped
        let trigger = (!self.frozen && (output - self.held_value).abs() >= TIME_RESOLUTION)
            || self.limited;
        let (hold_active, timer) = retrigger_timer(
            trigger,
            self.update,
            hold_sample,
            0.0,
            true,
            self.hold_timer,
            init,
        );
        self.hold_timer = timer;
        let was_frozen = self.frozen;
        self.held_value = output;
        self.frozen = hold_active;
        (output, was_frozen)
    }
}

/// The parsed randomization specification: one generator per input line,
/// constructed in file order so seed allocation is position-stable.
pub struct RandomSpecSet {
    pub name: String,
    pub generators: Vec<WaveformGenerator>,
}

impl RandomSpecSet {
    pub fn from_tokens(file: &TokenFile, seeds: &mut SeedAllocator) -> Result<Self, GenError> {
        let mut generators = Vec::new();
        for line in &file.lines {
            if generators.len() >= MAX_SPEC_VARIABLES {
                return Err(GenError::parse(
                    &file.name,
                    line.line_no,
                    1,
                    format!("more than {MAX_SPEC_VARIABLES} variables"),
                ));
            }
            generators.push(WaveformGenerator::from_tokens(line, &file.name, seeds)?);
        }
        Ok(RandomSpecSet {
            name: file.name.clone(),
            generators,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{RandomSpecSet, WaveformGenerator};
    use crate::random::{DistributionKind, SeedAllocator};
    use crate::tokens::TokenFile;
    use crate::GenError;

    fn generator(line: &str, seed: u64) -> Result<WaveformGenerator, GenError> {
        let file = TokenFile::from_contents("t.mtc", line);
        let mut seeds = SeedAllocator::new(Some(seed));
        WaveformGenerator::from_tokens(&file.lines[0], "t.mtc", &mut seeds)
    }

    fn drive(gen: &mut WaveformGenerator, ticks: usize) -> Vec<f64> {
        (0..ticks)
            .map(|i| gen.step(i as f64 * gen.update(), i == 0))
            .collect()
    }

    const REGULAR: &str = "sig 1 UNIFORM -50 50 UNIFORM 3 3 UNIFORM -2 -2 UNIFORM 2 2 -1000 1000";

    #[test]
    fn slew_rate_bounds_every_step() {
        let mut gen = generator(REGULAR, 11).unwrap();
        let out = drive(&mut gen, 64);
        assert_eq!(out[0], 0.0);
        for k in 1..out.len() {
            let delta = out[k] - out[k - 1];
            assert!(delta <= 3.0 + 1e-9, "rise violated at {k}: {delta}");
            assert!(delta >= -2.0 - 1e-9, "fall violated at {k}: {delta}");
        }
    }

    #[test]
    fn output_holds_between_releases() {
        // generous rates so targets are reached in one step, hold of 2
        let line = "sig 1 UNIFORM 1 9 UNIFORM 100 100 UNIFORM -100 -100 UNIFORM 2 2 -1000 1000";
        let mut gen = generator(line, 3).unwrap();
        let out = drive(&mut gen, 16);
        for block in out.chunks(4) {
            for v in block {
                assert_eq!(*v, block[0]);
            }
        }
        assert_ne!(out[0], out[4]);
    }

    #[test]
    fn identical_seeds_reproduce_identical_waveforms() {
        let mut a = generator(REGULAR, 11).unwrap();
        let mut b = generator(REGULAR, 11).unwrap();
        assert_eq!(drive(&mut a, 48), drive(&mut b, 48));
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = generator(REGULAR, 11).unwrap();
        let mut b = generator(REGULAR, 12).unwrap();
        assert_ne!(drive(&mut a, 48), drive(&mut b, 48));
    }

    #[test]
    fn switch_starts_at_initial_value_and_stays_two_level() {
        let mut gen = generator("sw 1 SWITCH UNIFORM 1 5 1", 7).unwrap();
        let out = drive(&mut gen, 40);
        assert_eq!(out[0], 1.0);
        assert!(out.iter().all(|v| *v == 0.0 || *v == 1.0));
        assert!(out.contains(&0.0));
    }

    #[test]
    fn oneswitch_turns_on_then_latches_off_permanently() {
        let mut gen = generator("msw 1 ONESWITCH UNIFORM 1 5 10", 5).unwrap();
        let out = drive(&mut gen, 32);
        assert_eq!(out[0], 0.0);
        assert!(out.iter().all(|v| *v == 0.0 || *v == 1.0));
        assert!(out[..11].contains(&1.0), "never switched on before off time");
        assert!(out[11..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn constant_kind_emits_one_draw_forever() {
        let mut gen = generator("dtamb NORMALCONSTANT -20 20 -119 44", 9).unwrap();
        let out = drive(&mut gen, 8);
        assert!(out.iter().all(|v| *v == out[0]));
        assert!((-119.0..=44.0).contains(&out[0]));
    }

    #[test]
    fn non_positive_update_is_rejected() {
        let line = "sig 0 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100";
        assert!(matches!(
            generator(line, 1),
            Err(GenError::BadUpdateRate { .. })
        ));
    }

    #[test]
    fn unknown_distribution_keyword_degrades_to_uniform() {
        let line = "sig 1 SAWTOOTH -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100";
        let gen = generator(line, 1).unwrap();
        assert_eq!(gen.kind(), DistributionKind::Uniform);
    }

    #[test]
    fn malformed_layout_is_a_parse_error() {
        let err = generator("sig 1 UNIFORM -5 5", 1).unwrap_err();
        assert!(matches!(err, GenError::Parse { .. }));
        assert!(err.to_string().contains("t.mtc:1:1"));
    }

    #[test]
    fn seed_consumption_is_position_stable_across_lines() {
        // an unused trailing generator must not disturb earlier streams
        let one = "a 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100";
        let two = "a 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100\n\
                   b 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100";
        let mut seeds_one = SeedAllocator::new(Some(11));
        let mut seeds_two = SeedAllocator::new(Some(11));
        let mut set_one =
            RandomSpecSet::from_tokens(&TokenFile::from_contents("t", one), &mut seeds_one)
                .unwrap();
        let mut set_two =
            RandomSpecSet::from_tokens(&TokenFile::from_contents("t", two), &mut seeds_two)
                .unwrap();
        let a1: Vec<f64> = (0..16)
            .map(|i| set_one.generators[0].step(i as f64, i == 0))
            .collect();
        let a2: Vec<f64> = (0..16)
            .map(|i| set_two.generators[0].step(i as f64, i == 0))
            .collect();
        assert_eq!(a1, a2);
    }
}
