use crate::curve::BreakpointCurve;
use crate::tokens::TokenFile;
use crate::GenError;

/// Most curves a single baseline definition may carry.
pub const MAX_BASELINE_CURVES: usize = 75;

/// The deterministic baseline: named time/value curves sharing one
/// overall run duration.
#[derive(Debug, Clone)]
pub struct BaselineSet {
    pub name: String,
    pub run_duration: f64,
    pub curves: Vec<BreakpointCurve>,
}

impl BaselineSet {
    pub fn from_tokens(file: &TokenFile) -> Result<Self, GenError> {
        let ftime = file
            .lines
            .iter()
            .find(|line| line.tokens[0] == "$FTIME")
            .ok_or_else(|| GenError::parse(&file.name, 0, 1, "$FTIME line not found"))?;
        if ftime.tokens.len() != 2 {
            return Err(GenError::parse(
                &file.name,
                ftime.line_no,
                2,
                "exactly one duration expected after $FTIME",
            ));
        }
        let run_duration = ftime.parse_f64(&file.name, 1)?;
        if run_duration <= 0.0 {
            return Err(GenError::parse(
                &file.name,
                ftime.line_no,
                2,
                "run duration must be positive",
            ));
        }

        let mut curves: Vec<BreakpointCurve> = Vec::new();
        let mut index = 0;
        while index < file.lines.len() {
            let line = &file.lines[index];
            if line.tokens[0] != "$INPUT" {
                index += 1;
                continue;
            }
            if line.tokens.len() < 4 {
                return Err(GenError::parse(
                    &file.name,
                    line.line_no,
                    line.tokens.len() + 1,
                    "expected $INPUT <name> <curve_type> <count>",
                ));
            }
            let curve_name = line.tokens[1].clone();
            let curve_type = line.parse_i32(&file.name, 2)?;
            let count = line.parse_usize(&file.name, 3)?;
            if count == 0 {
                return Err(GenError::parse(
                    &file.name,
                    line.line_no,
                    4,
                    format!("curve {curve_name} needs at least one point"),
                ));
            }
            if curves.len() >= MAX_BASELINE_CURVES {
                return Err(GenError::parse(
                    &file.name,
                    line.line_no,
                    2,
                    format!("more than {MAX_BASELINE_CURVES} curves"),
                ));
            }

            let mut curve = BreakpointCurve::new(&curve_name, curve_type);
            for _ in 0..count {
                index += 1;
                let point = file.lines.get(index).ok_or_else(|| {
                    GenError::parse(
                        &file.name,
                        line.line_no,
                        1,
                        format!("curve {curve_name} ends before its {count} points"),
                    )
                })?;
                if point.tokens.len() != 2 {
                    return Err(GenError::parse(
                        &file.name,
                        point.line_no,
                        point.tokens.len().min(2) + 1,
                        "expected <time> <value>",
                    ));
                }
                let t = point.parse_f64(&file.name, 0)?;
                let v = point.parse_f64(&file.name, 1)?;
                curve.append(t, v)?;
            }
            curves.push(curve);
            index += 1;
        }

        Ok(BaselineSet {
            name: file.name.clone(),
            run_duration,
            curves,
        })
    }

    pub fn find_curve(&self, name: &str) -> Option<usize> {
        self.curves.iter().position(|c| c.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::BaselineSet;
    use crate::tokens::TokenFile;
    use crate::GenError;

    const PROFILE: &str = "\
# rig warm-up profile
$FTIME 20
$INPUT alt 0 2
0 1000
20 1000
$INPUT xm 3 3
0 0.2
5 0.6
20 0.6
";

    #[test]
    fn parses_duration_and_curves() {
        let set = BaselineSet::from_tokens(&TokenFile::from_contents("g.def", PROFILE)).unwrap();
        assert_eq!(set.run_duration, 20.0);
        assert_eq!(set.curves.len(), 2);
        assert_eq!(set.curves[0].name(), "ALT");
        assert_eq!(set.curves[0].len(), 2);
        assert_eq!(set.curves[1].curve_type(), 3);
        assert_eq!(set.curves[1].value(1), 0.6);
        assert_eq!(set.find_curve("XM"), Some(1));
        assert_eq!(set.find_curve("missing"), None);
    }

    #[test]
    fn missing_ftime_is_fatal() {
        let err =
            BaselineSet::from_tokens(&TokenFile::from_contents("g.def", "$INPUT a 0 1\n0 1\n"))
                .unwrap_err();
        assert!(err.to_string().contains("$FTIME"));
    }

    #[test]
    fn non_increasing_times_are_fatal() {
        let text = "$FTIME 10\n$INPUT a 0 3\n0 1\n5 2\n5 3\n";
        let err = BaselineSet::from_tokens(&TokenFile::from_contents("g.def", text)).unwrap_err();
        assert!(matches!(err, GenError::TimeOrder { .. }));
    }

    #[test]
    fn truncated_block_names_the_header_line() {
        let text = "$FTIME 10\n$INPUT a 0 3\n0 1\n5 2\n";
        let err = BaselineSet::from_tokens(&TokenFile::from_contents("g.def", text)).unwrap_err();
        assert!(err.to_string().contains("before its 3 points"));
    }
}
