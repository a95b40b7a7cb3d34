use std::collections::HashMap;

use crate::baseline::BaselineSet;
use crate::curve::BreakpointCurve;
use crate::generator::RandomSpecSet;
use crate::GenError;

/// Trailing hold appended past the run duration on pass-through curves so
/// chunking never runs off their end [s].
pub const PASS_THROUGH_TAIL: f64 = 10.0;

/// The assembled run: pass-through baseline curves plus the merged
/// baseline+delta curves, sharing one run duration.
#[derive(Debug, Clone)]
pub struct CompositeCurveSet {
    pub base_name: String,
    pub random_name: String,
    pub run_duration: f64,
    pub curves: Vec<BreakpointCurve>,
}

/// Drives every generator across the run and merges the results with the
/// baseline. Name matching is checked before any generator is ticked.
pub fn assemble(base: BaselineSet, spec: RandomSpecSet) -> Result<CompositeCurveSet, GenError> {
    for gen in &spec.generators {
        if base.find_curve(gen.name()).is_none() {
            return Err(GenError::UnmatchedVariable(gen.name().to_string()));
        }
    }

    let BaselineSet {
        name: base_name,
        run_duration,
        curves: base_curves,
    } = base;
    let RandomSpecSet {
        name: random_name,
        generators,
    } = spec;

    let mut matched: HashMap<String, BreakpointCurve> = HashMap::new();
    let mut curves = Vec::with_capacity(base_curves.len());
    for curve in base_curves {
        if generators.iter().any(|g| g.name() == curve.name()) {
            matched.insert(curve.name().to_string(), curve);
        } else {
            let mut held = curve;
            let tail_time = held.last_time().max(run_duration) + PASS_THROUGH_TAIL;
            let tail_value = held.last_value();
            held.append(tail_time, tail_value)?;
            curves.push(held);
        }
    }

    for mut gen in generators {
        let mut baseline = matched
            .remove(gen.name())
            .ok_or_else(|| GenError::UnmatchedVariable(gen.name().to_string()))?;

        let mut generated = BreakpointCurve::new(gen.name(), baseline.curve_type());
        let update = gen.update();
        let mut tick: u64 = 0;
        let mut t = 0.0;
        while t < run_duration {
            let init = tick == 0;
            t = update * tick as f64;
            tick += 1;
            let value = gen.step(t, init);
            generated.append(t, value)?;
        }

        generated.consolidate(&mut baseline)?;
        debug_assert_eq!(generated.len(), baseline.len());

        // the generated waveform is a delta on the nominal curve
        let mut merged = BreakpointCurve::new(generated.name(), generated.curve_type());
        for i in 0..generated.len() {
            merged.append(generated.time(i), baseline.value(i) + generated.value(i))?;
        }
        curves.push(merged);
    }

    Ok(CompositeCurveSet {
        base_name,
        random_name,
        run_duration,
        curves,
    })
}

#[cfg(test)]
mod tests {
    use super::{assemble, PASS_THROUGH_TAIL};
    use crate::baseline::BaselineSet;
    use crate::generator::RandomSpecSet;
    use crate::random::SeedAllocator;
    use crate::tokens::TokenFile;
    use crate::GenError;

    const BASE: &str = "\
$FTIME 20
$INPUT alt 0 2
0 1000
20 1000
$INPUT fixed 1 2
0 3.5
12 3.5
";

    fn build(base: &str, random: &str, seed: u64) -> Result<super::CompositeCurveSet, GenError> {
        let base = BaselineSet::from_tokens(&TokenFile::from_contents("g.def", base))?;
        let mut seeds = SeedAllocator::new(Some(seed));
        let spec =
            RandomSpecSet::from_tokens(&TokenFile::from_contents("g.mtc", random), &mut seeds)?;
        assemble(base, spec)
    }

    const ALT_SPEC: &str = "alt 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100";

    #[test]
    fn unmatched_generator_fails_before_synthesis() {
        let err = build(BASE, "bogus 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100", 11)
            .unwrap_err();
        assert!(matches!(err, GenError::UnmatchedVariable(name) if name == "BOGUS"));
    }

    #[test]
    fn pass_through_curves_get_a_trailing_hold() {
        let set = build(BASE, ALT_SPEC, 11).unwrap();
        let fixed = set
            .curves
            .iter()
            .find(|c| c.name() == "FIXED")
            .expect("pass-through curve retained");
        assert_eq!(fixed.last_time(), 20.0 + PASS_THROUGH_TAIL);
        assert_eq!(fixed.last_value(), 3.5);
    }

    #[test]
    fn merged_curve_spans_the_run_and_rides_the_baseline() {
        let set = build(BASE, ALT_SPEC, 11).unwrap();
        assert_eq!(set.run_duration, 20.0);
        let alt = set.curves.iter().find(|c| c.name() == "ALT").unwrap();
        assert_eq!(alt.time(0), 0.0);
        assert!(alt.last_time() >= 20.0);
        // first tick is quiescent, so the start value is the baseline's
        assert_eq!(alt.value(0), 1000.0);
        for i in 0..alt.len() {
            let v = alt.value(i);
            assert!((900.0..=1100.0).contains(&v), "value {v} escaped the band");
        }
    }

    #[test]
    fn reassembly_with_the_same_seed_is_identical() {
        let a = build(BASE, ALT_SPEC, 11).unwrap();
        let b = build(BASE, ALT_SPEC, 11).unwrap();
        let ca = a.curves.iter().find(|c| c.name() == "ALT").unwrap();
        let cb = b.curves.iter().find(|c| c.name() == "ALT").unwrap();
        assert_eq!(ca.len(), cb.len());
        for i in 0..ca.len() {
            assert_eq!(ca.value(i), cb.value(i));
        }
    }

    #[test]
    fn differing_seeds_produce_differing_waveforms() {
        let a = build(BASE, ALT_SPEC, 11).unwrap();
        let b = build(BASE, ALT_SPEC, 12).unwrap();
        let ca = a.curves.iter().find(|c| c.name() == "ALT").unwrap();
        let cb = b.curves.iter().find(|c| c.name() == "ALT").unwrap();
        let identical =
            ca.len() == cb.len() && (0..ca.len()).all(|i| ca.value(i) == cb.value(i));
        assert!(!identical);
    }
}
