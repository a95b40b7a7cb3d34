use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Run-scoped seed source for the random variable streams.
///
/// Seeds are handed out sequentially from a calibration base (or a
/// process-unique base when no calibration seed is given), one per
/// constructed variable, so a fixed base reproduces every stream.
#[derive(Debug, Clone)]
pub struct SeedAllocator {
    base: u64,
    allocated: u64,
}

impl SeedAllocator {
    pub fn new(calibration: Option<u64>) -> Self {
        let base = calibration.unwrap_or_else(|| u64::from(std::process::id()));
        SeedAllocator { base, allocated: 0 }
    }

    pub fn base_seed(&self) -> u64 {
        self.base
    }

    pub fn allocate(&mut self) -> u64 {
        let seed = self.base.wrapping_add(self.allocated);
        self.allocated += 1;
        seed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    Uniform,
    Normal,
    Switch,
    OneSwitch,
    Constant,
    UniformConstant,
    NormalConstant,
}

impl DistributionKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "UNIFORM" => Some(DistributionKind::Uniform),
            "NORMAL" => Some(DistributionKind::Normal),
            "SWITCH" => Some(DistributionKind::Switch),
            "ONESWITCH" => Some(DistributionKind::OneSwitch),
            "CONSTANT" => Some(DistributionKind::Constant),
            "UNIFORMCONSTANT" => Some(DistributionKind::UniformConstant),
            "NORMALCONSTANT" => Some(DistributionKind::NormalConstant),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            DistributionKind::Uniform => "UNIFORM",
            DistributionKind::Normal => "NORMAL",
            DistributionKind::Switch => "SWITCH",
            DistributionKind::OneSwitch => "ONESWITCH",
            DistributionKind::Constant => "CONSTANT",
            DistributionKind::UniformConstant => "UNIFORMCONSTANT",
            DistributionKind::NormalConstant => "NORMALCONSTANT",
        }
    }
}

/// Resolves a keyword, substituting Uniform with a warning when the
/// keyword is not recognized.
pub fn kind_or_uniform(keyword: &str, context: &str) -> DistributionKind {
    DistributionKind::from_keyword(keyword).unwrap_or_else(|| {
        eprintln!(
            "WARNING(stressgen): distribution '{keyword}' not supported for {context}, assuming UNIFORM"
        );
        DistributionKind::Uniform
    })
}

pub trait RandomVariable {
    fn bounds(&self) -> (f64, f64);

    /// Draws the next value; `init` marks a generator's first tick.
    fn sample(&mut self, init: bool) -> f64;

    /// Toggles between the configured levels, ignoring distribution shape.
    fn sample_from_previous(&self, previous: f64) -> f64 {
        let (min, max) = self.bounds();
        if previous == max {
            min
        } else {
            max
        }
    }
}

/// `min + u·(max−min)` with `u` uniform in [0, 1). The first tick returns
/// exactly 0 when `min <= 0`, without consuming a draw, keeping initial
/// transients quiescent.
pub struct UniformVariable {
    min: f64,
    max: f64,
    rng: ChaCha8Rng,
}

impl UniformVariable {
    pub fn new(min: f64, max: f64, seed: u64) -> Self {
        UniformVariable {
            min,
            max,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomVariable for UniformVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, init: bool) -> f64 {
        if init && self.min <= 0.0 {
            return 0.0;
        }
        self.rng.gen::<f64>() * (self.max - self.min) + self.min
    }
}

// Two uniform draws shaped into a bell and rescaled by the min/max span.
// The scaling is deliberately not a standard-normal mapping; calibrated
// output depends on this exact form.
fn bell_draw(rng: &mut ChaCha8Rng, min: f64, max: f64) -> f64 {
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen();
    let shaped = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    shaped * (max - min) + min
}

pub struct NormalVariable {
    min: f64,
    max: f64,
    rng: ChaCha8Rng,
}

impl NormalVariable {
    pub fn new(min: f64, max: f64, seed: u64) -> Self {
        NormalVariable {
            min,
            max,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomVariable for NormalVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, init: bool) -> f64 {
        if init && self.min <= 0.0 {
            return 0.0;
        }
        bell_draw(&mut self.rng, self.min, self.max)
    }
}

/// Two-level source; values come only from `sample_from_previous`.
pub struct SwitchVariable {
    min: f64,
    max: f64,
}

impl SwitchVariable {
    pub fn new(min: f64, max: f64) -> Self {
        SwitchVariable { min, max }
    }
}

impl RandomVariable for SwitchVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, _init: bool) -> f64 {
        0.0
    }
}

/// Two-level source whose generator latches it off permanently after a
/// configured time; identical draw behavior to [`SwitchVariable`].
pub struct OneSwitchVariable {
    min: f64,
    max: f64,
}

impl OneSwitchVariable {
    pub fn new(min: f64, max: f64) -> Self {
        OneSwitchVariable { min, max }
    }
}

impl RandomVariable for OneSwitchVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, _init: bool) -> f64 {
        0.0
    }
}

pub struct ConstantVariable {
    value: f64,
}

impl ConstantVariable {
    pub fn new(value: f64) -> Self {
        ConstantVariable { value }
    }
}

impl RandomVariable for ConstantVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.value, self.value)
    }

    fn sample(&mut self, _init: bool) -> f64 {
        self.value
    }
}

/// One uniform draw taken at construction and held for the entire run.
pub struct UniformConstantVariable {
    min: f64,
    max: f64,
    value: f64,
}

impl UniformConstantVariable {
    pub fn new(min: f64, max: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let value = rng.gen::<f64>() * (max - min) + min;
        UniformConstantVariable { min, max, value }
    }
}

impl RandomVariable for UniformConstantVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, _init: bool) -> f64 {
        self.value
    }
}

/// One bell-shaped draw taken at construction and held for the entire run.
pub struct NormalConstantVariable {
    min: f64,
    max: f64,
    value: f64,
}

impl NormalConstantVariable {
    pub fn new(min: f64, max: f64, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let value = bell_draw(&mut rng, min, max);
        NormalConstantVariable { min, max, value }
    }
}

impl RandomVariable for NormalConstantVariable {
    fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    fn sample(&mut self, _init: bool) -> f64 {
        self.value
    }
}

/// Builds a variable of the requested kind, consuming exactly one
/// allocator seed so stream numbering stays position-stable across all
/// kinds, including the ones that never draw.
pub fn build_variable(
    kind: DistributionKind,
    name: &str,
    min: f64,
    max: f64,
    seeds: &mut SeedAllocator,
) -> Box<dyn RandomVariable> {
    if min > max {
        eprintln!("WARNING(stressgen): min/max disagree for variable {name}");
    }
    let seed = seeds.allocate();
    match kind {
        DistributionKind::Uniform => Box::new(UniformVariable::new(min, max, seed)),
        DistributionKind::Normal => Box::new(NormalVariable::new(min, max, seed)),
        DistributionKind::Switch => Box::new(SwitchVariable::new(min, max)),
        DistributionKind::OneSwitch => Box::new(OneSwitchVariable::new(min, max)),
        DistributionKind::Constant => Box::new(ConstantVariable::new(min)),
        DistributionKind::UniformConstant => {
            Box::new(UniformConstantVariable::new(min, max, seed))
        }
        DistributionKind::NormalConstant => Box::new(NormalConstantVariable::new(min, max, seed)),
    }
}
