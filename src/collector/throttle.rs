use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn next_unit(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Always returns the same draw; lets callers force either branch
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Lets a body run on roughly `probability` of invocations
pub struct Throttle {
    probability: f64,
    rng: Box<dyn RandomSource>,
}

impl Throttle {
    pub fn new(probability: f64) -> Self {
        Self::with_source(probability, Box::new(StdRng::from_entropy()))
    }

    pub fn with_source(probability: f64, rng: Box<dyn RandomSource>) -> Self {
        Self { probability: probability.clamp(0.0, 1.0), rng }
    }

    pub fn should_run(&mut self) -> bool {
        self.rng.next_unit() < self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_draw_forces_both_branches() {
        assert!(Throttle::with_source(0.1, Box::new(FixedRandom(0.05))).should_run());
        assert!(!Throttle::with_source(0.1, Box::new(FixedRandom(0.5))).should_run());
        assert!(!Throttle::with_source(0.0, Box::new(FixedRandom(0.0))).should_run());
        assert!(Throttle::with_source(1.0, Box::new(FixedRandom(0.999))).should_run());
    }

    #[test]
    fn run_fraction_tracks_probability() {
        let mut throttle = Throttle::with_source(0.1, Box::new(StdRng::seed_from_u64(0x5eed)));
        let cycles = 10_000;
        let ran = (0..cycles).filter(|_| throttle.should_run()).count();
        let fraction = ran as f64 / cycles as f64;
        assert!((fraction - 0.1).abs() <= 0.02, "fraction was {}", fraction);
    }
}
