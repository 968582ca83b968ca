//! Continuous generators for inter-arrival and service durations.
//!
//! Every generator owns a seeded [StdRng] so a run is reproducible from its
//! seed. Generators may return zero, negative or non-finite values (a normal
//! distribution does, occasionally); consumers clamp those before they reach
//! the event list.

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Normal};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Source of random durations.
pub trait ContinuousGenerator: Send + std::fmt::Debug {
    /// Draw the next duration.
    fn sample(&mut self) -> f64;

    /// Nominal mean of the underlying distribution.
    fn mean(&self) -> f64;

    /// Seed the generator was built with.
    fn seed(&self) -> u64;
}

/// Negative exponential durations with the given mean.
#[derive(Debug, Clone)]
pub struct NegExpGenerator {
    mean: f64,
    seed: u64,
    dist: Exp<f64>,
    rng: StdRng,
}

impl NegExpGenerator {
    pub fn new(mean: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(mean.is_finite() && mean > 0.0) {
            return Err(invalid("negexp", format!("mean must be positive, got {mean}")));
        }
        let dist = Exp::new(1.0 / mean)
            .map_err(|e| invalid("negexp", format!("rate 1/{mean}: {e}")))?;
        Ok(Self {
            mean,
            seed,
            dist,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl ContinuousGenerator for NegExpGenerator {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Normally distributed durations. Can produce non-positive samples.
#[derive(Debug, Clone)]
pub struct NormalGenerator {
    mean: f64,
    seed: u64,
    dist: Normal<f64>,
    rng: StdRng,
}

impl NormalGenerator {
    pub fn new(mean: f64, std_dev: f64, seed: u64) -> Result<Self, ConfigError> {
        if !mean.is_finite() {
            return Err(invalid("normal", format!("mean must be finite, got {mean}")));
        }
        let dist = Normal::new(mean, std_dev)
            .map_err(|e| invalid("normal", format!("std_dev {std_dev}: {e}")))?;
        Ok(Self {
            mean,
            seed,
            dist,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl ContinuousGenerator for NormalGenerator {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Uniform durations in `[min, max]`.
#[derive(Debug, Clone)]
pub struct UniformGenerator {
    min: f64,
    max: f64,
    seed: u64,
    dist: Uniform<f64>,
    rng: StdRng,
}

impl UniformGenerator {
    pub fn new(min: f64, max: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(invalid(
                "uniform",
                format!("bounds must satisfy 0 <= min <= max, got [{min}, {max}]"),
            ));
        }
        Ok(Self {
            min,
            max,
            seed,
            dist: Uniform::new_inclusive(min, max),
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl ContinuousGenerator for UniformGenerator {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Always returns the same value. Accepts any value so tests can force
/// degenerate samples.
#[derive(Debug, Clone, Copy)]
pub struct ConstantGenerator {
    pub value: f64,
}

impl ConstantGenerator {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl ContinuousGenerator for ConstantGenerator {
    fn sample(&mut self) -> f64 {
        self.value
    }

    fn mean(&self) -> f64 {
        self.value
    }

    fn seed(&self) -> u64 {
        0
    }
}

/// Scales a base generator by a server speed factor: a factor of 2.0 halves
/// every duration. Non-positive or non-finite factors fall back to 1.0.
#[derive(Debug)]
pub struct SpeedAdjusted {
    base: Box<dyn ContinuousGenerator>,
    speed_factor: f64,
}

impl SpeedAdjusted {
    pub fn new(base: Box<dyn ContinuousGenerator>, speed_factor: f64) -> Self {
        let speed_factor = if speed_factor.is_finite() && speed_factor > 0.0 {
            speed_factor
        } else {
            1.0
        };
        Self { base, speed_factor }
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }
}

impl ContinuousGenerator for SpeedAdjusted {
    fn sample(&mut self) -> f64 {
        self.base.sample() / self.speed_factor
    }

    fn mean(&self) -> f64 {
        self.base.mean() / self.speed_factor
    }

    fn seed(&self) -> u64 {
        self.base.seed()
    }
}

/// Serializable distribution choice, as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionOptions {
    NegExp { mean: f64 },
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
    Constant { value: f64 },
}

impl DistributionOptions {
    pub fn neg_exp(mean: f64) -> Self {
        Self::NegExp { mean }
    }

    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self::Normal { mean, std_dev }
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Self::Uniform { min, max }
    }

    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    /// Nominal mean of the configured distribution.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::NegExp { mean } | Self::Normal { mean, .. } => mean,
            Self::Uniform { min, max } => (min + max) / 2.0,
            Self::Constant { value } => value,
        }
    }

    /// Checks the parameters; `name` identifies the setting in the error.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let bad = |reason: String| ConfigError::InvalidDistribution {
            name: name.to_string(),
            reason,
        };
        match *self {
            Self::NegExp { mean } if !(mean.is_finite() && mean > 0.0) => {
                Err(bad(format!("negexp mean must be positive, got {mean}")))
            }
            Self::Normal { mean, std_dev }
                if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 =>
            {
                Err(bad(format!(
                    "normal needs a finite mean and std_dev >= 0, got ({mean}, {std_dev})"
                )))
            }
            Self::Uniform { min, max }
                if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max =>
            {
                Err(bad(format!("uniform needs 0 <= min <= max, got [{min}, {max}]")))
            }
            Self::Constant { value } if !(value.is_finite() && value >= 0.0) => {
                Err(bad(format!("constant must be non-negative, got {value}")))
            }
            _ => Ok(()),
        }
    }

    pub fn to_generator(&self, seed: u64) -> Result<Box<dyn ContinuousGenerator>, ConfigError> {
        Ok(match *self {
            Self::NegExp { mean } => Box::new(NegExpGenerator::new(mean, seed)?),
            Self::Normal { mean, std_dev } => Box::new(NormalGenerator::new(mean, std_dev, seed)?),
            Self::Uniform { min, max } => Box::new(UniformGenerator::new(min, max, seed)?),
            Self::Constant { value } => Box::new(ConstantGenerator::new(value)),
        })
    }
}

fn invalid(name: &str, reason: String) -> ConfigError {
    ConfigError::InvalidDistribution {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_generator_repeats() {
        let mut gen = ConstantGenerator::new(5.0);
        assert_eq!(gen.sample(), 5.0);
        assert_eq!(gen.sample(), 5.0);
        assert_eq!(gen.mean(), 5.0);
    }

    #[test]
    fn negexp_samples_are_positive_and_reproducible() {
        let mut a = NegExpGenerator::new(10.0, 42).unwrap();
        let mut b = NegExpGenerator::new(10.0, 42).unwrap();
        for _ in 0..100 {
            let x = a.sample();
            assert!(x >= 0.0);
            assert_eq!(x, b.sample());
        }
    }

    #[test]
    fn negexp_sample_mean_is_close_to_configured_mean() {
        let mut gen = NegExpGenerator::new(10.0, 7).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| gen.sample()).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.5, "sample mean {mean}");
    }

    #[test]
    fn uniform_stays_within_bounds() {
        let mut gen = UniformGenerator::new(3.0, 7.0, 1).unwrap();
        for _ in 0..1000 {
            let x = gen.sample();
            assert!((3.0..=7.0).contains(&x));
        }
        // Degenerate interval is allowed.
        let mut point = UniformGenerator::new(4.0, 4.0, 1).unwrap();
        assert_eq!(point.sample(), 4.0);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(NegExpGenerator::new(0.0, 1).is_err());
        assert!(NegExpGenerator::new(-3.0, 1).is_err());
        assert!(NormalGenerator::new(10.0, -1.0, 1).is_err());
        assert!(UniformGenerator::new(5.0, 1.0, 1).is_err());
        assert!(DistributionOptions::neg_exp(0.0).validate("arrival").is_err());
        assert!(DistributionOptions::constant(-1.0).validate("wash").is_err());
        assert!(DistributionOptions::normal(30.0, 10.0).validate("mech").is_ok());
    }

    #[test]
    fn speed_factor_scales_samples() {
        let mut fast = SpeedAdjusted::new(Box::new(ConstantGenerator::new(30.0)), 2.0);
        assert_eq!(fast.sample(), 15.0);
        assert_eq!(fast.mean(), 15.0);

        let mut fallback = SpeedAdjusted::new(Box::new(ConstantGenerator::new(30.0)), 0.0);
        assert_eq!(fallback.speed_factor(), 1.0);
        assert_eq!(fallback.sample(), 30.0);
    }

    #[test]
    fn options_round_trip_through_json() {
        let json = r#"{"type":"normal","mean":30.0,"std_dev":10.0}"#;
        let parsed: DistributionOptions = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, DistributionOptions::normal(30.0, 10.0));
        assert_eq!(parsed.mean(), 30.0);
    }
}
