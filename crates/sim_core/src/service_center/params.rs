use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;
use crate::distributions::DistributionOptions;
use crate::engine::{EngineConfig, DEFAULT_HORIZON};
use crate::entity::Stage;
use crate::error::ConfigError;
use crate::telemetry::SimSnapshotConfig;

/// Relative weights of the wash programs. Normalized before use, so they do
/// not have to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WashProbabilities {
    pub exterior: f64,
    pub interior: f64,
    pub both: f64,
}

impl Default for WashProbabilities {
    fn default() -> Self {
        Self {
            exterior: 0.5,
            interior: 0.3,
            both: 0.2,
        }
    }
}

impl WashProbabilities {
    /// Scales the weights to sum to one. All-zero weights fall back to the defaults.
    pub fn normalized(&self) -> Self {
        let sum = self.exterior + self.interior + self.both;
        if !(sum.is_finite() && sum > 0.0) {
            return Self::default();
        }
        Self {
            exterior: self.exterior / sum,
            interior: self.interior / sum,
            both: self.both / sum,
        }
    }
}

/// Parameters for one service-center run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceCenterParams {
    /// Simulated minutes; the run stops before the first event at or after it.
    pub duration: SimTime,
    /// Wall-clock delay between ticks, for animated playback.
    pub pacing_ms: Option<u64>,
    pub seed: u64,
    pub reception_servers: usize,
    pub mechanic_servers: usize,
    pub wash_servers: usize,
    pub inter_arrival: DistributionOptions,
    pub reception_service: DistributionOptions,
    pub mechanic_service: DistributionOptions,
    pub wash_service: DistributionOptions,
    pub prob_needs_mechanic: f64,
    pub prob_needs_wash: f64,
    pub wash_probabilities: WashProbabilities,
    /// Per-mechanic speed multipliers; a factor of 2.0 halves service times.
    pub mechanic_speed_factors: Vec<f64>,
    pub wash_speed_factors: Vec<f64>,
    /// Keep a record of every departed customer.
    pub record_departures: bool,
    /// Periodic queue snapshots. `None` disables them.
    pub snapshots: Option<SimSnapshotConfig>,
}

impl Default for ServiceCenterParams {
    fn default() -> Self {
        Self {
            duration: DEFAULT_HORIZON,
            pacing_ms: None,
            seed: 42,
            reception_servers: 1,
            mechanic_servers: 1,
            wash_servers: 1,
            inter_arrival: DistributionOptions::neg_exp(15.0),
            reception_service: DistributionOptions::neg_exp(10.0),
            mechanic_service: DistributionOptions::neg_exp(30.0),
            wash_service: DistributionOptions::neg_exp(20.0),
            prob_needs_mechanic: 0.7,
            prob_needs_wash: 0.5,
            wash_probabilities: WashProbabilities::default(),
            mechanic_speed_factors: vec![1.0],
            wash_speed_factors: vec![1.0],
            record_departures: true,
            snapshots: None,
        }
    }
}

impl ServiceCenterParams {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_duration(mut self, duration: SimTime) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_pacing_ms(mut self, pacing_ms: u64) -> Self {
        self.pacing_ms = Some(pacing_ms);
        self
    }

    pub fn with_reception_servers(mut self, servers: usize) -> Self {
        self.reception_servers = servers;
        self
    }

    pub fn with_mechanics(mut self, servers: usize) -> Self {
        self.mechanic_servers = servers;
        self
    }

    pub fn with_washers(mut self, servers: usize) -> Self {
        self.wash_servers = servers;
        self
    }

    pub fn with_inter_arrival(mut self, options: DistributionOptions) -> Self {
        self.inter_arrival = options;
        self
    }

    pub fn with_reception_service(mut self, options: DistributionOptions) -> Self {
        self.reception_service = options;
        self
    }

    pub fn with_mechanic_service(mut self, options: DistributionOptions) -> Self {
        self.mechanic_service = options;
        self
    }

    pub fn with_wash_service(mut self, options: DistributionOptions) -> Self {
        self.wash_service = options;
        self
    }

    /// Probabilities that an arriving customer needs a mechanic and a wash.
    pub fn with_routing_probabilities(mut self, needs_mechanic: f64, needs_wash: f64) -> Self {
        self.prob_needs_mechanic = needs_mechanic;
        self.prob_needs_wash = needs_wash;
        self
    }

    pub fn with_wash_probabilities(mut self, exterior: f64, interior: f64, both: f64) -> Self {
        self.wash_probabilities = WashProbabilities {
            exterior,
            interior,
            both,
        };
        self
    }

    pub fn with_mechanic_speed_factors(mut self, factors: Vec<f64>) -> Self {
        self.mechanic_speed_factors = factors;
        self
    }

    pub fn with_wash_speed_factors(mut self, factors: Vec<f64>) -> Self {
        self.wash_speed_factors = factors;
        self
    }

    pub fn with_record_departures(mut self, enabled: bool) -> Self {
        self.record_departures = enabled;
        self
    }

    pub fn with_snapshots(mut self, config: SimSnapshotConfig) -> Self {
        self.snapshots = Some(config);
        self
    }

    pub fn servers(&self, stage: Stage) -> usize {
        match stage {
            Stage::Reception => self.reception_servers,
            Stage::Mechanic => self.mechanic_servers,
            Stage::Wash => self.wash_servers,
        }
    }

    pub fn service(&self, stage: Stage) -> DistributionOptions {
        match stage {
            Stage::Reception => self.reception_service,
            Stage::Mechanic => self.mechanic_service,
            Stage::Wash => self.wash_service,
        }
    }

    /// Speed factors sized to the stage's server count. Missing entries
    /// default to 1.0 and extra entries are dropped. Reception has none.
    pub fn speed_factors(&self, stage: Stage) -> Vec<f64> {
        let configured: &[f64] = match stage {
            Stage::Reception => &[],
            Stage::Mechanic => &self.mechanic_speed_factors,
            Stage::Wash => &self.wash_speed_factors,
        };
        let n = self.servers(stage);
        let mut factors: Vec<f64> = configured.iter().copied().take(n).collect();
        factors.resize(n, 1.0);
        factors
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            horizon: self.duration,
            pacing: self.pacing_ms.map(Duration::from_millis),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config().validate()?;
        for stage in [Stage::Reception, Stage::Mechanic, Stage::Wash] {
            if self.servers(stage) == 0 {
                return Err(ConfigError::InvalidCapacity {
                    point: stage.label().to_string(),
                });
            }
        }
        self.inter_arrival.validate("inter_arrival")?;
        self.reception_service.validate("reception_service")?;
        self.mechanic_service.validate("mechanic_service")?;
        self.wash_service.validate("wash_service")?;

        let probabilities = [
            ("prob_needs_mechanic", self.prob_needs_mechanic),
            ("prob_needs_wash", self.prob_needs_wash),
            ("wash_probabilities.exterior", self.wash_probabilities.exterior),
            ("wash_probabilities.interior", self.wash_probabilities.interior),
            ("wash_probabilities.both", self.wash_probabilities.both),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability {
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}
