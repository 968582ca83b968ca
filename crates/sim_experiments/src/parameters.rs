//! Parameter variation framework for exploring staffing and load levels.
//!
//! A [ParameterSpace] lists candidate values per dimension on top of a base
//! [ServiceCenterParams]. [ParameterSpace::generate] takes the Cartesian
//! product; [ParameterSpace::sample_random] draws unique combinations.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_core::distributions::DistributionOptions;
use sim_core::service_center::ServiceCenterParams;

const SEED_STRIDE: u64 = 0x9e37_79b9;

/// One point of the grid, before replication.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ParameterCombination {
    reception_servers: usize,
    mechanics: usize,
    washers: usize,
    arrival_mean: f64,
    duration: f64,
}

impl ParameterCombination {
    /// Hashable key for duplicate detection during sampling.
    fn key(&self) -> (usize, usize, usize, u64, u64) {
        (
            self.reception_servers,
            self.mechanics,
            self.washers,
            self.arrival_mean.to_bits(),
            self.duration.to_bits(),
        )
    }
}

/// A single parameter configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub params: ServiceCenterParams,
    /// Identifies the combination; replications share it.
    pub experiment_id: String,
    /// Replication index within the experiment.
    pub run_id: usize,
    pub seed: u64,
}

impl ParameterSet {
    pub fn new(params: ServiceCenterParams, experiment_id: String, run_id: usize, seed: u64) -> Self {
        Self {
            params,
            experiment_id,
            run_id,
            seed,
        }
    }

    /// The run parameters with this set's seed applied.
    pub fn scenario_params(&self) -> ServiceCenterParams {
        self.params.clone().with_seed(self.seed)
    }

    /// Mean of the inter-arrival distribution this set runs with.
    pub fn arrival_mean(&self) -> f64 {
        self.params.inter_arrival.mean()
    }
}

/// Candidate values per dimension. An empty dimension uses the base value.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    base: ServiceCenterParams,
    reception_servers: Vec<usize>,
    mechanics: Vec<usize>,
    washers: Vec<usize>,
    arrival_means: Vec<f64>,
    durations: Vec<f64>,
    replications: usize,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self {
            base: ServiceCenterParams::default().with_record_departures(true),
            reception_servers: vec![],
            mechanics: vec![],
            washers: vec![],
            arrival_means: vec![],
            durations: vec![],
            replications: 1,
        }
    }

    pub fn grid() -> Self {
        Self::new()
    }

    pub fn reception_servers(mut self, counts: Vec<usize>) -> Self {
        self.reception_servers = counts;
        self
    }

    pub fn mechanics(mut self, counts: Vec<usize>) -> Self {
        self.mechanics = counts;
        self
    }

    pub fn washers(mut self, counts: Vec<usize>) -> Self {
        self.washers = counts;
        self
    }

    /// Mean inter-arrival times; each becomes a negative exponential.
    pub fn arrival_mean(mut self, means: Vec<f64>) -> Self {
        self.arrival_means = means;
        self
    }

    pub fn duration(mut self, durations: Vec<f64>) -> Self {
        self.durations = durations;
        self
    }

    /// Independent seeds per combination. Values below one are treated as one.
    pub fn replications(mut self, count: usize) -> Self {
        self.replications = count.max(1);
        self
    }

    pub fn with_base(mut self, base: ServiceCenterParams) -> Self {
        self.base = base;
        self
    }

    fn dimension<T: Copy>(values: &[T], fallback: T) -> Vec<T> {
        if values.is_empty() {
            vec![fallback]
        } else {
            values.to_vec()
        }
    }

    fn combinations(&self) -> Vec<ParameterCombination> {
        let receptions = Self::dimension(&self.reception_servers, self.base.reception_servers);
        let mechanics = Self::dimension(&self.mechanics, self.base.mechanic_servers);
        let washers = Self::dimension(&self.washers, self.base.wash_servers);
        let arrival_means = Self::dimension(&self.arrival_means, self.base.inter_arrival.mean());
        let durations = Self::dimension(&self.durations, self.base.duration);

        let mut combos = Vec::new();
        for &reception_servers in &receptions {
            for &mechanics in &mechanics {
                for &washers in &washers {
                    for &arrival_mean in &arrival_means {
                        for &duration in &durations {
                            combos.push(ParameterCombination {
                                reception_servers,
                                mechanics,
                                washers,
                                arrival_mean,
                                duration,
                            });
                        }
                    }
                }
            }
        }
        combos
    }

    fn build_params(&self, combo: &ParameterCombination) -> ServiceCenterParams {
        let mut params = self
            .base
            .clone()
            .with_reception_servers(combo.reception_servers)
            .with_mechanics(combo.mechanics)
            .with_washers(combo.washers)
            .with_duration(combo.duration);
        if !self.arrival_means.is_empty() {
            params = params.with_inter_arrival(DistributionOptions::neg_exp(combo.arrival_mean));
        }
        params
    }

    fn replicate(&self, experiment_id: usize, params: ServiceCenterParams) -> Vec<ParameterSet> {
        (0..self.replications)
            .map(|run_id| {
                let seed = (experiment_id as u64)
                    .wrapping_mul(SEED_STRIDE)
                    .wrapping_add(run_id as u64);
                ParameterSet::new(
                    params.clone(),
                    format!("exp_{experiment_id}"),
                    run_id,
                    seed,
                )
            })
            .collect()
    }

    /// Every combination, each repeated `replications` times with distinct seeds.
    pub fn generate(&self) -> Vec<ParameterSet> {
        self.combinations()
            .iter()
            .enumerate()
            .flat_map(|(experiment_id, combo)| {
                self.replicate(experiment_id, self.build_params(combo))
            })
            .collect()
    }

    /// Up to `count` distinct combinations drawn uniformly from the space.
    /// Stops early when the space has fewer than `count` combinations.
    pub fn sample_random(&self, count: usize, seed: u64) -> Vec<ParameterSet> {
        let combos = self.combinations();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut seen = HashSet::new();
        let mut sets = Vec::new();
        let mut experiment_id = 0;

        while experiment_id < count && seen.len() < combos.len() {
            let combo = combos[rng.gen_range(0..combos.len())];
            if !seen.insert(combo.key()) {
                continue;
            }
            sets.extend(self.replicate(experiment_id, self.build_params(&combo)));
            experiment_id += 1;
        }
        sets
    }
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self::new()
    }
}
