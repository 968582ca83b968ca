//! Metrics extraction from finished service-center runs.

use serde::Serialize;
use sim_core::runner::RunOutcome;

use crate::parameters::ParameterSet;

/// Flat per-run row: the inputs that varied plus the resulting metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub experiment_id: String,
    pub run_id: usize,
    pub seed: u64,
    pub reception_servers: usize,
    pub mechanic_servers: usize,
    pub wash_servers: usize,
    pub arrival_mean: f64,
    pub duration: f64,
    /// Simulated time at which the run stopped.
    pub end_time: f64,
    pub customers_created: u64,
    pub customers_departed: u64,
    pub customers_in_system: u64,
    /// Departed / created.
    pub throughput_ratio: f64,
    pub avg_time_in_system: f64,
    pub median_time_in_system: f64,
    pub p90_time_in_system: f64,
    pub avg_reception_wait: f64,
    pub avg_mechanic_wait: f64,
    pub avg_wash_wait: f64,
    pub reception_utilization: f64,
    pub mechanic_utilization: f64,
    pub wash_utilization: f64,
    pub degenerate_samples: u64,
}

impl SimulationResult {
    /// Average, median and 90th percentile of `values`; zeros when empty.
    fn calculate_stats(values: &[f64]) -> (f64, f64, f64) {
        if values.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };
        let p90_idx = ((sorted.len() - 1) as f64 * 0.9) as usize;
        let p90 = sorted[p90_idx.min(sorted.len() - 1)];

        (avg, median, p90)
    }
}

/// Reduces a run to one [SimulationResult] row.
///
/// Percentiles come from the departure records, so they are zero when the
/// run was configured without `record_departures`.
pub fn extract_metrics(param_set: &ParameterSet, outcome: &RunOutcome) -> SimulationResult {
    let report = &outcome.report;
    let times: Vec<f64> = outcome
        .telemetry
        .departed
        .iter()
        .map(|record| record.time_in_system())
        .collect();
    let (_, median_time_in_system, p90_time_in_system) = SimulationResult::calculate_stats(&times);

    let point = |label: &str| {
        report
            .service_point(label)
            .map(|p| (p.avg_wait, p.utilization))
            .unwrap_or((0.0, 0.0))
    };
    let (avg_reception_wait, reception_utilization) = point("Reception");
    let (avg_mechanic_wait, mechanic_utilization) = point("Mechanic");
    let (avg_wash_wait, wash_utilization) = point("Wash");

    let throughput_ratio = if report.customers_created > 0 {
        report.customers_departed as f64 / report.customers_created as f64
    } else {
        0.0
    };

    SimulationResult {
        experiment_id: param_set.experiment_id.clone(),
        run_id: param_set.run_id,
        seed: param_set.seed,
        reception_servers: param_set.params.reception_servers,
        mechanic_servers: param_set.params.mechanic_servers,
        wash_servers: param_set.params.wash_servers,
        arrival_mean: param_set.arrival_mean(),
        duration: param_set.params.duration,
        end_time: report.end_time,
        customers_created: report.customers_created,
        customers_departed: report.customers_departed,
        customers_in_system: report.customers_in_system,
        throughput_ratio,
        avg_time_in_system: report.avg_time_in_system,
        median_time_in_system,
        p90_time_in_system,
        avg_reception_wait,
        avg_mechanic_wait,
        avg_wash_wait,
        reception_utilization,
        mechanic_utilization,
        wash_utilization,
        degenerate_samples: report
            .service_points
            .iter()
            .map(|p| p.degenerate_samples)
            .sum(),
    }
}
