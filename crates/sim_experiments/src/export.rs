//! Result export and ranking.

use std::fs::File;
use std::path::Path;

use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/parquet.rs"]
mod parquet;
#[path = "export/ranking.rs"]
mod ranking;

fn ensure_not_empty<T>(items: &[T]) -> Result<(), Box<dyn std::error::Error>> {
    if items.is_empty() {
        return Err("No results to export".into());
    }
    Ok(())
}

/// Writes one Parquet row per result.
///
/// # Errors
///
/// Fails on an empty slice, or when the file cannot be created or written.
pub fn export_to_parquet(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_not_empty(results)?;
    let file = File::create(path)?;
    parquet::export_to_parquet_impl(results, file)
}

/// Writes the results as a pretty-printed JSON array.
pub fn export_to_json(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(path)?;
    json::export_to_json_impl(results, file)
}

/// Writes one CSV row per result, with a header.
pub fn export_to_csv(
    results: &[SimulationResult],
    path: impl AsRef<Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_not_empty(results)?;
    let file = File::create(path)?;
    csv::export_to_csv_impl(results, file)
}

/// The parameter set of the result with the lowest average time in system.
///
/// Results are matched to sets by `experiment_id` and `run_id`, so a sweep
/// with failed runs still resolves correctly.
pub fn find_best_parameters<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
) -> Option<&'a ParameterSet> {
    ranking::find_best_parameters_impl(results, parameter_sets)
}

/// Index of the result with the lowest average time in system, ignoring runs
/// in which nobody departed.
pub fn find_best_result_index(results: &[SimulationResult]) -> Option<usize> {
    ranking::find_best_index_by_time_in_system(results)
}

#[cfg(test)]
pub(crate) fn sample_result(experiment_id: usize, avg_time_in_system: f64) -> SimulationResult {
    SimulationResult {
        experiment_id: format!("exp_{experiment_id}"),
        run_id: 0,
        seed: experiment_id as u64,
        reception_servers: 1,
        mechanic_servers: 1 + experiment_id,
        wash_servers: 1,
        arrival_mean: 15.0,
        duration: 10_000.0,
        end_time: 9_990.0,
        customers_created: 660,
        customers_departed: 650,
        customers_in_system: 10,
        throughput_ratio: 650.0 / 660.0,
        avg_time_in_system,
        median_time_in_system: avg_time_in_system * 0.9,
        p90_time_in_system: avg_time_in_system * 1.8,
        avg_reception_wait: 12.0,
        avg_mechanic_wait: 40.0,
        avg_wash_wait: 8.0,
        reception_utilization: 0.66,
        mechanic_utilization: 0.9,
        wash_utilization: 0.45,
        degenerate_samples: 0,
    }
}
