//! Parallel simulation execution using rayon.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use sim_core::error::SimError;
use sim_core::runner::run_service_center;
use tracing::warn;

use crate::metrics::{extract_metrics, SimulationResult};
use crate::parameters::ParameterSet;

/// Runs one parameter set to completion and extracts its metrics.
pub fn run_single_simulation(param_set: &ParameterSet) -> Result<SimulationResult, SimError> {
    let outcome = run_service_center(&param_set.scenario_params())?;
    Ok(extract_metrics(param_set, &outcome))
}

/// Runs every parameter set across the thread pool with a progress bar.
pub fn run_parallel_experiments(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
) -> Result<Vec<SimulationResult>, rayon::ThreadPoolBuildError> {
    run_parallel_experiments_with_progress(parameter_sets, num_threads, true)
}

/// Runs every parameter set in parallel.
///
/// Results keep the input order. A run that fails is logged and left out, so
/// match rows to inputs by `experiment_id` and `run_id` rather than position.
pub fn run_parallel_experiments_with_progress(
    parameter_sets: Vec<ParameterSet>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<SimulationResult>, rayon::ThreadPoolBuildError> {
    let total = parameter_sets.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let pb_clone = pb.clone();
    let results: Vec<Option<SimulationResult>> = pool.install(|| {
        parameter_sets
            .par_iter()
            .map(|param_set| {
                let result = match run_single_simulation(param_set) {
                    Ok(result) => Some(result),
                    Err(err) => {
                        warn!(
                            experiment = %param_set.experiment_id,
                            run = param_set.run_id,
                            error = %err,
                            "simulation run failed"
                        );
                        None
                    }
                };
                if let Some(ref progress_bar) = pb_clone {
                    progress_bar.inc(1);
                }
                result
            })
            .collect()
    });

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("Completed");
    }

    Ok(results.into_iter().flatten().collect())
}
