//! Parallel parameter sweeps for the service-center simulation.
//!
//! Runs many independent simulations across a thread pool, reduces each run
//! to a flat [SimulationResult] row and exports the rows for analysis.
//!
//! # Quick Start
//!
//! ```no_run
//! use sim_experiments::{find_best_result_index, run_parallel_experiments, ParameterSpace};
//!
//! let space = ParameterSpace::grid()
//!     .mechanics(vec![1, 2, 3])
//!     .washers(vec![1, 2])
//!     .arrival_mean(vec![10.0, 15.0])
//!     .replications(3);
//!
//! let parameter_sets = space.generate();
//! let results = run_parallel_experiments(parameter_sets, None).unwrap();
//! let best_idx = find_best_result_index(&results).unwrap();
//! ```
//!
//! - [`parameters`]: grid search and random sampling over staffing and load
//! - [`runner`]: rayon-based execution
//! - [`metrics`]: per-run metrics from the final report and departure records
//! - [`export`]: CSV, JSON and Parquet output plus ranking

pub mod export;
pub mod metrics;
pub mod parameters;
pub mod runner;

pub use export::{
    export_to_csv, export_to_json, export_to_parquet, find_best_parameters, find_best_result_index,
};
pub use metrics::SimulationResult;
pub use parameters::{ParameterSet, ParameterSpace};
pub use runner::run_parallel_experiments;
