//! Run the default service center and print the final statistics.
//!
//! Run with: cargo run -p sim_core --example service_center_run [config.json]
//! Set RUST_LOG=sim_core=debug for per-tick logs.

use sim_core::runner::run_service_center;
use sim_core::service_center::ServiceCenterParams;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let params = match std::env::args().nth(1) {
        Some(path) => match ServiceCenterParams::from_json_file(&path) {
            Ok(params) => params,
            Err(err) => {
                eprintln!("invalid config {path}: {err}");
                std::process::exit(2);
            }
        },
        None => ServiceCenterParams::default()
            .with_seed(123)
            .with_mechanics(2)
            .with_washers(2)
            .with_mechanic_speed_factors(vec![1.0, 1.3]),
    };

    let outcome = match run_service_center(&params) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("simulation failed: {err}");
            std::process::exit(1);
        }
    };

    println!(
        "--- Service center run (seed {}, {} min, {} ticks, {} events) ---",
        params.seed, params.duration, outcome.summary.ticks, outcome.summary.events_processed
    );
    for line in outcome.report.summary_lines() {
        println!("{line}");
    }
    let wash = outcome.report.wash_programs;
    println!(
        "Wash programs: exterior={} interior={} both={}",
        wash.exterior, wash.interior, wash.both
    );
}
