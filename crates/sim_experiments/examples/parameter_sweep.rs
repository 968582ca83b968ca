//! Example: staffing sweep for the service center.
//!
//! Runs a grid of mechanic and washer counts under two arrival rates, finds
//! the configuration with the lowest average time in system and exports all
//! rows to CSV.
//!
//! Run with: cargo run -p sim_experiments --example parameter_sweep --release

use sim_core::service_center::ServiceCenterParams;
use sim_experiments::{
    export_to_csv, find_best_parameters, find_best_result_index, run_parallel_experiments,
    ParameterSpace,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting staffing sweep...");

    let space = ParameterSpace::grid()
        .with_base(ServiceCenterParams::default().with_duration(20_000.0))
        .mechanics(vec![1, 2, 3])
        .washers(vec![1, 2])
        .arrival_mean(vec![10.0, 15.0])
        .replications(3);

    let parameter_sets = space.generate();
    println!("Generated {} parameter sets", parameter_sets.len());

    let results = run_parallel_experiments(parameter_sets.clone(), None)?;
    println!("Completed {} simulations", results.len());

    let best_idx = find_best_result_index(&results).ok_or("No results to analyze")?;
    let best = &results[best_idx];
    println!("\n=== Best Run ===");
    println!("Avg time in system: {:.1} min", best.avg_time_in_system);
    println!("P90 time in system: {:.1} min", best.p90_time_in_system);
    println!("Mechanic utilization: {:.1}%", best.mechanic_utilization * 100.0);
    println!("Wash utilization: {:.1}%", best.wash_utilization * 100.0);

    if let Some(best_params) = find_best_parameters(&results, &parameter_sets) {
        println!("\n=== Best Parameters ===");
        println!("Mechanics: {}", best_params.params.mechanic_servers);
        println!("Washers: {}", best_params.params.wash_servers);
        println!("Mean inter-arrival: {:.1} min", best_params.arrival_mean());
        println!("Seed: {}", best_params.seed);
    }

    export_to_csv(&results, "experiment_results.csv")?;
    println!("\nExported to experiment_results.csv");

    Ok(())
}
