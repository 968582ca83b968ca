use sim_core::distributions::DistributionOptions;
use sim_core::service_center::ServiceCenterParams;

/// Busy center: mechanics run close to saturation, so queues build up and
/// every stage sees traffic.
pub fn busy_params(seed: u64) -> ServiceCenterParams {
    ServiceCenterParams::default()
        .with_seed(seed)
        .with_duration(3_000.0)
        .with_inter_arrival(DistributionOptions::neg_exp(6.0))
        .with_reception_service(DistributionOptions::neg_exp(4.0))
        .with_mechanics(3)
        .with_washers(2)
        .with_mechanic_speed_factors(vec![1.0, 1.5, 0.8])
}

/// Everything constant: arrivals every 10, reception 4, mechanic 12, wash 8.
pub fn constant_params() -> ServiceCenterParams {
    ServiceCenterParams::default()
        .with_duration(200.0)
        .with_inter_arrival(DistributionOptions::constant(10.0))
        .with_reception_service(DistributionOptions::constant(4.0))
        .with_mechanic_service(DistributionOptions::constant(12.0))
        .with_wash_service(DistributionOptions::constant(8.0))
        .with_routing_probabilities(1.0, 1.0)
        .with_wash_probabilities(0.0, 1.0, 0.0)
}
