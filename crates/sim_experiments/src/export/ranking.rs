use crate::metrics::SimulationResult;
use crate::parameters::ParameterSet;

pub(crate) fn find_best_index_by_time_in_system(results: &[SimulationResult]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.customers_departed > 0 && r.avg_time_in_system.is_finite())
        .min_by(|(_, a), (_, b)| a.avg_time_in_system.total_cmp(&b.avg_time_in_system))
        .map(|(idx, _)| idx)
}

pub(crate) fn find_best_parameters_impl<'a>(
    results: &[SimulationResult],
    parameter_sets: &'a [ParameterSet],
) -> Option<&'a ParameterSet> {
    let best = &results[find_best_index_by_time_in_system(results)?];
    parameter_sets
        .iter()
        .find(|set| set.experiment_id == best.experiment_id && set.run_id == best.run_id)
}
