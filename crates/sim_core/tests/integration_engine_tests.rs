mod support;

use std::collections::HashSet;

use sim_core::clock::SimTime;
use sim_core::distributions::{ConstantGenerator, ContinuousGenerator};
use sim_core::engine::{
    Engine, EngineConfig, EngineState, ModelLogic, SimContext, StopReason,
};
use sim_core::error::{KernelError, SimError};
use sim_core::event_list::Event;
use sim_core::test_helpers::{JobEvent, SinglePointModel};

use support::stepping::{init_tracing, step_to_end};

#[test]
fn single_server_constant_service() {
    let model = SinglePointModel::constant(1, 5.0, vec![0.0, 1.0, 2.0]);
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    let summary = engine.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::EventsExhausted);

    let done = &engine.model().completed;
    let ends: Vec<_> = done.iter().map(|j| j.end).collect();
    let waits: Vec<_> = done.iter().map(|j| j.wait).collect();
    let sojourns: Vec<_> = done.iter().map(|j| j.sojourn()).collect();
    assert_eq!(ends, vec![5.0, 10.0, 15.0]);
    assert_eq!(waits, vec![0.0, 4.0, 8.0]);
    assert_eq!(sojourns, vec![5.0, 9.0, 13.0]);
    assert_eq!(engine.model().point.average_wait_time(), 4.0);
    assert_eq!(engine.model().finalized, 1);
}

#[test]
fn two_servers_take_simultaneous_arrivals() {
    let model = SinglePointModel::constant(2, 10.0, vec![0.0, 0.0]);
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    engine.run().unwrap();

    let model = engine.model();
    assert_eq!(model.started_log, vec![(0.0, 0, 0), (0.0, 1, 1)]);
    for job in &model.completed {
        assert_eq!(job.end, 10.0);
        assert_eq!(job.wait, 0.0);
    }
    assert_eq!(model.point.served_count(), 2);
}

#[test]
fn empty_history_spreads_arrivals_over_all_servers() {
    let model = SinglePointModel::constant(5, 50.0, vec![1.0; 5]);
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    engine.step().unwrap();

    let servers: Vec<_> = engine.model().started_log.iter().map(|s| s.1).collect();
    assert_eq!(servers, vec![0, 1, 2, 3, 4]);
}

#[test]
fn clock_visits_each_distinct_event_time_once() {
    let arrivals = vec![3.0, 0.5, 3.0, 7.25, 1.0];
    let model = SinglePointModel::constant(2, 2.0, arrivals);
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();

    let mut times: Vec<SimTime> = Vec::new();
    step_to_end(&mut engine, |now, _| times.push(now));

    for pair in times.windows(2) {
        assert!(pair[0] < pair[1], "clock went {} -> {}", pair[0], pair[1]);
    }
    // Two arrivals and a completion share t=3; both servers finish at 5.
    assert_eq!(times, vec![0.5, 1.0, 2.5, 3.0, 5.0, 7.25, 9.25]);
}

#[test]
fn no_entity_is_served_twice_at_once() {
    let arrivals: Vec<SimTime> = (0..40).map(|i| f64::from(i % 7)).collect();
    let model = SinglePointModel::constant(3, 1.5, arrivals);
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    engine.run().unwrap();

    let model = engine.model();
    let ids: HashSet<_> = model.completed.iter().map(|j| j.id).collect();
    assert_eq!(ids.len(), 40);
    assert_eq!(model.completed.len(), 40);
    for server in 0..3 {
        let mut spans: Vec<_> = model
            .completed
            .iter()
            .filter(|j| j.server_id == server)
            .map(|j| (j.start, j.end))
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "server {server} overlaps: {pair:?}");
        }
    }
}

#[test]
fn degenerate_service_times_still_advance() {
    init_tracing();
    for raw in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let generators: Vec<Box<dyn ContinuousGenerator>> =
            vec![Box::new(ConstantGenerator::new(raw))];
        let model = SinglePointModel::new(vec![1.0, 1.0, 1.0], generators).unwrap();
        let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
        let summary = engine.run().unwrap();

        let model = engine.model();
        assert_eq!(model.completed.len(), 3, "raw sample {raw}");
        assert!(summary.end_time > 1.0 && summary.end_time.is_finite());
        assert_eq!(model.point.degenerate_samples(), 3);
        for job in &model.completed {
            assert!(job.end > job.start);
        }
    }
}

#[test]
fn horizon_leaves_later_events_pending() {
    let model = SinglePointModel::constant(1, 5.0, vec![0.0, 1.0, 2.0]);
    let mut engine = Engine::new(model, EngineConfig::default().with_horizon(10.0)).unwrap();
    let summary = engine.run().unwrap();
    assert_eq!(summary.stop_reason, StopReason::HorizonReached);
    assert_eq!(summary.end_time, 5.0);
    assert_eq!(engine.model().completed.len(), 1);
    assert_eq!(engine.pending_events(), 1);
}

#[test]
fn cancellation_is_honored_between_ticks() {
    let model = SinglePointModel::constant(1, 1.0, (0..100).map(f64::from).collect());
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    let stop = engine.stop_handle();
    for _ in 0..10 {
        engine.step().unwrap();
    }
    stop.stop();
    assert_eq!(
        engine.step().unwrap(),
        EngineState::Finished(StopReason::Cancelled)
    );
    assert_eq!(engine.model().finalized, 1);
    assert!(engine.run().is_err());
}

/// Schedules a completion for a point that never started anything.
struct PhantomCompletion(SinglePointModel);

impl ModelLogic for PhantomCompletion {
    type Kind = JobEvent;

    fn initialize(&mut self, ctx: &mut SimContext<'_, JobEvent>) -> Result<(), KernelError> {
        ctx.schedule_at(JobEvent::Completion, 2.0)?;
        Ok(())
    }

    fn on_event(
        &mut self,
        event: Event<JobEvent>,
        ctx: &mut SimContext<'_, JobEvent>,
    ) -> Result<(), KernelError> {
        self.0.on_event(event, ctx)
    }

    fn try_start_all(&mut self, ctx: &mut SimContext<'_, JobEvent>) -> Result<usize, KernelError> {
        self.0.try_start_all(ctx)
    }

    fn outstanding_work(&self) -> usize {
        self.0.outstanding_work()
    }

    fn finalize(&mut self, now: SimTime) {
        self.0.finalize(now);
    }
}

#[test]
fn completion_without_running_service_is_fatal() {
    let model = PhantomCompletion(SinglePointModel::constant(1, 1.0, Vec::new()));
    let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
    let err = engine.run().unwrap_err();
    assert!(matches!(
        err,
        SimError::Kernel(KernelError::NoRunningService { at, .. }) if at == 2.0
    ));
    assert_eq!(engine.state(), EngineState::Finished(StopReason::Failed));
    assert_eq!(engine.model().0.finalized, 1);
}
