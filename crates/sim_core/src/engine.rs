//! Three-phase simulation engine.
//!
//! Every tick selects the earliest pending time, advances the clock to it,
//! dispatches every event bound to that instant (B-phase) and then lets the
//! model start whatever has become possible until nothing more starts
//! (C-phase). The engine owns the clock and the event list; the model only
//! sees them through [SimContext].

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::clock::{SimTime, SimulationClock};
use crate::error::{ConfigError, KernelError, SimError};
use crate::event_list::{Event, EventList};

/// Default horizon in model time units.
pub const DEFAULT_HORIZON: SimTime = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A [StopHandle] asked the run to stop.
    Cancelled,
    /// No events were left to process.
    EventsExhausted,
    /// The next event lies at or beyond the horizon.
    HorizonReached,
    /// A kernel invariant broke; the error was returned to the caller.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Finished(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub horizon: SimTime,
    /// Wall-clock sleep after each tick. Only changes how fast a run plays back.
    pub pacing: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            pacing: None,
        }
    }
}

impl EngineConfig {
    pub fn with_horizon(mut self, horizon: SimTime) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.horizon.is_finite() && self.horizon > 0.0) {
            return Err(ConfigError::InvalidHorizon(self.horizon));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, shared between the engine and its host.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock delay between ticks that the host can change while the run is
/// in progress. Stored as nanoseconds; zero means no delay.
#[derive(Debug, Clone, Default)]
pub struct PacingHandle(Arc<AtomicU64>);

impl PacingHandle {
    pub fn new(pacing: Option<Duration>) -> Self {
        let handle = Self::default();
        handle.set(pacing);
        handle
    }

    pub fn set(&self, pacing: Option<Duration>) {
        let nanos = pacing
            .map(|delay| u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.0.store(nanos, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<Duration> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }
}

/// What a model hook may touch: the current time and the event list.
pub struct SimContext<'a, K> {
    now: SimTime,
    events: &'a mut EventList<K>,
}

impl<'a, K: Copy + Debug> SimContext<'a, K> {
    pub fn new(now: SimTime, events: &'a mut EventList<K>) -> Self {
        Self { now, events }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules `kind` at absolute time `time`, which must not lie in the past.
    pub fn schedule_at(&mut self, kind: K, time: SimTime) -> Result<Event<K>, KernelError> {
        if time < self.now {
            return Err(KernelError::InvalidEventTime(time));
        }
        self.events.schedule(kind, time)
    }

    pub fn schedule_in(&mut self, kind: K, delay: f64) -> Result<Event<K>, KernelError> {
        self.schedule_at(kind, self.now + delay)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

/// The model side of the engine.
pub trait ModelLogic {
    type Kind: Copy + Debug;

    /// Called once when the run starts; schedules the initial events.
    fn initialize(&mut self, ctx: &mut SimContext<'_, Self::Kind>) -> Result<(), KernelError>;

    /// B-phase: handle one bound event.
    fn on_event(
        &mut self,
        event: Event<Self::Kind>,
        ctx: &mut SimContext<'_, Self::Kind>,
    ) -> Result<(), KernelError>;

    /// C-phase: start every service that can start now and schedule its
    /// completion. Returns how many were started.
    fn try_start_all(&mut self, ctx: &mut SimContext<'_, Self::Kind>) -> Result<usize, KernelError>;

    /// Upper bound on the services a single C-phase can still start.
    fn outstanding_work(&self) -> usize;

    fn after_tick(&mut self, _now: SimTime) {}

    /// Called exactly once when the engine finishes.
    fn finalize(&mut self, now: SimTime);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub end_time: SimTime,
    pub ticks: u64,
    pub events_processed: u64,
    pub stop_reason: StopReason,
    pub c_phase_aborts: u64,
}

pub struct Engine<M: ModelLogic> {
    config: EngineConfig,
    clock: SimulationClock,
    events: EventList<M::Kind>,
    model: M,
    state: EngineState,
    stop: StopHandle,
    pacing: PacingHandle,
    ticks: u64,
    events_processed: u64,
    c_phase_aborts: u64,
}

impl<M: ModelLogic> Engine<M> {
    pub fn new(model: M, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: SimulationClock::new(),
            events: EventList::new(),
            model,
            state: EngineState::Idle,
            stop: StopHandle::new(),
            pacing: PacingHandle::new(config.pacing),
            ticks: 0,
            events_processed: 0,
            c_phase_aborts: 0,
        })
    }

    /// Uses an externally created stop flag instead of the engine's own.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Uses a shared pacing handle; its current value replaces `config.pacing`.
    pub fn with_pacing_handle(mut self, pacing: PacingHandle) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn pacing_handle(&self) -> PacingHandle {
        self.pacing.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// `Idle -> Running`: resets the clock and lets the model seed the event list.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.state != EngineState::Idle {
            return Err(KernelError::InvalidTransition { from: self.state }.into());
        }
        self.clock.reset();
        self.events.clear();
        self.state = EngineState::Running;
        info!(horizon = self.config.horizon, "simulation started");
        let mut ctx = SimContext::new(self.clock.now(), &mut self.events);
        if let Err(err) = self.model.initialize(&mut ctx) {
            self.finish(StopReason::Failed);
            return Err(err.into());
        }
        Ok(())
    }

    /// Runs one tick, starting the engine first if it is still idle. Stepping a
    /// finished engine is an error.
    pub fn step(&mut self) -> Result<EngineState, SimError> {
        match self.state {
            EngineState::Idle => self.start()?,
            EngineState::Running => {}
            EngineState::Finished(_) => {
                return Err(KernelError::InvalidTransition { from: self.state }.into())
            }
        }
        if let Err(err) = self.tick() {
            error!(error = %err, now = self.clock.now(), "simulation aborted");
            self.finish(StopReason::Failed);
            return Err(err.into());
        }
        Ok(self.state)
    }

    /// Drives ticks until the engine finishes.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        loop {
            if let EngineState::Finished(stop_reason) = self.step()? {
                let summary = self.summary(stop_reason);
                info!(
                    end_time = summary.end_time,
                    ticks = summary.ticks,
                    events = summary.events_processed,
                    reason = ?summary.stop_reason,
                    "simulation finished"
                );
                return Ok(summary);
            }
        }
    }

    pub fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            end_time: self.clock.now(),
            ticks: self.ticks,
            events_processed: self.events_processed,
            stop_reason,
            c_phase_aborts: self.c_phase_aborts,
        }
    }

    fn tick(&mut self) -> Result<(), KernelError> {
        if self.stop.is_stopped() {
            self.finish(StopReason::Cancelled);
            return Ok(());
        }

        let t_next = self.events.peek_earliest_time();
        if t_next == SimTime::INFINITY {
            self.finish(StopReason::EventsExhausted);
            return Ok(());
        }
        if t_next >= self.config.horizon {
            self.finish(StopReason::HorizonReached);
            return Ok(());
        }

        self.clock.advance_to(t_next)?;
        let now = self.clock.now();

        // B-phase: events scheduled at `now` by a handler join this phase.
        while self.events.peek_earliest_time() == t_next {
            let event = self.events.remove_earliest()?;
            self.events_processed += 1;
            trace!(t = now, kind = ?event.kind, seq = event.seq, "dispatch");
            let mut ctx = SimContext::new(now, &mut self.events);
            self.model.on_event(event, &mut ctx)?;
        }

        self.run_c_phase(now)?;

        self.ticks += 1;
        self.model.after_tick(now);
        if let Some(delay) = self.pacing.get() {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn run_c_phase(&mut self, now: SimTime) -> Result<(), KernelError> {
        let limit = self.model.outstanding_work() + 1;
        let mut passes = 0;
        loop {
            if passes == limit {
                self.c_phase_aborts += 1;
                error!(t = now, passes, "C-phase did not settle; aborting it for this tick");
                return Ok(());
            }
            passes += 1;
            let mut ctx = SimContext::new(now, &mut self.events);
            let started = self.model.try_start_all(&mut ctx)?;
            if started == 0 {
                return Ok(());
            }
            debug!(t = now, started, "C-phase pass");
        }
    }

    fn finish(&mut self, reason: StopReason) {
        if matches!(self.state, EngineState::Finished(_)) {
            return;
        }
        self.state = EngineState::Finished(reason);
        self.model.finalize(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tick {
        Ping,
        Spawn,
    }

    /// Records dispatched events; `Spawn` schedules a `Ping` at the same instant.
    #[derive(Default)]
    struct Recorder {
        initial: Vec<SimTime>,
        seen: Vec<(SimTime, Tick)>,
        finalized: u32,
        spin: bool,
    }

    impl ModelLogic for Recorder {
        type Kind = Tick;

        fn initialize(&mut self, ctx: &mut SimContext<'_, Tick>) -> Result<(), KernelError> {
            for t in &self.initial {
                ctx.schedule_at(Tick::Ping, *t)?;
            }
            Ok(())
        }

        fn on_event(
            &mut self,
            event: Event<Tick>,
            ctx: &mut SimContext<'_, Tick>,
        ) -> Result<(), KernelError> {
            self.seen.push((ctx.now(), event.kind));
            if event.kind == Tick::Spawn {
                ctx.schedule_in(Tick::Ping, 0.0)?;
            }
            Ok(())
        }

        fn try_start_all(&mut self, _ctx: &mut SimContext<'_, Tick>) -> Result<usize, KernelError> {
            Ok(usize::from(self.spin))
        }

        fn outstanding_work(&self) -> usize {
            0
        }

        fn finalize(&mut self, _now: SimTime) {
            self.finalized += 1;
        }
    }

    fn recorder(times: &[SimTime]) -> Recorder {
        Recorder {
            initial: times.to_vec(),
            ..Recorder::default()
        }
    }

    #[test]
    fn rejects_non_positive_horizon() {
        for horizon in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = Engine::new(recorder(&[]), EngineConfig::default().with_horizon(horizon));
            assert!(matches!(result, Err(ConfigError::InvalidHorizon(_))));
        }
    }

    #[test]
    fn runs_until_events_are_exhausted() {
        let mut engine = Engine::new(recorder(&[3.0, 1.0, 3.0, 7.0]), EngineConfig::default()).unwrap();
        let summary = engine.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::EventsExhausted);
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.events_processed, 4);
        assert_eq!(summary.end_time, 7.0);
        let times: Vec<_> = engine.model().seen.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![1.0, 3.0, 3.0, 7.0]);
        assert_eq!(engine.model().finalized, 1);
    }

    #[test]
    fn horizon_stops_before_later_events() {
        let config = EngineConfig::default().with_horizon(5.0);
        let mut engine = Engine::new(recorder(&[1.0, 4.0, 5.0, 9.0]), config).unwrap();
        let summary = engine.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::HorizonReached);
        assert_eq!(summary.end_time, 4.0);
        assert_eq!(engine.pending_events(), 2);
    }

    #[test]
    fn same_instant_events_join_the_current_b_phase() {
        let mut engine = Engine::new(recorder(&[]), EngineConfig::default()).unwrap();
        engine.start().unwrap();
        engine.events.schedule(Tick::Spawn, 2.0).unwrap();
        engine.step().unwrap();
        assert_eq!(engine.model().seen, vec![(2.0, Tick::Spawn), (2.0, Tick::Ping)]);
        assert_eq!(engine.now(), 2.0);
        assert_eq!(engine.pending_events(), 0);
    }

    #[test]
    fn stop_handle_cancels_before_next_tick() {
        let mut engine = Engine::new(recorder(&[1.0, 2.0, 3.0]), EngineConfig::default()).unwrap();
        let stop = engine.stop_handle();
        engine.step().unwrap();
        stop.stop();
        assert_eq!(
            engine.step().unwrap(),
            EngineState::Finished(StopReason::Cancelled)
        );
        assert_eq!(engine.model().seen.len(), 1);
        assert_eq!(engine.model().finalized, 1);
    }

    #[test]
    fn pacing_changes_between_ticks_leave_the_run_unchanged() {
        let times = [1.0, 2.0, 3.0, 4.0];
        let mut plain = Engine::new(recorder(&times), EngineConfig::default()).unwrap();
        let expected = plain.run().unwrap();

        let config = EngineConfig::default().with_pacing(Duration::from_millis(2));
        let mut paced = Engine::new(recorder(&times), config).unwrap();
        let pacing = paced.pacing_handle();
        assert_eq!(pacing.get(), Some(Duration::from_millis(2)));
        paced.step().unwrap();
        pacing.set(Some(Duration::from_micros(500)));
        paced.step().unwrap();
        pacing.set(None);
        assert_eq!(pacing.get(), None);
        let summary = paced.run().unwrap();

        assert_eq!(summary, expected);
        assert_eq!(paced.model().seen, plain.model().seen);
    }

    #[test]
    fn finished_engine_refuses_further_steps() {
        let mut engine = Engine::new(recorder(&[]), EngineConfig::default()).unwrap();
        engine.run().unwrap();
        let err = engine.step().unwrap_err();
        assert!(matches!(
            err,
            SimError::Kernel(KernelError::InvalidTransition { .. })
        ));
        assert!(engine.start().is_err());
        assert_eq!(engine.model().finalized, 1);
    }

    #[test]
    fn livelocked_c_phase_is_aborted_and_counted() {
        let mut model = recorder(&[1.0, 2.0]);
        model.spin = true;
        let mut engine = Engine::new(model, EngineConfig::default()).unwrap();
        let summary = engine.run().unwrap();
        assert_eq!(summary.c_phase_aborts, 2);
        assert_eq!(summary.stop_reason, StopReason::EventsExhausted);
    }

    #[test]
    fn context_rejects_scheduling_in_the_past() {
        let mut events: EventList<Tick> = EventList::new();
        let mut ctx = SimContext::new(5.0, &mut events);
        assert_eq!(
            ctx.schedule_at(Tick::Ping, 4.0),
            Err(KernelError::InvalidEventTime(4.0))
        );
        assert!(ctx.schedule_in(Tick::Ping, 1.0).is_ok());
        assert_eq!(ctx.pending_events(), 1);
    }
}
