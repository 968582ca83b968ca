//! Simulation runner: builds the service-center model, drives the engine and
//! collects the results.
//!
//! [spawn_simulation] moves the whole run onto a worker thread, which is then
//! the only writer of simulation state. The host talks to it through the
//! returned [SimulationHandle] and the notification channel.

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::engine::{Engine, PacingHandle, RunSummary, StopHandle};
use crate::error::{SimError, StoreError};
use crate::observer::{observer_channel, ObserverHandle, SimNotification};
use crate::report::SimulationReport;
use crate::service_center::{ServiceCenterModel, ServiceCenterParams};
use crate::store::{persist_report, ReportStore};
use crate::telemetry::{SimSnapshots, SimTelemetry};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub report: SimulationReport,
    pub telemetry: SimTelemetry,
    pub snapshots: SimSnapshots,
}

pub fn run_service_center(params: &ServiceCenterParams) -> Result<RunOutcome, SimError> {
    run_with_observer(params, ObserverHandle::disconnected(), StopHandle::new())
}

pub fn run_with_observer(
    params: &ServiceCenterParams,
    observer: ObserverHandle,
    stop: StopHandle,
) -> Result<RunOutcome, SimError> {
    let pacing = PacingHandle::new(params.engine_config().pacing);
    run_with_controls(params, observer, stop, pacing)
}

/// Like [run_with_observer], with the tick delay read from `pacing` so the
/// host can speed the run up or slow it down while it is in progress.
pub fn run_with_controls(
    params: &ServiceCenterParams,
    observer: ObserverHandle,
    stop: StopHandle,
    pacing: PacingHandle,
) -> Result<RunOutcome, SimError> {
    let model = ServiceCenterModel::with_observer(params, observer)?;
    let mut engine = Engine::new(model, params.engine_config())?
        .with_stop_handle(stop)
        .with_pacing_handle(pacing);
    info!(seed = params.seed, duration = params.duration, "running service center");
    let summary = engine.run()?;
    let model = engine.into_model();
    let report = model
        .final_report()
        .cloned()
        .unwrap_or_else(|| model.report(summary.end_time));
    Ok(RunOutcome {
        summary,
        report,
        telemetry: model.telemetry().clone(),
        snapshots: model.snapshots().clone(),
    })
}

/// Runs and then hands the report to `store`. A store failure is returned
/// next to the outcome and does not discard it.
pub fn run_and_persist(
    params: &ServiceCenterParams,
    store: &mut dyn ReportStore,
) -> Result<(RunOutcome, Option<StoreError>), SimError> {
    let outcome = run_service_center(params)?;
    let store_error = persist_report(store, &outcome.report).err();
    Ok((outcome, store_error))
}

pub struct SimulationHandle {
    stop: StopHandle,
    pacing: PacingHandle,
    worker: JoinHandle<Result<RunOutcome, SimError>>,
}

impl SimulationHandle {
    /// Asks the worker to stop after its current tick.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Changes the wall-clock delay between ticks from the next tick on.
    /// `None` runs as fast as possible.
    pub fn set_pacing(&self, pacing: Option<Duration>) {
        self.pacing.set(pacing);
    }

    pub fn pacing(&self) -> Option<Duration> {
        self.pacing.get()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn join(self) -> Result<RunOutcome, SimError> {
        self.worker.join().map_err(|_| SimError::WorkerPanicked)?
    }
}

/// Starts a run on a dedicated thread. Configuration errors surface from
/// [SimulationHandle::join].
pub fn spawn_simulation(
    params: ServiceCenterParams,
) -> (SimulationHandle, Receiver<SimNotification>) {
    let (observer, notifications) = observer_channel();
    let stop = StopHandle::new();
    let pacing = PacingHandle::new(params.engine_config().pacing);
    let worker_stop = stop.clone();
    let worker_pacing = pacing.clone();
    let worker =
        thread::spawn(move || run_with_controls(&params, observer, worker_stop, worker_pacing));
    (
        SimulationHandle {
            stop,
            pacing,
            worker,
        },
        notifications,
    )
}
