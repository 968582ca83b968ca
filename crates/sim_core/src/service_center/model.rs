//! The vehicle service-center pipeline on top of the kernel.
//!
//! Customers arrive, pass reception, then optionally a mechanic and optionally
//! a wash before leaving. Each completion event finishes exactly one service
//! and routes that customer to exactly one next place.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::clock::{next_after, SimTime};
use crate::distributions::{ContinuousGenerator, SpeedAdjusted};
use crate::engine::{ModelLogic, SimContext};
use crate::entity::{Customer, EntityIdGen, Stage, WashProgram};
use crate::error::{ConfigError, KernelError};
use crate::event_list::Event;
use crate::observer::{ObserverHandle, SimNotification};
use crate::report::{SimulationReport, WashProgramCounts};
use crate::service_point::ServicePoint;
use crate::telemetry::{
    DepartedCustomerRecord, SimCounts, SimSnapshot, SimSnapshotConfig, SimSnapshots, SimTelemetry,
};

use super::params::{ServiceCenterParams, WashProbabilities};

pub const STAGES: [Stage; 3] = [Stage::Reception, Stage::Mechanic, Stage::Wash];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Arrival,
    ReceptionEnd,
    MechanicEnd,
    WashEnd,
}

impl EventKind {
    pub fn completion_of(stage: Stage) -> Self {
        match stage {
            Stage::Reception => EventKind::ReceptionEnd,
            Stage::Mechanic => EventKind::MechanicEnd,
            Stage::Wash => EventKind::WashEnd,
        }
    }

    /// Stage whose service this event completes, `None` for arrivals.
    pub fn stage(self) -> Option<Stage> {
        match self {
            EventKind::Arrival => None,
            EventKind::ReceptionEnd => Some(Stage::Reception),
            EventKind::MechanicEnd => Some(Stage::Mechanic),
            EventKind::WashEnd => Some(Stage::Wash),
        }
    }
}

pub struct ServiceCenterModel {
    seed: u64,
    rng: StdRng,
    prob_needs_mechanic: f64,
    prob_needs_wash: f64,
    wash_probabilities: WashProbabilities,
    arrivals: Box<dyn ContinuousGenerator>,
    reception: ServicePoint<Customer>,
    mechanic: ServicePoint<Customer>,
    wash: ServicePoint<Customer>,
    ids: EntityIdGen,
    departed: u64,
    total_time_in_system: f64,
    wash_counts: WashProgramCounts,
    observer: ObserverHandle,
    record_departures: bool,
    telemetry: SimTelemetry,
    snapshot_config: Option<SimSnapshotConfig>,
    snapshots: SimSnapshots,
    final_report: Option<SimulationReport>,
}

impl ServiceCenterModel {
    pub fn new(params: &ServiceCenterParams) -> Result<Self, ConfigError> {
        Self::with_observer(params, ObserverHandle::disconnected())
    }

    /// Builds the model. Every generator gets its own seed, drawn from a master
    /// RNG seeded with `params.seed`; routing draws continue on that RNG.
    pub fn with_observer(
        params: &ServiceCenterParams,
        observer: ObserverHandle,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let reception = build_point(params, Stage::Reception, &mut rng)?;
        let mechanic = build_point(params, Stage::Mechanic, &mut rng)?;
        let wash = build_point(params, Stage::Wash, &mut rng)?.with_adjustment(
            |customer: &Customer, _server, base| match customer.wash_program {
                Some(program) => base * program.service_multiplier(),
                None => base,
            },
        );
        let arrivals = params.inter_arrival.to_generator(next_seed(&mut rng))?;

        Ok(Self {
            seed: params.seed,
            rng,
            prob_needs_mechanic: params.prob_needs_mechanic,
            prob_needs_wash: params.prob_needs_wash,
            wash_probabilities: params.wash_probabilities.normalized(),
            arrivals,
            reception,
            mechanic,
            wash,
            ids: EntityIdGen::new(),
            departed: 0,
            total_time_in_system: 0.0,
            wash_counts: WashProgramCounts::default(),
            observer,
            record_departures: params.record_departures,
            telemetry: SimTelemetry::default(),
            snapshot_config: params.snapshots,
            snapshots: SimSnapshots::default(),
            final_report: None,
        })
    }

    pub fn point(&self, stage: Stage) -> &ServicePoint<Customer> {
        match stage {
            Stage::Reception => &self.reception,
            Stage::Mechanic => &self.mechanic,
            Stage::Wash => &self.wash,
        }
    }

    fn point_mut(&mut self, stage: Stage) -> &mut ServicePoint<Customer> {
        match stage {
            Stage::Reception => &mut self.reception,
            Stage::Mechanic => &mut self.mechanic,
            Stage::Wash => &mut self.wash,
        }
    }

    pub fn customers_created(&self) -> u64 {
        self.ids.issued()
    }

    pub fn customers_departed(&self) -> u64 {
        self.departed
    }

    /// Customers currently held by a service point.
    pub fn customers_in_system(&self) -> u64 {
        STAGES
            .iter()
            .map(|stage| self.point(*stage).in_service_point() as u64)
            .sum()
    }

    /// Every customer still in the center.
    pub fn customers(&self) -> impl Iterator<Item = &Customer> + '_ {
        self.reception
            .entities()
            .chain(self.mechanic.entities())
            .chain(self.wash.entities())
    }

    pub fn wash_counts(&self) -> WashProgramCounts {
        self.wash_counts
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        &self.telemetry
    }

    pub fn snapshots(&self) -> &SimSnapshots {
        &self.snapshots
    }

    /// Report built when the engine finished, if it has.
    pub fn final_report(&self) -> Option<&SimulationReport> {
        self.final_report.as_ref()
    }

    /// Current figures. Does not change any state.
    pub fn report(&self, now: SimTime) -> SimulationReport {
        SimulationReport {
            end_time: now,
            seed: self.seed,
            customers_created: self.customers_created(),
            customers_departed: self.departed,
            customers_in_system: self.customers_in_system(),
            avg_time_in_system: if self.departed > 0 {
                self.total_time_in_system / self.departed as f64
            } else {
                0.0
            },
            wash_programs: self.wash_counts,
            service_points: STAGES.iter().map(|s| self.point(*s).report(now)).collect(),
        }
    }

    pub fn snapshot(&self, now: SimTime) -> SimSnapshot {
        SimSnapshot {
            timestamp: now,
            counts: SimCounts {
                created: self.customers_created(),
                departed: self.departed,
                in_system: self.customers_in_system(),
            },
            points: STAGES.iter().map(|s| self.point(*s).snapshot()).collect(),
        }
    }

    fn draw_customer(&mut self, now: SimTime) -> Customer {
        let needs_mechanic = self.rng.gen::<f64>() < self.prob_needs_mechanic;
        let needs_wash = self.rng.gen::<f64>() < self.prob_needs_wash;
        let wash_program = needs_wash.then(|| {
            let p = self.rng.gen::<f64>();
            let probs = self.wash_probabilities;
            if p < probs.exterior {
                WashProgram::Exterior
            } else if p < probs.exterior + probs.interior {
                WashProgram::Interior
            } else {
                WashProgram::Both
            }
        });
        match wash_program {
            Some(WashProgram::Exterior) => self.wash_counts.exterior += 1,
            Some(WashProgram::Interior) => self.wash_counts.interior += 1,
            Some(WashProgram::Both) => self.wash_counts.both += 1,
            None => {}
        }
        Customer::new(self.ids.next_id(), now, needs_mechanic, wash_program)
    }

    fn handle_arrival(&mut self, ctx: &mut SimContext<'_, EventKind>) -> Result<(), KernelError> {
        let now = ctx.now();
        let customer = self.draw_customer(now);
        trace!(t = now, id = %customer.id, "arrival");
        self.observer.notify(SimNotification::EntityCreated {
            id: customer.id,
            at: now,
        });
        self.send_to(customer, None, Stage::Reception, now);

        let next = next_arrival_time(now, self.arrivals.sample());
        ctx.schedule_at(EventKind::Arrival, next)?;
        Ok(())
    }

    fn handle_completion(&mut self, stage: Stage, now: SimTime) -> Result<(), KernelError> {
        let Some(mut done) = self.point_mut(stage).finish_service(now) else {
            return Err(KernelError::NoRunningService {
                point: stage.label().to_string(),
                at: now,
            });
        };
        done.entity.mark_finished(done.end_time);
        trace!(t = now, id = %done.entity.id, stage = stage.label(), server = done.server_id, "service finished");

        match done.entity.next_stage(stage) {
            Some(next) => self.send_to(done.entity, Some(stage), next, now),
            None => self.depart(done.entity, now),
        }
        Ok(())
    }

    fn send_to(&mut self, mut customer: Customer, from: Option<Stage>, to: Stage, now: SimTime) {
        let id = customer.id;
        customer.enter(to, now);
        let server_id = self.point_mut(to).enqueue(customer, now);
        self.observer.notify(SimNotification::EntityMoved {
            id,
            from,
            to,
            server_id,
            at: now,
        });
    }

    fn depart(&mut self, mut customer: Customer, now: SimTime) {
        customer.depart(now);
        let time_in_system = now - customer.arrival_time;
        self.departed += 1;
        self.total_time_in_system += time_in_system;
        trace!(t = now, id = %customer.id, time_in_system, "departure");
        self.observer.notify(SimNotification::EntityDeparted {
            id: customer.id,
            at: now,
            time_in_system,
        });
        if self.record_departures {
            if let Some(record) = DepartedCustomerRecord::from_customer(&customer) {
                self.telemetry.departed.push(record);
            }
        }
    }
}

impl ModelLogic for ServiceCenterModel {
    type Kind = EventKind;

    fn initialize(&mut self, ctx: &mut SimContext<'_, EventKind>) -> Result<(), KernelError> {
        ctx.schedule_in(EventKind::Arrival, 0.0)?;
        Ok(())
    }

    fn on_event(
        &mut self,
        event: Event<EventKind>,
        ctx: &mut SimContext<'_, EventKind>,
    ) -> Result<(), KernelError> {
        match event.kind.stage() {
            None => self.handle_arrival(ctx),
            Some(stage) => self.handle_completion(stage, ctx.now()),
        }
    }

    fn try_start_all(&mut self, ctx: &mut SimContext<'_, EventKind>) -> Result<usize, KernelError> {
        let now = ctx.now();
        let mut started = 0;
        for stage in STAGES {
            let point = self.point_mut(stage);
            while let Some(start) = point.try_start(now) {
                start.entity.mark_started(start.server_id, now);
                trace!(
                    t = now,
                    id = %start.entity.id,
                    stage = stage.label(),
                    server = start.server_id,
                    wait = start.wait,
                    end = start.end_time,
                    "service started"
                );
                ctx.schedule_at(EventKind::completion_of(stage), start.end_time)?;
                started += 1;
            }
        }
        Ok(started)
    }

    fn outstanding_work(&self) -> usize {
        STAGES
            .iter()
            .map(|stage| self.point(*stage).queue_length())
            .sum()
    }

    fn after_tick(&mut self, now: SimTime) {
        if self.observer.is_connected() {
            let points = STAGES.iter().map(|s| self.point(*s).snapshot()).collect();
            self.observer
                .notify(SimNotification::QueueSnapshot { at: now, points });
        }
        if let Some(config) = self.snapshot_config {
            if self.snapshots.is_due(now, &config) {
                let snapshot = self.snapshot(now);
                self.snapshots.push(snapshot, &config);
            }
        }
    }

    fn finalize(&mut self, now: SimTime) {
        let report = self.report(now);
        debug!(
            created = report.customers_created,
            departed = report.customers_departed,
            in_system = report.customers_in_system,
            "service center finalized"
        );
        self.observer.notify(SimNotification::Finished {
            end_time: now,
            report: Box::new(report.clone()),
        });
        self.final_report = Some(report);
    }
}

fn next_seed(rng: &mut StdRng) -> u64 {
    rng.gen::<u64>()
}

/// `now + gap`, or the next representable time when the gap is degenerate or
/// the sum leaves the finite range.
fn next_arrival_time(now: SimTime, gap: f64) -> SimTime {
    let next = now + gap;
    if gap.is_finite() && gap > 0.0 && next.is_finite() && next > now {
        next
    } else {
        warn!(t = now, gap, "degenerate inter-arrival sample clamped");
        next_after(now)
    }
}

fn build_point(
    params: &ServiceCenterParams,
    stage: Stage,
    rng: &mut StdRng,
) -> Result<ServicePoint<Customer>, ConfigError> {
    let options = params.service(stage);
    let generators = params
        .speed_factors(stage)
        .into_iter()
        .map(|factor| {
            let base = options.to_generator(next_seed(rng))?;
            Ok(if factor == 1.0 {
                base
            } else {
                Box::new(SpeedAdjusted::new(base, factor)) as Box<dyn ContinuousGenerator>
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    ServicePoint::new(stage.label(), generators)
}
