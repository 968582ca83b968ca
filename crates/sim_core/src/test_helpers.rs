//! Test helpers for kernel-level tests and benches.
//!
//! [SinglePointModel] drives one service point from a fixed list of arrival
//! times, so engine behavior can be checked without the service-center
//! routing on top.

use crate::clock::SimTime;
use crate::distributions::{ConstantGenerator, ContinuousGenerator};
use crate::engine::{ModelLogic, SimContext};
use crate::error::{ConfigError, KernelError};
use crate::event_list::Event;
use crate::service_point::ServicePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Arrival(usize),
    Completion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: usize,
    pub arrival: SimTime,
    pub start: Option<SimTime>,
    pub wait: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub id: usize,
    pub server_id: usize,
    pub arrival: SimTime,
    pub start: SimTime,
    pub end: SimTime,
    pub wait: f64,
}

impl CompletedJob {
    pub fn sojourn(&self) -> f64 {
        self.end - self.arrival
    }
}

pub struct SinglePointModel {
    arrivals: Vec<SimTime>,
    pub point: ServicePoint<Job>,
    pub completed: Vec<CompletedJob>,
    /// `(time, server_id, job id)` for every started service.
    pub started_log: Vec<(SimTime, usize, usize)>,
    pub finalized: u32,
}

impl SinglePointModel {
    pub fn new(
        arrivals: Vec<SimTime>,
        generators: Vec<Box<dyn ContinuousGenerator>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            arrivals,
            point: ServicePoint::new("Point", generators)?,
            completed: Vec::new(),
            started_log: Vec::new(),
            finalized: 0,
        })
    }

    /// `servers` servers that always take `service` time units.
    pub fn constant(servers: usize, service: f64, arrivals: Vec<SimTime>) -> Self {
        let generators = (0..servers)
            .map(|_| Box::new(ConstantGenerator::new(service)) as Box<dyn ContinuousGenerator>)
            .collect();
        match Self::new(arrivals, generators) {
            Ok(model) => model,
            Err(err) => panic!("test model needs at least one server: {err}"),
        }
    }
}

impl ModelLogic for SinglePointModel {
    type Kind = JobEvent;

    fn initialize(&mut self, ctx: &mut SimContext<'_, JobEvent>) -> Result<(), KernelError> {
        for (id, time) in self.arrivals.iter().enumerate() {
            ctx.schedule_at(JobEvent::Arrival(id), *time)?;
        }
        Ok(())
    }

    fn on_event(
        &mut self,
        event: Event<JobEvent>,
        ctx: &mut SimContext<'_, JobEvent>,
    ) -> Result<(), KernelError> {
        let now = ctx.now();
        match event.kind {
            JobEvent::Arrival(id) => {
                self.point.enqueue(
                    Job {
                        id,
                        arrival: now,
                        start: None,
                        wait: None,
                    },
                    now,
                );
            }
            JobEvent::Completion => {
                let done = self
                    .point
                    .finish_service(now)
                    .ok_or_else(|| KernelError::NoRunningService {
                        point: self.point.label().to_string(),
                        at: now,
                    })?;
                self.completed.push(CompletedJob {
                    id: done.entity.id,
                    server_id: done.server_id,
                    arrival: done.entity.arrival,
                    start: done.start_time,
                    end: done.end_time,
                    wait: done.entity.wait.unwrap_or(0.0),
                });
            }
        }
        Ok(())
    }

    fn try_start_all(&mut self, ctx: &mut SimContext<'_, JobEvent>) -> Result<usize, KernelError> {
        let now = ctx.now();
        let mut started = 0;
        while let Some(start) = self.point.try_start(now) {
            start.entity.start = Some(now);
            start.entity.wait = Some(start.wait);
            self.started_log.push((now, start.server_id, start.entity.id));
            ctx.schedule_at(JobEvent::Completion, start.end_time)?;
            started += 1;
        }
        Ok(started)
    }

    fn outstanding_work(&self) -> usize {
        self.point.queue_length()
    }

    fn finalize(&mut self, _now: SimTime) {
        self.finalized += 1;
    }
}
