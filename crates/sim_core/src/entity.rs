//! Customers flowing through the service center.

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out strictly increasing ids, starting at 1. Owned by the model so
/// two runs in one process never share a counter.
#[derive(Debug, Clone, Default)]
pub struct EntityIdGen {
    last: u64,
}

impl EntityIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> EntityId {
        self.last += 1;
        EntityId(self.last)
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WashProgram {
    Exterior,
    Interior,
    Both,
}

impl WashProgram {
    /// Multiplier applied to the sampled wash duration.
    pub fn service_multiplier(self) -> f64 {
        match self {
            WashProgram::Exterior => 0.8,
            WashProgram::Interior => 1.0,
            WashProgram::Both => 1.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reception,
    Mechanic,
    Wash,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Reception => "Reception",
            Stage::Mechanic => "Mechanic",
            Stage::Wash => "Wash",
        }
    }
}

/// Timestamps of one stage visit. `start`/`end` stay `None` until the
/// service point reports them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageVisit {
    pub stage: Stage,
    pub enqueued_at: SimTime,
    pub server_id: Option<usize>,
    pub start: Option<SimTime>,
    pub end: Option<SimTime>,
}

impl StageVisit {
    pub fn wait(&self) -> Option<f64> {
        self.start.map(|start| (start - self.enqueued_at).max(0.0))
    }

    pub fn service(&self) -> Option<f64> {
        Some(self.end? - self.start?)
    }
}

/// A vehicle visiting the center. Routing decisions are drawn once on
/// arrival and never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub arrival_time: SimTime,
    pub needs_mechanic: bool,
    pub needs_wash: bool,
    pub wash_program: Option<WashProgram>,
    pub visits: Vec<StageVisit>,
    pub departure_time: Option<SimTime>,
}

impl Customer {
    pub fn new(
        id: EntityId,
        arrival_time: SimTime,
        needs_mechanic: bool,
        wash_program: Option<WashProgram>,
    ) -> Self {
        Self {
            id,
            arrival_time,
            needs_mechanic,
            needs_wash: wash_program.is_some(),
            wash_program,
            visits: Vec::with_capacity(3),
            departure_time: None,
        }
    }

    /// Opens a visit record for `stage`.
    pub fn enter(&mut self, stage: Stage, now: SimTime) {
        self.visits.push(StageVisit {
            stage,
            enqueued_at: now,
            server_id: None,
            start: None,
            end: None,
        });
    }

    pub fn mark_started(&mut self, server_id: usize, now: SimTime) {
        if let Some(visit) = self.visits.last_mut() {
            visit.server_id = Some(server_id);
            visit.start = Some(now);
        }
    }

    pub fn mark_finished(&mut self, end: SimTime) {
        if let Some(visit) = self.visits.last_mut() {
            visit.end = Some(end);
        }
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.visits.last().map(|visit| visit.stage)
    }

    pub fn visit(&self, stage: Stage) -> Option<&StageVisit> {
        self.visits.iter().find(|visit| visit.stage == stage)
    }

    /// Stage that follows `stage` for this customer, or `None` to depart.
    pub fn next_stage(&self, stage: Stage) -> Option<Stage> {
        match stage {
            Stage::Reception if self.needs_mechanic => Some(Stage::Mechanic),
            Stage::Reception | Stage::Mechanic if self.needs_wash => Some(Stage::Wash),
            _ => None,
        }
    }

    pub fn depart(&mut self, now: SimTime) {
        self.departure_time = Some(now);
    }

    pub fn time_in_system(&self) -> Option<f64> {
        self.departure_time.map(|t| t - self.arrival_time)
    }

    pub fn total_wait(&self) -> f64 {
        self.visits.iter().filter_map(StageVisit::wait).sum()
    }
}
