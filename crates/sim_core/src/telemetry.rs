//! Telemetry: departed-customer records and periodic queue snapshots.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;
use crate::entity::{Customer, Stage, WashProgram};
use crate::report::ServicePointSnapshot;

/// One customer that left the center, with per-stage timings.
/// Stages the customer skipped are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartedCustomerRecord {
    pub id: u64,
    pub arrival_time: SimTime,
    pub departure_time: SimTime,
    pub needs_mechanic: bool,
    pub wash_program: Option<WashProgram>,
    pub reception_wait: Option<f64>,
    pub reception_service: Option<f64>,
    pub mechanic_wait: Option<f64>,
    pub mechanic_service: Option<f64>,
    pub wash_wait: Option<f64>,
    pub wash_service: Option<f64>,
}

impl DepartedCustomerRecord {
    /// `None` while the customer is still in the system.
    pub fn from_customer(customer: &Customer) -> Option<Self> {
        let departure_time = customer.departure_time?;
        let wait = |stage| customer.visit(stage).and_then(|v| v.wait());
        let service = |stage| customer.visit(stage).and_then(|v| v.service());
        Some(Self {
            id: customer.id.0,
            arrival_time: customer.arrival_time,
            departure_time,
            needs_mechanic: customer.needs_mechanic,
            wash_program: customer.wash_program,
            reception_wait: wait(Stage::Reception),
            reception_service: service(Stage::Reception),
            mechanic_wait: wait(Stage::Mechanic),
            mechanic_service: service(Stage::Mechanic),
            wash_wait: wait(Stage::Wash),
            wash_service: service(Stage::Wash),
        })
    }

    pub fn time_in_system(&self) -> f64 {
        self.departure_time - self.arrival_time
    }
}

/// Collected departures. Disabled telemetry keeps the vector empty.
#[derive(Debug, Default, Clone)]
pub struct SimTelemetry {
    pub departed: Vec<DepartedCustomerRecord>,
}

/// Population counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimCounts {
    pub created: u64,
    pub departed: u64,
    pub in_system: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub timestamp: SimTime,
    pub counts: SimCounts,
    pub points: Vec<ServicePointSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshotConfig {
    /// Minimum simulated time between two snapshots.
    pub interval: f64,
    pub max_snapshots: usize,
}

impl Default for SimSnapshotConfig {
    fn default() -> Self {
        Self {
            interval: 60.0,
            max_snapshots: 10_000,
        }
    }
}

/// Rolling snapshot buffer; the oldest snapshot is dropped when full.
#[derive(Debug, Default, Clone)]
pub struct SimSnapshots {
    pub snapshots: VecDeque<SimSnapshot>,
    pub last_snapshot_at: Option<SimTime>,
}

impl SimSnapshots {
    pub fn is_due(&self, now: SimTime, config: &SimSnapshotConfig) -> bool {
        match self.last_snapshot_at {
            None => true,
            Some(last) => now - last >= config.interval,
        }
    }

    pub fn push(&mut self, snapshot: SimSnapshot, config: &SimSnapshotConfig) {
        if config.max_snapshots == 0 {
            return;
        }
        self.last_snapshot_at = Some(snapshot.timestamp);
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > config.max_snapshots {
            self.snapshots.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&SimSnapshot> {
        self.snapshots.back()
    }
}
