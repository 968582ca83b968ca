//! Plain-data reports and snapshots handed to observers and storage.
//!
//! Everything here is an immutable value: building one never mutates the
//! simulation, so producing a report twice yields identical numbers.

use serde::{Deserialize, Serialize};

use crate::clock::SimTime;

/// Final figures for one server of a service point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReport {
    pub server_id: usize,
    pub served: u64,
    pub busy_time: f64,
    /// Busy time over elapsed simulation time, 0..=1.
    pub utilization: f64,
    pub avg_wait: f64,
    pub avg_service: f64,
    pub avg_total: f64,
}

/// Final figures for one service point, aggregated over its servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePointReport {
    pub label: String,
    pub servers: usize,
    pub served: u64,
    pub avg_wait: f64,
    pub avg_service: f64,
    pub avg_total: f64,
    /// Busy time over `servers * elapsed`, 0..=1.
    pub utilization: f64,
    pub busy_time: f64,
    pub queue_length: usize,
    pub degenerate_samples: u64,
    pub per_server: Vec<ServerReport>,
}

/// Momentary view of a service point, used for per-tick observer updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePointSnapshot {
    pub label: String,
    pub busy_servers: usize,
    pub total_servers: usize,
    pub queue_length: usize,
    pub served: u64,
    pub per_server_queue_lengths: Vec<usize>,
    pub per_server_busy: Vec<bool>,
}

/// Wash program counters drawn during routing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WashProgramCounts {
    pub exterior: u64,
    pub interior: u64,
    pub both: u64,
}

/// Aggregate report of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub end_time: SimTime,
    pub seed: u64,
    pub customers_created: u64,
    pub customers_departed: u64,
    pub customers_in_system: u64,
    /// Mean arrival-to-departure time over departed customers.
    pub avg_time_in_system: f64,
    pub wash_programs: WashProgramCounts,
    pub service_points: Vec<ServicePointReport>,
}

impl SimulationReport {
    pub fn service_point(&self, label: &str) -> Option<&ServicePointReport> {
        self.service_points.iter().find(|p| p.label == label)
    }

    /// Human-readable summary, one line per service point and server.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "t={:.3} created={} departed={} in_system={} avg_time_in_system={:.3}",
            self.end_time,
            self.customers_created,
            self.customers_departed,
            self.customers_in_system,
            self.avg_time_in_system
        ));
        for point in &self.service_points {
            lines.push(format!(
                "{}: servers={}, served={}, avgWait={:.3}, avgService={:.3}, avgTotal={:.3}, util={:.1}%",
                point.label,
                point.servers,
                point.served,
                point.avg_wait,
                point.avg_service,
                point.avg_total,
                point.utilization * 100.0
            ));
            if point.servers > 1 {
                for server in &point.per_server {
                    lines.push(format!(
                        "  {} #{}: served={}, busy={:.3}, util={:.1}%",
                        point.label,
                        server.server_id + 1,
                        server.served,
                        server.busy_time,
                        server.utilization * 100.0
                    ));
                }
            }
        }
        lines
    }
}
