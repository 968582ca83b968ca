//! Multi-server service point: per-server FIFO queues, server assignment,
//! service-time sampling and statistics.
//!
//! A service point knows nothing about the flow between stations. It exposes
//! two verbs, [ServicePoint::enqueue] and the start/finish pair
//! ([ServicePoint::try_start], [ServicePoint::finish_service]), plus read-only
//! analytics. The caller schedules the completion event for every started
//! service.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

use crate::clock::{next_after, SimTime, TIME_EPSILON};
use crate::distributions::ContinuousGenerator;
use crate::error::ConfigError;
use crate::report::{ServerReport, ServicePointReport, ServicePointSnapshot};

/// Per-entity service-time hook: `(entity, server_id, base_sample) -> sample`.
pub type ServiceTimeAdjustment<E> = Box<dyn Fn(&E, usize, f64) -> f64 + Send>;

/// Returned by [ServicePoint::try_start]. `entity` borrows the entity in its
/// server slot so the caller can stamp it.
pub struct StartRecord<'a, E> {
    pub entity: &'a mut E,
    pub server_id: usize,
    pub service_time: f64,
    pub end_time: SimTime,
    pub wait: f64,
}

impl<E: fmt::Debug> fmt::Debug for StartRecord<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartRecord")
            .field("entity", &self.entity)
            .field("server_id", &self.server_id)
            .field("service_time", &self.service_time)
            .field("end_time", &self.end_time)
            .field("wait", &self.wait)
            .finish()
    }
}

/// Returned by [ServicePoint::finish_service]; ownership of the entity moves
/// back to the caller, which must route it on or retire it.
#[derive(Debug, Clone, PartialEq)]
pub struct EndRecord<E> {
    pub entity: E,
    pub server_id: usize,
    pub start_time: SimTime,
    pub end_time: SimTime,
}

#[derive(Debug)]
struct Queued<E> {
    entity: E,
    enqueued_at: SimTime,
}

#[derive(Debug)]
struct Active<E> {
    entity: E,
    start: SimTime,
    end: SimTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ServerStats {
    started: u64,
    served: u64,
    busy_time: f64,
    total_wait: f64,
}

impl ServerStats {
    fn average_service(&self) -> Option<f64> {
        (self.served > 0).then(|| self.busy_time / self.served as f64)
    }

    fn average_wait(&self) -> f64 {
        if self.started > 0 {
            self.total_wait / self.started as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
struct Server<E> {
    generator: Box<dyn ContinuousGenerator>,
    queue: VecDeque<Queued<E>>,
    active: Option<Active<E>>,
    stats: ServerStats,
}

impl<E> Server<E> {
    fn outstanding(&self) -> usize {
        self.queue.len() + usize::from(self.active.is_some())
    }
}

pub struct ServicePoint<E> {
    label: String,
    servers: Vec<Server<E>>,
    adjustment: Option<ServiceTimeAdjustment<E>>,
    degenerate_samples: u64,
}

impl<E: fmt::Debug> fmt::Debug for ServicePoint<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePoint")
            .field("label", &self.label)
            .field("servers", &self.servers)
            .field("adjustment", &self.adjustment.is_some())
            .field("degenerate_samples", &self.degenerate_samples)
            .finish()
    }
}

impl<E> ServicePoint<E> {
    /// One server per generator. An empty list is a zero-capacity point and
    /// is rejected.
    pub fn new(
        label: impl Into<String>,
        generators: Vec<Box<dyn ContinuousGenerator>>,
    ) -> Result<Self, ConfigError> {
        let label = label.into();
        if generators.is_empty() {
            return Err(ConfigError::InvalidCapacity { point: label });
        }
        let servers = generators
            .into_iter()
            .map(|generator| Server {
                generator,
                queue: VecDeque::new(),
                active: None,
                stats: ServerStats::default(),
            })
            .collect();
        Ok(Self {
            label,
            servers,
            adjustment: None,
            degenerate_samples: 0,
        })
    }

    pub fn single(
        label: impl Into<String>,
        generator: Box<dyn ContinuousGenerator>,
    ) -> Result<Self, ConfigError> {
        Self::new(label, vec![generator])
    }

    /// Installs a hook that rewrites every sampled duration before use.
    pub fn with_adjustment<F>(mut self, adjust: F) -> Self
    where
        F: Fn(&E, usize, f64) -> f64 + Send + 'static,
    {
        self.adjustment = Some(Box::new(adjust));
        self
    }

    /// Appends `entity` to the queue of the server with the smallest estimated
    /// completion of its assigned work and returns that server's index.
    pub fn enqueue(&mut self, entity: E, now: SimTime) -> usize {
        let server_id = self.select_server(now);
        self.servers[server_id].queue.push_back(Queued {
            entity,
            enqueued_at: now,
        });
        server_id
    }

    /// Estimated time until everything already assigned to `server_id` is done:
    /// queued count times the running average service time, plus whatever
    /// remains of the current service.
    pub fn estimated_completion(&self, server_id: usize, now: SimTime) -> f64 {
        let Some(server) = self.servers.get(server_id) else {
            return f64::INFINITY;
        };
        let average = server.stats.average_service().unwrap_or(0.0);
        let remaining = server
            .active
            .as_ref()
            .map(|active| (active.end - now).max(0.0))
            .unwrap_or(0.0);
        server.queue.len() as f64 * average + remaining
    }

    fn select_server(&self, now: SimTime) -> usize {
        // Ties on the estimate go to the server with less outstanding work, then
        // to the lowest index, so an empty point fills servers 0..N in order.
        (0..self.servers.len())
            .map(|i| (self.estimated_completion(i, now), self.servers[i].outstanding(), i))
            .min_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then_with(|| a.1.cmp(&b.1))
                    .then_with(|| a.2.cmp(&b.2))
            })
            .map(|(_, _, i)| i)
            .unwrap_or(0)
    }

    /// Starts service on the first idle server (by index) that has a waiting
    /// entity. Returns `None` when no server can start.
    pub fn try_start(&mut self, now: SimTime) -> Option<StartRecord<'_, E>> {
        let server_id = self
            .servers
            .iter()
            .position(|s| s.active.is_none() && !s.queue.is_empty())?;
        let server = &mut self.servers[server_id];
        let queued = server.queue.pop_front()?;
        let wait = (now - queued.enqueued_at).max(0.0);

        let base = server.generator.sample();
        let raw = match self.adjustment.as_ref() {
            Some(adjust) => adjust(&queued.entity, server_id, base),
            None => base,
        };
        let end = if raw.is_finite() && raw > 0.0 {
            let end = now + raw;
            if !end.is_finite() {
                self.degenerate_samples += 1;
                warn!(point = %self.label, server_id, raw, now, "service end time overflows, clamped");
                next_after(now)
            } else if end > now {
                end
            } else {
                debug!(point = %self.label, server_id, raw, now, "service time below clock resolution");
                next_after(now)
            }
        } else {
            self.degenerate_samples += 1;
            warn!(point = %self.label, server_id, raw, now, "degenerate service time sample clamped");
            next_after(now)
        };

        server.stats.started += 1;
        server.stats.total_wait += wait;
        let active = server.active.insert(Active {
            entity: queued.entity,
            start: now,
            end,
        });
        Some(StartRecord {
            entity: &mut active.entity,
            server_id,
            service_time: end - now,
            end_time: end,
            wait,
        })
    }

    /// Completes the service with the earliest end time that is due at `now`
    /// (within [TIME_EPSILON]). Ties go to the lowest server index.
    pub fn finish_service(&mut self, now: SimTime) -> Option<EndRecord<E>> {
        let (server_id, _) = self
            .servers
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.active
                    .as_ref()
                    .filter(|active| active.end - now <= TIME_EPSILON)
                    .map(|active| (i, active.end))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))?;

        let server = &mut self.servers[server_id];
        let active = server.active.take()?;
        server.stats.served += 1;
        server.stats.busy_time += (active.end - active.start).max(0.0);
        Some(EndRecord {
            entity: active.entity,
            server_id,
            start_time: active.start,
            end_time: active.end,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> usize {
        self.servers.len()
    }

    pub fn served_count(&self) -> u64 {
        self.servers.iter().map(|s| s.stats.served).sum()
    }

    pub fn started_count(&self) -> u64 {
        self.servers.iter().map(|s| s.stats.started).sum()
    }

    pub fn busy_time(&self) -> f64 {
        self.servers.iter().map(|s| s.stats.busy_time).sum()
    }

    pub fn total_wait_time(&self) -> f64 {
        self.servers.iter().map(|s| s.stats.total_wait).sum()
    }

    pub fn average_service_time(&self) -> f64 {
        let served = self.served_count();
        if served > 0 {
            self.busy_time() / served as f64
        } else {
            0.0
        }
    }

    /// Mean wait over every service started so far.
    pub fn average_wait_time(&self) -> f64 {
        let started = self.started_count();
        if started > 0 {
            self.total_wait_time() / started as f64
        } else {
            0.0
        }
    }

    pub fn utilization(&self, now: SimTime) -> f64 {
        if now > 0.0 {
            self.busy_time() / (self.capacity() as f64 * now)
        } else {
            0.0
        }
    }

    pub fn degenerate_samples(&self) -> u64 {
        self.degenerate_samples
    }

    pub fn queue_length(&self) -> usize {
        self.servers.iter().map(|s| s.queue.len()).sum()
    }

    pub fn queue_lengths(&self) -> Vec<usize> {
        self.servers.iter().map(|s| s.queue.len()).collect()
    }

    pub fn busy_flags(&self) -> Vec<bool> {
        self.servers.iter().map(|s| s.active.is_some()).collect()
    }

    pub fn busy_server_count(&self) -> usize {
        self.servers.iter().filter(|s| s.active.is_some()).count()
    }

    pub fn is_busy(&self) -> bool {
        self.busy_server_count() > 0
    }

    /// Servers that are idle and have someone waiting.
    pub fn startable_count(&self) -> usize {
        self.servers
            .iter()
            .filter(|s| s.active.is_none() && !s.queue.is_empty())
            .count()
    }

    pub fn next_end_time(&self) -> SimTime {
        self.servers
            .iter()
            .filter_map(|s| s.active.as_ref().map(|a| a.end))
            .fold(SimTime::INFINITY, SimTime::min)
    }

    /// Entities held here, serving plus queued.
    pub fn in_service_point(&self) -> usize {
        self.servers.iter().map(Server::outstanding).sum()
    }

    /// Every entity currently held, in-service first then queued, by server.
    pub fn entities(&self) -> impl Iterator<Item = &E> + '_ {
        self.servers.iter().flat_map(|s| {
            s.active
                .as_ref()
                .map(|a| &a.entity)
                .into_iter()
                .chain(s.queue.iter().map(|q| &q.entity))
        })
    }

    pub fn snapshot(&self) -> ServicePointSnapshot {
        ServicePointSnapshot {
            label: self.label.clone(),
            busy_servers: self.busy_server_count(),
            total_servers: self.capacity(),
            queue_length: self.queue_length(),
            served: self.served_count(),
            per_server_queue_lengths: self.queue_lengths(),
            per_server_busy: self.busy_flags(),
        }
    }

    /// Aggregate and per-server figures at `now`. Pure read.
    pub fn report(&self, now: SimTime) -> ServicePointReport {
        let per_server = self
            .servers
            .iter()
            .enumerate()
            .map(|(server_id, s)| {
                let avg_wait = s.stats.average_wait();
                let avg_service = s.stats.average_service().unwrap_or(0.0);
                ServerReport {
                    server_id,
                    served: s.stats.served,
                    busy_time: s.stats.busy_time,
                    utilization: if now > 0.0 { s.stats.busy_time / now } else { 0.0 },
                    avg_wait,
                    avg_service,
                    avg_total: avg_wait + avg_service,
                }
            })
            .collect();
        let avg_wait = self.average_wait_time();
        let avg_service = self.average_service_time();
        ServicePointReport {
            label: self.label.clone(),
            servers: self.capacity(),
            served: self.served_count(),
            avg_wait,
            avg_service,
            avg_total: avg_wait + avg_service,
            utilization: self.utilization(now),
            busy_time: self.busy_time(),
            queue_length: self.queue_length(),
            degenerate_samples: self.degenerate_samples,
            per_server,
        }
    }
}
