//! Fire-and-forget notifications from a running simulation.
//!
//! Notifications travel over an unbounded [mpsc] channel so the simulation
//! thread never blocks on a slow consumer. A dropped receiver is not an error;
//! the run simply stops publishing.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::clock::SimTime;
use crate::entity::{EntityId, Stage};
use crate::report::{ServicePointSnapshot, SimulationReport};

#[derive(Debug, Clone, PartialEq)]
pub enum SimNotification {
    EntityCreated {
        id: EntityId,
        at: SimTime,
    },
    /// `from == None` means the entity just arrived.
    EntityMoved {
        id: EntityId,
        from: Option<Stage>,
        to: Stage,
        server_id: usize,
        at: SimTime,
    },
    EntityDeparted {
        id: EntityId,
        at: SimTime,
        time_in_system: f64,
    },
    QueueSnapshot {
        at: SimTime,
        points: Vec<ServicePointSnapshot>,
    },
    Finished {
        end_time: SimTime,
        report: Box<SimulationReport>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ObserverHandle {
    sender: Option<Sender<SimNotification>>,
}

impl ObserverHandle {
    pub fn new(sender: Sender<SimNotification>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A handle that publishes nowhere.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    pub fn notify(&mut self, notification: SimNotification) {
        if let Some(sender) = &self.sender {
            if sender.send(notification).is_err() {
                // Receiver is gone; skip building further notifications.
                self.sender = None;
            }
        }
    }
}

pub fn observer_channel() -> (ObserverHandle, Receiver<SimNotification>) {
    let (tx, rx) = mpsc::channel();
    (ObserverHandle::new(tx), rx)
}
