//! Error types for configuration, kernel invariants and persistence.
//!
//! Configuration errors are raised while building a simulation and never after
//! the first tick. Kernel errors indicate a broken invariant and stop the run.
//! Numeric degeneracy in sampled durations is not an error: it is clamped and
//! logged where it happens.

use thiserror::Error;

use crate::clock::SimTime;
use crate::engine::EngineState;

/// Invalid input detected before any simulation step runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service point `{point}` must have at least one server")]
    InvalidCapacity { point: String },

    #[error("simulation horizon must be positive and finite, got {0}")]
    InvalidHorizon(SimTime),

    #[error("invalid `{name}` distribution: {reason}")]
    InvalidDistribution { name: String, reason: String },

    #[error("probability `{name}` must be within [0, 1], got {value}")]
    InvalidProbability { name: String, value: f64 },

    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A kernel invariant was violated. These are bugs, not bad input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("clock cannot move backwards or to a non-finite time: now={current}, target={target}")]
    ClockReversal { current: SimTime, target: SimTime },

    #[error("event time must be finite and non-negative, got {0}")]
    InvalidEventTime(SimTime),

    #[error("attempted to remove an event from an empty event list")]
    EmptyEventList,

    #[error("completion at t={at} for service point `{point}` found no running service")]
    NoRunningService { point: String, at: SimTime },

    #[error("invalid engine transition from {from:?}")]
    InvalidTransition { from: EngineState },
}

/// Any failure that ends a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("simulation worker panicked")]
    WorkerPanicked,
}

/// Failure while handing a finished report to a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("store rejected report: {0}")]
    Rejected(String),
}
