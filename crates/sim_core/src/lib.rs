pub mod clock;
pub mod distributions;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event_list;
pub mod observer;
pub mod report;
pub mod runner;
pub mod service_center;
pub mod service_point;
pub mod store;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
