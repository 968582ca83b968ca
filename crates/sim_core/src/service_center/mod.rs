//! Vehicle service center: reception, mechanics and wash bays.

mod model;
mod params;

pub use model::{EventKind, ServiceCenterModel, STAGES};
pub use params::{ServiceCenterParams, WashProbabilities};
