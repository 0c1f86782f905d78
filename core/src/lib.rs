//! Ordinary-kriging core for volumetric interpolation of pod sensor networks.
//!
//! Pods report scalar estimates with longitude/latitude/elevation at discrete
//! timestamps. The modules below take those readings from ingestion through
//! gap repair, variogram fitting and kriging to one predicted-value volume and
//! one variance volume per timestamp.

pub mod dataset;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use prelude::{KrigeError, KrigeResult};
pub use processing::VolumeEstimator;
