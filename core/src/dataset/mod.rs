pub mod align;
pub mod ingest;
pub mod observation;
pub mod pod;

pub use ingest::{PodReader, DEFAULT_POD_SUFFIX, REQUIRED_COLUMNS};
pub use observation::{Frame, Observation, Timestamp};
pub use pod::{PodDataset, PodRecord, SpatialDataset};
