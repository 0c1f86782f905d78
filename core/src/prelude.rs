use std::path::PathBuf;

pub use crate::dataset::{Frame, Observation, SpatialDataset};
pub use crate::processing::{ModelKind, SpatialGrid, VariogramModel, VolumeEstimate};

/// Common error type for every stage of the kriging pipeline.
///
/// `Ingestion`, `GridConfig` and `VariogramConfig` abort a run;
/// `InsufficientData` and `Numerical` only invalidate the Frame that raised them.
#[derive(thiserror::Error, Debug)]
pub enum KrigeError {
    #[error("ingestion failed for {path}: {reason}")]
    Ingestion { path: PathBuf, reason: String },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("invalid grid configuration: {0}")]
    GridConfig(String),
    #[error("invalid variogram configuration: {0}")]
    VariogramConfig(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl KrigeError {
    pub fn ingestion(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Ingestion {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Frame-scoped errors skip the offending timestamp instead of aborting.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(self, Self::InsufficientData(_) | Self::Numerical(_))
    }
}

pub type KrigeResult<T> = Result<T, KrigeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_scoped_errors_are_classified() {
        assert!(KrigeError::InsufficientData("all NaN".into()).is_frame_scoped());
        assert!(KrigeError::Numerical("singular".into()).is_frame_scoped());
        assert!(!KrigeError::GridConfig("spacing".into()).is_frame_scoped());
        assert!(!KrigeError::VariogramConfig("negative nugget".into()).is_frame_scoped());
        assert!(!KrigeError::ingestion("pod_Field.txt", "missing column").is_frame_scoped());
    }

    #[test]
    fn ingestion_error_names_the_file() {
        let err = KrigeError::ingestion("A_Field.txt", "missing column `time`");
        assert_eq!(
            err.to_string(),
            "ingestion failed for A_Field.txt: missing column `time`"
        );
    }
}
