pub mod gap;
pub mod grid;
pub mod solver;
pub mod variogram;
pub mod volume;

pub use gap::GapImputer;
pub use grid::{Bounds3, GridBuilder, GridConfig, SpatialGrid, DEFAULT_MARGIN_CELLS};
pub use solver::{KrigingSystem, NodeEstimate};
pub use variogram::{
    EmpiricalVariogram, ModelKind, VariogramFitter, VariogramModel, VariogramSettings,
    DEFAULT_NLAGS,
};
pub use volume::{VolumeEstimate, VolumeEstimator};
