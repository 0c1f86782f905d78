use crate::dataset::{Frame, Timestamp};
use crate::prelude::{KrigeError, KrigeResult};
use crate::processing::gap::GapImputer;
use crate::processing::grid::SpatialGrid;
use crate::processing::solver::KrigingSystem;
use crate::processing::variogram::{ModelKind, VariogramFitter, VariogramModel, VariogramSettings};
use crate::telemetry::log::LogManager;
use ndarray::{Array3, ArrayView2, Axis};

/// Predicted values and kriging variances of one Frame, shaped `[|x|, |y|, |z|]`.
#[derive(Debug, Clone)]
pub struct VolumeEstimate {
    pub frame_index: usize,
    pub timestamp: Timestamp,
    pub values: Array3<f64>,
    pub variances: Array3<f64>,
    pub model: VariogramModel,
    /// Observations repaired by the gap imputer.
    pub imputed: usize,
    pub jittered: bool,
}

impl VolumeEstimate {
    pub fn shape(&self) -> [usize; 3] {
        let dim = self.values.dim();
        [dim.0, dim.1, dim.2]
    }

    /// The `[x][y]` plane at elevation index `k`.
    pub fn value_slice(&self, k: usize) -> Option<ArrayView2<'_, f64>> {
        (k < self.values.len_of(Axis(2))).then(|| self.values.index_axis(Axis(2), k))
    }

    pub fn variance_slice(&self, k: usize) -> Option<ArrayView2<'_, f64>> {
        (k < self.variances.len_of(Axis(2))).then(|| self.variances.index_axis(Axis(2), k))
    }

    pub fn is_nugget_fallback(&self) -> bool {
        matches!(self.model, VariogramModel::PureNugget { .. })
    }
}

/// Runs one Frame through imputation, variogram fitting and kriging.
///
/// Holds only configuration; every call is independent, so one estimator
/// can be shared by parallel workers.
#[derive(Debug, Clone)]
pub struct VolumeEstimator {
    fitter: VariogramFitter,
    logger: LogManager,
}

impl VolumeEstimator {
    pub fn new(fitter: VariogramFitter) -> Self {
        Self {
            fitter,
            logger: LogManager::new("volume"),
        }
    }

    /// Fails when the settings carry an out-of-range fixed model.
    pub fn from_settings(settings: &VariogramSettings) -> KrigeResult<Self> {
        Ok(Self::new(VariogramFitter::from_settings(settings)?))
    }

    /// One-shot estimate with default fitting options for `kind`.
    pub fn estimate(frame: &Frame, grid: &SpatialGrid, kind: ModelKind) -> KrigeResult<VolumeEstimate> {
        Self::new(VariogramFitter::new(kind)).run(frame, grid)
    }

    pub fn run(&self, frame: &Frame, grid: &SpatialGrid) -> KrigeResult<VolumeEstimate> {
        let mut frame = frame.clone();
        let imputed = GapImputer::impute_in_place(&mut frame)?;
        if imputed > 0 {
            self.logger.detail(&format!(
                "imputed {} of {} observations at {}",
                imputed,
                frame.len(),
                frame.timestamp.label
            ));
        }

        let points = frame.points();
        let values = frame.values();
        let model = self.fitter.fit_or_nugget(&points, &values);
        let system = KrigingSystem::new(&points, &values, model)?;

        let nodes = grid.nodes();
        let estimates = system.solve_many(&nodes)?;
        let shape = grid.shape();
        let dims = (shape[0], shape[1], shape[2]);
        let to_volume = |data: Vec<f64>| {
            Array3::from_shape_vec(dims, data)
                .map_err(|e| KrigeError::Numerical(format!("volume assembly failed: {e}")))
        };
        let values_volume = to_volume(estimates.iter().map(|e| e.value).collect())?;
        let variances_volume = to_volume(estimates.iter().map(|e| e.variance).collect())?;

        self.logger.detail(&format!(
            "frame {} ({}) kriged onto {} nodes with {} model",
            frame.index,
            frame.timestamp.label,
            nodes.len(),
            model.name()
        ));

        Ok(VolumeEstimate {
            frame_index: frame.index,
            timestamp: frame.timestamp.clone(),
            values: values_volume,
            variances: variances_volume,
            model,
            imputed,
            jittered: system.was_jittered(),
        })
    }
}
