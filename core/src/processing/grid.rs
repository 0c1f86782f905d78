use crate::prelude::{KrigeError, KrigeResult};
use serde::{Deserialize, Serialize};

/// Margin cells added on each side of the data extent in auto mode.
pub const DEFAULT_MARGIN_CELLS: usize = 2;

/// Upper limit on nodes per axis; protects against a spacing typo exhausting memory.
pub const MAX_AXIS_NODES: usize = 4096;

const AXIS_NAMES: [&str; 3] = ["x (longitude)", "y (latitude)", "z (elevation)"];

fn default_margin_cells() -> usize {
    DEFAULT_MARGIN_CELLS
}

/// Axis-aligned box given by per-axis minimum and maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// How the evaluation lattice is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GridConfig {
    /// Spacing = extent / cells, padded by `margin_cells` on each side.
    Auto {
        cells: [usize; 3],
        #[serde(default = "default_margin_cells")]
        margin_cells: usize,
    },
    /// Explicit bounds stepped by an explicit spacing, no margin.
    Bounded { bounds: Bounds3, spacing: [f64; 3] },
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::Auto {
            cells: [5, 5, 5],
            margin_cells: DEFAULT_MARGIN_CELLS,
        }
    }
}

/// Rectilinear 3D lattice described by three strictly increasing axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    axes: [Vec<f64>; 3],
}

impl SpatialGrid {
    pub fn from_axes(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> KrigeResult<Self> {
        let axes = [x, y, z];
        for (axis, values) in axes.iter().enumerate() {
            if values.is_empty() {
                return Err(KrigeError::GridConfig(format!(
                    "axis {} has no nodes",
                    AXIS_NAMES[axis]
                )));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(KrigeError::GridConfig(format!(
                    "axis {} contains a non-finite coordinate",
                    AXIS_NAMES[axis]
                )));
            }
            if values.windows(2).any(|w| w[1] <= w[0]) {
                return Err(KrigeError::GridConfig(format!(
                    "axis {} is not strictly increasing",
                    AXIS_NAMES[axis]
                )));
            }
        }
        Ok(Self { axes })
    }

    pub fn axis(&self, axis: usize) -> &[f64] {
        &self.axes[axis]
    }

    pub fn x(&self) -> &[f64] {
        &self.axes[0]
    }

    pub fn y(&self) -> &[f64] {
        &self.axes[1]
    }

    pub fn z(&self) -> &[f64] {
        &self.axes[2]
    }

    /// `[|x|, |y|, |z|]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.axes[0].len(), self.axes[1].len(), self.axes[2].len()]
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [self.axes[0][i], self.axes[1][j], self.axes[2][k]]
    }

    /// Node coordinates in row-major `[x][y][z]` order.
    pub fn nodes(&self) -> Vec<[f64; 3]> {
        let [nx, ny, nz] = self.shape();
        let mut nodes = Vec::with_capacity(nx * ny * nz);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    nodes.push(self.node(i, j, k));
                }
            }
        }
        nodes
    }

    /// Index of the node closest to `point` along each axis.
    pub fn nearest_index(&self, point: [f64; 3]) -> [usize; 3] {
        let mut index = [0usize; 3];
        for (axis, slot) in index.iter_mut().enumerate() {
            *slot = self.axes[axis]
                .iter()
                .enumerate()
                .min_by(|a, b| (a.1 - point[axis]).abs().total_cmp(&(b.1 - point[axis]).abs()))
                .map(|(idx, _)| idx)
                .unwrap_or(0);
        }
        index
    }
}

/// Derives a [`SpatialGrid`] from a [`GridConfig`].
pub struct GridBuilder;

impl GridBuilder {
    /// `extrema` is required by auto mode and ignored by bounded mode.
    pub fn build(config: &GridConfig, extrema: Option<&Bounds3>) -> KrigeResult<SpatialGrid> {
        match config {
            GridConfig::Auto {
                cells,
                margin_cells,
            } => {
                let extrema = extrema.ok_or_else(|| {
                    KrigeError::GridConfig("auto grid needs data extrema but none are available".into())
                })?;
                Self::auto(extrema, *cells, *margin_cells)
            }
            GridConfig::Bounded { bounds, spacing } => Self::bounded(bounds, *spacing),
        }
    }

    pub fn auto(extrema: &Bounds3, cells: [usize; 3], margin_cells: usize) -> KrigeResult<SpatialGrid> {
        let mut axes: [Vec<f64>; 3] = Default::default();
        for axis in 0..3 {
            let (lo, hi) = Self::checked_extent(extrema, axis)?;
            if cells[axis] == 0 {
                return Err(KrigeError::GridConfig(format!(
                    "cell count for axis {} must be positive",
                    AXIS_NAMES[axis]
                )));
            }
            let spacing = (hi - lo) / cells[axis] as f64;
            Self::check_spacing(spacing, axis)?;
            let margin = margin_cells as f64 * spacing;
            axes[axis] = Self::axis(lo - margin, hi + margin, spacing, axis)?;
        }
        let [x, y, z] = axes;
        SpatialGrid::from_axes(x, y, z)
    }

    pub fn bounded(bounds: &Bounds3, spacing: [f64; 3]) -> KrigeResult<SpatialGrid> {
        let mut axes: [Vec<f64>; 3] = Default::default();
        for axis in 0..3 {
            let (lo, hi) = Self::checked_extent(bounds, axis)?;
            Self::check_spacing(spacing[axis], axis)?;
            axes[axis] = Self::axis(lo, hi, spacing[axis], axis)?;
        }
        let [x, y, z] = axes;
        SpatialGrid::from_axes(x, y, z)
    }

    fn checked_extent(bounds: &Bounds3, axis: usize) -> KrigeResult<(f64, f64)> {
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if !lo.is_finite() || !hi.is_finite() {
            return Err(KrigeError::GridConfig(format!(
                "bounds for axis {} are not finite",
                AXIS_NAMES[axis]
            )));
        }
        if lo >= hi {
            return Err(KrigeError::GridConfig(format!(
                "axis {} has min {} >= max {}",
                AXIS_NAMES[axis], lo, hi
            )));
        }
        Ok((lo, hi))
    }

    fn check_spacing(spacing: f64, axis: usize) -> KrigeResult<()> {
        if spacing.is_finite() && spacing > 0.0 {
            Ok(())
        } else {
            Err(KrigeError::GridConfig(format!(
                "spacing {} for axis {} must be positive",
                spacing, AXIS_NAMES[axis]
            )))
        }
    }

    /// Nodes from `lo` stepped by `spacing`; the last node is never below `hi`.
    fn axis(lo: f64, hi: f64, spacing: f64, axis: usize) -> KrigeResult<Vec<f64>> {
        let steps = ((hi - lo) / spacing - 1e-9).ceil().max(1.0);
        if steps + 1.0 > MAX_AXIS_NODES as f64 {
            return Err(KrigeError::GridConfig(format!(
                "axis {} would need {} nodes (limit {})",
                AXIS_NAMES[axis],
                steps + 1.0,
                MAX_AXIS_NODES
            )));
        }
        let steps = steps as usize;
        let mut values: Vec<f64> = (0..steps).map(|i| lo + i as f64 * spacing).collect();
        values.push((lo + steps as f64 * spacing).max(hi));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extrema() -> Bounds3 {
        Bounds3 {
            min: [-104.82, 40.58, 5100.0],
            max: [-104.81, 40.59, 5110.0],
        }
    }

    #[test]
    fn auto_grid_covers_extent_plus_margin() {
        let cells = [5, 4, 10];
        let grid = GridBuilder::auto(&extrema(), cells, DEFAULT_MARGIN_CELLS).unwrap();
        let bounds = extrema();
        for axis in 0..3 {
            let spacing = (bounds.max[axis] - bounds.min[axis]) / cells[axis] as f64;
            let values = grid.axis(axis);
            assert!(values[0] <= bounds.min[axis] - 2.0 * spacing);
            assert!(*values.last().unwrap() >= bounds.max[axis] + 2.0 * spacing);
            assert_eq!(values.len(), cells[axis] + 5);
        }
    }

    #[test]
    fn auto_grid_without_margin_starts_at_data_min() {
        let grid = GridBuilder::auto(&extrema(), [2, 2, 2], 0).unwrap();
        assert_eq!(grid.z(), &[5100.0, 5105.0, 5110.0]);
    }

    #[test]
    fn bounded_grid_steps_from_min_to_max() {
        let bounds = Bounds3 {
            min: [0.0, 0.0, 5052.0],
            max: [1.0, 2.0, 5141.0],
        };
        let grid = GridBuilder::bounded(&bounds, [0.25, 1.0, 10.0]).unwrap();
        assert_eq!(grid.x(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(grid.y(), &[0.0, 1.0, 2.0]);
        assert_eq!(grid.z().first(), Some(&5052.0));
        assert!(*grid.z().last().unwrap() >= 5141.0);
        assert_eq!(grid.shape(), [5, 3, 10]);
    }

    #[test]
    fn invalid_spacing_or_bounds_is_rejected() {
        let bounds = Bounds3 {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        assert!(matches!(
            GridBuilder::bounded(&bounds, [0.0, 0.1, 0.1]),
            Err(KrigeError::GridConfig(_))
        ));
        assert!(matches!(
            GridBuilder::bounded(&bounds, [0.1, -0.1, 0.1]),
            Err(KrigeError::GridConfig(_))
        ));
        let inverted = Bounds3 {
            min: [1.0, 0.0, 0.0],
            max: [0.0, 1.0, 1.0],
        };
        assert!(matches!(
            GridBuilder::bounded(&inverted, [0.1, 0.1, 0.1]),
            Err(KrigeError::GridConfig(_))
        ));
    }

    #[test]
    fn flat_axis_cannot_be_auto_gridded() {
        let flat = Bounds3 {
            min: [0.0, 0.0, 5100.0],
            max: [1.0, 1.0, 5100.0],
        };
        assert!(matches!(
            GridBuilder::auto(&flat, [5, 5, 5], 2),
            Err(KrigeError::GridConfig(_))
        ));
        assert!(GridBuilder::auto(&extrema(), [5, 0, 5], 2).is_err());
    }

    #[test]
    fn oversized_axis_is_rejected() {
        let bounds = Bounds3 {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        };
        assert!(GridBuilder::bounded(&bounds, [1e-6, 0.5, 0.5]).is_err());
    }

    #[test]
    fn build_dispatches_on_mode() {
        let config = GridConfig::default();
        assert!(GridBuilder::build(&config, None).is_err());
        let grid = GridBuilder::build(&config, Some(&extrema())).unwrap();
        assert_eq!(grid.shape(), [10, 10, 10]);
        assert_eq!(grid.len(), 1000);
    }

    #[test]
    fn nearest_index_finds_closest_node() {
        let grid = SpatialGrid::from_axes(vec![0.0, 1.0, 2.0], vec![0.0, 10.0], vec![5.0]).unwrap();
        assert_eq!(grid.nearest_index([1.4, 8.0, 100.0]), [1, 1, 0]);
    }
}
