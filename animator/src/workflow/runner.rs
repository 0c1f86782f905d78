use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use krigcore::dataset::SpatialDataset;
use krigcore::processing::{GridBuilder, SpatialGrid, VolumeEstimate, VolumeEstimator};
use krigcore::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use krigcore::KrigeError;
use rayon::prelude::*;

pub struct WorkflowResult {
    pub grid: SpatialGrid,
    pub frame_count: usize,
    /// Successful estimates in timestamp order.
    pub volumes: Vec<VolumeEstimate>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Builds the shared grid, then kriges every timestamp in parallel.
    ///
    /// Frame-scoped failures are logged and left out of the result; any
    /// other error aborts the run.
    pub fn execute(&self, dataset: &SpatialDataset) -> anyhow::Result<WorkflowResult> {
        let logger = LogManager::new("runner");
        let extrema = dataset.extrema();
        let grid = GridBuilder::build(&self.config.grid, extrema.as_ref())
            .context("building evaluation grid")?;
        let estimator = VolumeEstimator::from_settings(&self.config.variogram)
            .context("checking variogram settings")?;
        let frames = dataset.frames();
        if frames.is_empty() {
            anyhow::bail!("dataset of {} pods has no timestamps", dataset.pod_count());
        }
        logger.record(&format!(
            "{} pods, {} frames, grid {:?} ({} nodes), {} variogram",
            dataset.pod_count(),
            frames.len(),
            grid.shape(),
            grid.len(),
            self.config.variogram.model
        ));

        let metrics = MetricsRecorder::new();

        // `collect` keeps frame order no matter which worker finishes first.
        let outcomes = frames
            .par_iter()
            .map(|frame| match estimator.run(frame, &grid) {
                Ok(volume) => {
                    metrics.record_processed(
                        volume.imputed,
                        volume.jittered,
                        volume.is_nugget_fallback(),
                        grid.len(),
                    );
                    Ok(Some(volume))
                }
                Err(err) if err.is_frame_scoped() => {
                    logger.warn(&format!(
                        "skipping frame {} at {}: {}",
                        frame.index, frame.timestamp.label, err
                    ));
                    metrics.record_skipped(frame.index, &frame.timestamp.label, &err.to_string());
                    Ok(None)
                }
                Err(err) => Err(err),
            })
            .collect::<Result<Vec<Option<VolumeEstimate>>, KrigeError>>()
            .context("kriging frames")?;

        let volumes: Vec<VolumeEstimate> = outcomes.into_iter().flatten().collect();
        let metrics = metrics.snapshot();
        logger.record(&format!(
            "kriged {} of {} frames ({} skipped)",
            volumes.len(),
            frames.len(),
            metrics.skipped.len()
        ));

        Ok(WorkflowResult {
            grid,
            frame_count: frames.len(),
            volumes,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_dataset, GeneratorConfig};
    use krigcore::dataset::{PodDataset, PodRecord, Timestamp};
    use krigcore::processing::{Bounds3, GridConfig, ModelKind, VariogramModel};

    #[test]
    fn runner_executes_workflow() {
        let cfg = WorkflowConfig::from_args(None, [3, 3, 2], ModelKind::Linear);
        let dataset = build_dataset(&GeneratorConfig {
            pods: 6,
            timestamps: 5,
            ..Default::default()
        })
        .unwrap();
        let result = Runner::new(cfg).execute(&dataset).unwrap();
        assert_eq!(result.frame_count, 5);
        assert_eq!(result.volumes.len() + result.metrics.skipped.len(), 5);
        assert_eq!(result.metrics.processed, result.volumes.len());
        for volume in &result.volumes {
            assert_eq!(volume.shape(), result.grid.shape());
        }
        assert!(result
            .volumes
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn all_nan_frame_is_skipped_and_reported() {
        let mut dataset = SpatialDataset::new();
        for (name, lat, value) in [("A", 40.58, 10.0), ("B", 40.59, 20.0), ("C", 40.585, 30.0)] {
            let mut pod = PodDataset::new(name);
            for t in 0..3 {
                pod.push(PodRecord {
                    time: Timestamp::from_seconds(t as f64),
                    estimate: if t == 1 { f64::NAN } else { value + t as f64 },
                    latitude: lat,
                    longitude: -104.82 + lat / 1000.0,
                    elevation: 5100.0 + (lat - 40.58) * 1000.0,
                });
            }
            dataset.insert(pod);
        }

        let cfg = WorkflowConfig::from_args(None, [2, 2, 2], ModelKind::Linear);
        let result = Runner::new(cfg).execute(&dataset).unwrap();
        assert_eq!(result.frame_count, 3);
        assert_eq!(result.volumes.len(), 2);
        assert_eq!(result.volumes[0].frame_index, 0);
        assert_eq!(result.volumes[1].frame_index, 2);
        assert_eq!(result.metrics.skipped.len(), 1);
        assert_eq!(result.metrics.skipped[0].index, 1);
        assert_eq!(result.metrics.skipped[0].timestamp, "1");
    }

    #[test]
    fn invalid_grid_aborts_before_processing() {
        let dataset = build_dataset(&GeneratorConfig::default()).unwrap();
        let mut cfg = WorkflowConfig::from_args(None, [3, 3, 3], ModelKind::Linear);
        cfg.grid = GridConfig::Bounded {
            bounds: Bounds3 {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
            spacing: [0.5, 0.0, 0.5],
        };
        let err = Runner::new(cfg).execute(&dataset).err().unwrap();
        assert!(format!("{err:#}").contains("invalid grid configuration"));
    }

    #[test]
    fn invalid_fixed_variogram_aborts_before_processing() {
        let dataset = build_dataset(&GeneratorConfig::default()).unwrap();
        let mut cfg = WorkflowConfig::from_args(None, [3, 3, 3], ModelKind::Linear);
        cfg.variogram.fixed = Some(VariogramModel::Linear {
            nugget: -1.0,
            slope: 1.0,
        });
        let err = Runner::new(cfg).execute(&dataset).err().unwrap();
        assert!(format!("{err:#}").contains("invalid variogram configuration"));
    }
}
