use crate::workflow::runner::WorkflowResult;
use anyhow::Context;
use krigcore::telemetry::MetricsSnapshot;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Machine-readable summary of one animation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub frames_total: usize,
    pub frames_rendered: usize,
    pub grid_shape: [usize; 3],
    /// Variogram model name per rendered frame, in timestamp order.
    pub models: Vec<String>,
    pub output: PathBuf,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn from_result(result: &WorkflowResult, frames_rendered: usize, output: &Path) -> Self {
        Self {
            frames_total: result.frame_count,
            frames_rendered,
            grid_shape: result.grid.shape(),
            models: result
                .volumes
                .iter()
                .map(|v| v.model.name().to_string())
                .collect(),
            output: output.to_path_buf(),
            metrics: result.metrics.clone(),
        }
    }

    /// One headline, then one line per skipped frame.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "rendered {}/{} frames on a {}x{}x{} grid -> {}",
            self.frames_rendered,
            self.frames_total,
            self.grid_shape[0],
            self.grid_shape[1],
            self.grid_shape[2],
            self.output.display()
        );
        if !self.metrics.skipped.is_empty() {
            text.push_str(&format!(" ({} skipped)", self.metrics.skipped.len()));
        }
        if self.metrics.imputed_observations > 0 {
            text.push_str(&format!(
                ", {} observations imputed",
                self.metrics.imputed_observations
            ));
        }
        for skipped in &self.metrics.skipped {
            text.push_str(&format!(
                "\n  skipped frame {} at {}: {}",
                skipped.index, skipped.timestamp, skipped.reason
            ));
        }
        text
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("creating report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("writing report {}", path.display()))?;
        Ok(())
    }
}
