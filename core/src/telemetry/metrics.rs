use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Frame that was excluded from the output, with the reason it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFrame {
    pub index: usize,
    pub timestamp: String,
    pub reason: String,
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub processed: usize,
    pub imputed_observations: usize,
    pub jitter_retries: usize,
    pub nugget_fallbacks: usize,
    pub node_solves: usize,
    pub skipped: Vec<SkippedFrame>,
}

/// Run counters shared by the per-Frame workers.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_processed(&self, imputed: usize, jittered: bool, nugget_fallback: bool, nodes: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
            metrics.imputed_observations += imputed;
            metrics.jitter_retries += usize::from(jittered);
            metrics.nugget_fallbacks += usize::from(nugget_fallback);
            metrics.node_solves += nodes;
        }
    }

    pub fn record_skipped(&self, index: usize, timestamp: &str, reason: &str) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped.push(SkippedFrame {
                index,
                timestamp: timestamp.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    /// Skipped frames come back sorted by frame index regardless of completion order.
    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            let mut snapshot = metrics.clone();
            snapshot.skipped.sort_by_key(|s| s.index);
            snapshot
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
