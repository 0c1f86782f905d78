use crate::dataset::observation::{Observation, Timestamp};
use crate::processing::grid::Bounds3;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a pod file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub time: Timestamp,
    pub estimate: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl PodRecord {
    pub fn observation(&self) -> Observation {
        Observation::new(self.longitude, self.latitude, self.elevation, self.estimate)
    }
}

/// Time-indexed readings of a single pod.
#[derive(Debug, Clone, Default)]
pub struct PodDataset {
    pub name: String,
    records: BTreeMap<Timestamp, PodRecord>,
}

impl PodDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: BTreeMap::new(),
        }
    }

    /// Inserts a record; a later record for the same instant replaces the earlier one.
    pub fn push(&mut self, record: PodRecord) {
        if let Some(previous) = self.records.insert(record.time.clone(), record) {
            warn!(
                "pod {} reported time {} more than once; keeping the last record",
                self.name, previous.time.label
            );
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, time: &Timestamp) -> Option<&PodRecord> {
        self.records.get(time)
    }

    pub fn records(&self) -> impl Iterator<Item = &PodRecord> {
        self.records.values()
    }
}

/// Every pod of a run keyed by pod name.
#[derive(Debug, Clone, Default)]
pub struct SpatialDataset {
    pods: BTreeMap<String, PodDataset>,
}

impl SpatialDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pod: PodDataset) {
        self.pods.insert(pod.name.clone(), pod);
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    pub fn pod_names(&self) -> Vec<&str> {
        self.pods.keys().map(String::as_str).collect()
    }

    pub fn pods(&self) -> impl Iterator<Item = &PodDataset> {
        self.pods.values()
    }

    /// Per-axis min/max over every non-NaN coordinate of every pod.
    pub fn extrema(&self) -> Option<Bounds3> {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for record in self.pods.values().flat_map(PodDataset::records) {
            for (axis, value) in record.observation().coords().into_iter().enumerate() {
                if value.is_nan() {
                    continue;
                }
                min[axis] = min[axis].min(value);
                max[axis] = max[axis].max(value);
            }
        }
        if min.iter().zip(&max).all(|(lo, hi)| lo <= hi) {
            Some(Bounds3 { min, max })
        } else {
            None
        }
    }
}
