use crate::dataset::observation::{Frame, Observation, Timestamp};
use crate::dataset::pod::{PodDataset, SpatialDataset};
use std::collections::BTreeSet;

impl SpatialDataset {
    /// Joins every pod on the union of their timestamps.
    ///
    /// Frames come out in chronological order with one observation per pod in
    /// pod-name order; a pod without a reading at a timestamp contributes
    /// [`Observation::missing`].
    pub fn frames(&self) -> Vec<Frame> {
        let times: BTreeSet<&Timestamp> = self
            .pods()
            .flat_map(|pod| pod.records().map(|record| &record.time))
            .collect();

        times
            .into_iter()
            .enumerate()
            .map(|(index, time)| {
                let observations = self
                    .pods()
                    .map(|pod: &PodDataset| {
                        pod.get(time)
                            .map(|record| record.observation())
                            .unwrap_or_else(Observation::missing)
                    })
                    .collect();
                Frame::new(index, time.clone(), observations)
            })
            .collect()
    }
}
