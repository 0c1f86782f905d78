use crate::dataset::{Frame, Observation};
use crate::math::stats::StatsHelper;
use crate::prelude::{KrigeError, KrigeResult};

/// Repairs missing readings within one Frame using column medians.
///
/// Where a pod's value is NaN, its value *and* all three coordinates are
/// replaced by the medians of the non-NaN entries of each column, so the pod
/// is relocated to the median position. Where only a coordinate is NaN, just
/// that coordinate is replaced.
pub struct GapImputer;

impl GapImputer {
    pub fn impute(frame: &Frame) -> KrigeResult<Frame> {
        let mut repaired = frame.clone();
        Self::impute_in_place(&mut repaired)?;
        Ok(repaired)
    }

    /// Returns the number of observations that were modified.
    pub fn impute_in_place(frame: &mut Frame) -> KrigeResult<usize> {
        if frame.is_empty() {
            return Err(KrigeError::InsufficientData(format!(
                "frame at {} has no observations",
                frame.timestamp.label
            )));
        }
        if frame.gap_count() == 0 {
            return Ok(0);
        }

        let column = |select: fn(&Observation) -> f64| -> Vec<f64> {
            frame.observations.iter().map(select).collect()
        };
        let value_median = StatsHelper::nan_median(&column(|o| o.value)).ok_or_else(|| {
            KrigeError::InsufficientData(format!(
                "all {} values are NaN at {}",
                frame.len(),
                frame.timestamp.label
            ))
        })?;
        let coord_medians = [
            StatsHelper::nan_median(&column(|o| o.x)),
            StatsHelper::nan_median(&column(|o| o.y)),
            StatsHelper::nan_median(&column(|o| o.z)),
        ];
        let label = frame.timestamp.label.clone();
        let coord = |axis: usize| {
            coord_medians[axis].ok_or_else(|| {
                KrigeError::InsufficientData(format!(
                    "no pod reported coordinate axis {axis} at {label}"
                ))
            })
        };

        let mut replaced = 0;
        for obs in frame.observations.iter_mut() {
            if !obs.has_gap() {
                continue;
            }
            if obs.value.is_nan() {
                *obs = Observation::new(coord(0)?, coord(1)?, coord(2)?, value_median);
            } else {
                if obs.x.is_nan() {
                    obs.x = coord(0)?;
                }
                if obs.y.is_nan() {
                    obs.y = coord(1)?;
                }
                if obs.z.is_nan() {
                    obs.z = coord(2)?;
                }
            }
            replaced += 1;
        }
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Timestamp;

    fn frame(observations: Vec<Observation>) -> Frame {
        Frame::new(0, Timestamp::from_seconds(0.0), observations)
    }

    fn three_pods() -> Frame {
        frame(vec![
            Observation::new(-104.82, 40.58, 5100.0, 10.0),
            Observation::new(-104.82, 40.59, 5110.0, 20.0),
            Observation::new(-104.815, 40.585, 5105.0, f64::NAN),
        ])
    }

    #[test]
    fn nan_value_takes_column_medians() {
        let repaired = GapImputer::impute(&three_pods()).unwrap();
        let c = repaired.observations[2];
        assert_eq!(c.value, 15.0);
        assert_eq!(c.x, -104.82);
        assert_eq!(c.y, 40.585);
        assert_eq!(c.z, 5105.0);
        assert_eq!(repaired.observations[0], three_pods().observations[0]);
    }

    #[test]
    fn imputation_is_idempotent() {
        let once = GapImputer::impute(&three_pods()).unwrap();
        let twice = GapImputer::impute(&once).unwrap();
        assert_eq!(once, twice);

        let clean = once.clone();
        let mut again = clean.clone();
        assert_eq!(GapImputer::impute_in_place(&mut again).unwrap(), 0);
        assert_eq!(again, clean);
    }

    #[test]
    fn imputation_leaves_no_nan_and_keeps_size() {
        for missing in 0..4 {
            let observations = (0..5)
                .map(|i| {
                    if i < missing {
                        Observation::missing()
                    } else {
                        Observation::new(i as f64, 2.0 * i as f64, 5100.0 + i as f64, i as f64)
                    }
                })
                .collect();
            let mut f = frame(observations);
            let replaced = GapImputer::impute_in_place(&mut f).unwrap();
            assert_eq!(replaced, missing);
            assert_eq!(f.len(), 5);
            assert_eq!(f.gap_count(), 0);
        }
    }

    #[test]
    fn missing_coordinate_only_replaces_that_coordinate() {
        let mut f = frame(vec![
            Observation::new(1.0, 1.0, 10.0, 5.0),
            Observation::new(3.0, 5.0, 30.0, 7.0),
            Observation::new(2.0, f64::NAN, 20.0, 6.0),
        ]);
        GapImputer::impute_in_place(&mut f).unwrap();
        assert_eq!(f.observations[2], Observation::new(2.0, 3.0, 20.0, 6.0));
    }

    #[test]
    fn all_nan_frame_is_insufficient() {
        let f = frame(vec![Observation::missing(), Observation::missing()]);
        assert!(matches!(
            GapImputer::impute(&f),
            Err(KrigeError::InsufficientData(_))
        ));
        assert!(GapImputer::impute(&frame(Vec::new())).is_err());
    }
}
