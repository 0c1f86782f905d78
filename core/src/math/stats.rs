pub struct StatsHelper;

impl StatsHelper {
    /// Median of the non-NaN entries, or `None` when every entry is NaN.
    pub fn nan_median(samples: &[f64]) -> Option<f64> {
        let mut finite: Vec<f64> = samples.iter().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return None;
        }
        finite.sort_by(f64::total_cmp);
        let mid = finite.len() / 2;
        if finite.len() % 2 == 0 {
            Some((finite[mid - 1] + finite[mid]) / 2.0)
        } else {
            Some(finite[mid])
        }
    }

    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn population_variance(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(samples);
        samples.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64
    }
}
