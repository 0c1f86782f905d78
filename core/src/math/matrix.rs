use ndarray::Array2;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Euclidean distance between two points in 3D.
    #[inline]
    pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }

    /// Symmetric matrix of pairwise Euclidean distances.
    pub fn pairwise_distances(points: &[[f64; 3]]) -> Array2<f64> {
        let n = points.len();
        let mut distances = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d = Self::distance(points[i], points[j]);
                distances[[i, j]] = d;
                distances[[j, i]] = d;
            }
        }
        distances
    }

    /// Largest per-axis extent of a point set.
    pub fn coordinate_span(points: &[[f64; 3]]) -> f64 {
        (0..3)
            .map(|axis| {
                let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, p| {
                    (acc.0.min(p[axis]), acc.1.max(p[axis]))
                });
                if hi >= lo {
                    hi - lo
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max)
    }
}
