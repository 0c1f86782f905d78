//! Ordinary-kriging linear system.
//!
//! For `n` observations the bordered system
//!
//! ```text
//! | γ(d11) … γ(d1n) 1 | | w1 |   | γ(d10) |
//! |   ⋮         ⋮    ⋮ | | ⋮  | = |   ⋮    |
//! | γ(dn1) … γ(dnn) 1 | | wn |   | γ(dn0) |
//! |   1    …   1    0 | | λ  |   |   1    |
//! ```
//!
//! depends only on the observation set, so it is LU-factorized once and the
//! factorization is shared by every grid node. The semivariance block is
//! divided by its largest entry before factorization; weights are unaffected
//! and the variance is rescaled on the way out.

use crate::math::matrix::MatrixHelper;
use crate::prelude::{KrigeError, KrigeResult};
use crate::processing::variogram::{VariogramModel, ZERO_LAG};
use log::warn;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use rayon::prelude::*;

/// Smallest accepted ratio between the smallest and largest LU pivot.
pub const PIVOT_RATIO_TOLERANCE: f64 = 1e-12;

/// Jitter step for coincident observations, as a fraction of the coordinate span.
pub const JITTER_FRACTION: f64 = 1e-6;

/// Prediction and kriging variance at one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeEstimate {
    pub value: f64,
    pub variance: f64,
}

pub struct KrigingSystem {
    points: Vec<[f64; 3]>,
    values: Vec<f64>,
    /// Semivariogram actually used; differs from the fitted one for flat fields.
    model: VariogramModel,
    scale: f64,
    variance_scale: f64,
    lu: LU<f64, Dyn, Dyn>,
    jittered: bool,
}

impl KrigingSystem {
    /// Builds and factorizes the system, jittering coincident observations
    /// and retrying once if the first factorization is singular.
    pub fn new(points: &[[f64; 3]], values: &[f64], model: VariogramModel) -> KrigeResult<Self> {
        if points.is_empty() || points.len() != values.len() {
            return Err(KrigeError::InsufficientData(format!(
                "{} points with {} values cannot form a kriging system",
                points.len(),
                values.len()
            )));
        }
        if points.iter().flatten().chain(values).any(|v| !v.is_finite()) {
            return Err(KrigeError::Numerical(
                "observations contain non-finite coordinates or values".into(),
            ));
        }

        match Self::factorize(points.to_vec(), values.to_vec(), model) {
            Ok(system) => Ok(system),
            Err(first) => {
                let (jittered, moved) = Self::jitter_duplicates(points);
                if moved == 0 {
                    return Err(first);
                }
                warn!("{first}; jittered {moved} coincident observation(s) and retrying");
                let mut system = Self::factorize(jittered, values.to_vec(), model)?;
                system.jittered = true;
                Ok(system)
            }
        }
    }

    fn factorize(points: Vec<[f64; 3]>, values: Vec<f64>, model: VariogramModel) -> KrigeResult<Self> {
        let n = points.len();
        let distances = MatrixHelper::pairwise_distances(&points);
        let semivariance = distances.mapv(|d| model.gamma(d));
        let largest = semivariance.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

        // No spatial variability: any unbiased weights give the same
        // prediction, so borrow a unit pure-nugget shape and report zero variance.
        let (model, scale, variance_scale) = if largest > 0.0 && largest.is_finite() {
            (model, largest, largest)
        } else {
            (VariogramModel::PureNugget { nugget: 1.0 }, 1.0, 0.0)
        };

        let mut matrix = DMatrix::<f64>::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..n {
                matrix[(i, j)] = model.gamma(distances[[i, j]]) / scale;
            }
            matrix[(i, n)] = 1.0;
            matrix[(n, i)] = 1.0;
        }

        let lu = matrix.lu();
        let pivots = lu.u().diagonal();
        let largest_pivot = pivots.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let smallest_pivot = pivots.iter().fold(f64::INFINITY, |m, v| m.min(v.abs()));
        if !(smallest_pivot > largest_pivot * PIVOT_RATIO_TOLERANCE) {
            return Err(KrigeError::Numerical(format!(
                "kriging matrix is singular (pivot ratio {:.3e}) for {} observations",
                smallest_pivot / largest_pivot,
                n
            )));
        }

        Ok(Self {
            points,
            values,
            model,
            scale,
            variance_scale,
            lu,
            jittered: false,
        })
    }

    /// Displaces the k-th repeat of a location along x by `k · JITTER_FRACTION · span`.
    ///
    /// Returns the adjusted points and how many were moved.
    pub fn jitter_duplicates(points: &[[f64; 3]]) -> (Vec<[f64; 3]>, usize) {
        let span = MatrixHelper::coordinate_span(points);
        let span = if span > 0.0 { span } else { 1.0 };
        let tolerance = ZERO_LAG.max(1e-9 * span);

        let mut jittered = points.to_vec();
        let mut moved = 0;
        for i in 1..points.len() {
            let repeats = (0..i)
                .filter(|&j| MatrixHelper::distance(points[i], points[j]) < tolerance)
                .count();
            if repeats > 0 {
                jittered[i][0] += repeats as f64 * JITTER_FRACTION * span;
                moved += 1;
            }
        }
        (jittered, moved)
    }

    pub fn was_jittered(&self) -> bool {
        self.jittered
    }

    fn rhs(&self, node: [f64; 3]) -> DVector<f64> {
        let n = self.points.len();
        let mut rhs = DVector::<f64>::zeros(n + 1);
        for (i, point) in self.points.iter().enumerate() {
            rhs[i] = self.model.gamma(MatrixHelper::distance(*point, node)) / self.scale;
        }
        rhs[n] = 1.0;
        rhs
    }

    /// Kriging weights for `node`; the last entry is the scaled Lagrange multiplier.
    pub fn weights(&self, node: [f64; 3]) -> KrigeResult<DVector<f64>> {
        self.lu.solve(&self.rhs(node)).ok_or_else(|| {
            KrigeError::Numerical(format!("kriging solve failed at node {node:?}"))
        })
    }

    pub fn solve(&self, node: [f64; 3]) -> KrigeResult<NodeEstimate> {
        let rhs = self.rhs(node);
        let weights = self.lu.solve(&rhs).ok_or_else(|| {
            KrigeError::Numerical(format!("kriging solve failed at node {node:?}"))
        })?;
        let n = self.points.len();

        let value = (0..n).map(|i| weights[i] * self.values[i]).sum::<f64>();
        let variance = self.variance_scale * ((0..n).map(|i| weights[i] * rhs[i]).sum::<f64>() + weights[n]);
        if !value.is_finite() || !variance.is_finite() {
            return Err(KrigeError::Numerical(format!(
                "non-finite kriging estimate at node {node:?}"
            )));
        }

        Ok(NodeEstimate {
            value,
            variance: variance.max(0.0),
        })
    }

    /// Solves every node in parallel against the shared factorization.
    pub fn solve_many(&self, nodes: &[[f64; 3]]) -> KrigeResult<Vec<NodeEstimate>> {
        nodes.par_iter().map(|&node| self.solve(node)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered() -> (Vec<[f64; 3]>, Vec<f64>) {
        let points = vec![
            [0.0, 0.0, 0.0],
            [4.0, 1.0, 0.5],
            [1.0, 5.0, 1.0],
            [3.5, 3.0, 2.0],
            [2.0, 2.0, 4.0],
        ];
        let values = vec![1.0, 4.0, 2.5, 3.0, 7.0];
        (points, values)
    }

    fn models() -> Vec<VariogramModel> {
        vec![
            VariogramModel::Linear { nugget: 0.0, slope: 1.3 },
            VariogramModel::Linear { nugget: 0.4, slope: 0.9 },
            VariogramModel::Spherical { nugget: 0.0, sill: 2.0, range: 6.0 },
            VariogramModel::Exponential { nugget: 0.1, sill: 2.0, range: 4.0 },
            VariogramModel::Gaussian { nugget: 0.05, sill: 2.0, range: 5.0 },
            VariogramModel::PureNugget { nugget: 2.0 },
        ]
    }

    #[test]
    fn weights_sum_to_one() {
        let (points, values) = scattered();
        let nodes = [[0.5, 0.5, 0.5], [10.0, -3.0, 2.0], [2.0, 2.0, 2.0], [4.0, 1.0, 0.5]];
        for model in models() {
            let system = KrigingSystem::new(&points, &values, model).unwrap();
            for node in nodes {
                let weights = system.weights(node).unwrap();
                let total: f64 = weights.iter().take(points.len()).sum();
                assert!((total - 1.0).abs() < 1e-9, "{model:?} at {node:?}: {total}");
            }
        }
    }

    #[test]
    fn exact_interpolation_at_observations() {
        let (points, values) = scattered();
        for model in models() {
            let system = KrigingSystem::new(&points, &values, model).unwrap();
            for (point, value) in points.iter().zip(&values) {
                let estimate = system.solve(*point).unwrap();
                assert!((estimate.value - value).abs() < 1e-9, "{model:?}");
                assert!(estimate.variance.abs() < 1e-9, "{model:?}");
            }
        }
    }

    #[test]
    fn variance_grows_away_from_data() {
        let (points, values) = scattered();
        let model = VariogramModel::Linear { nugget: 0.0, slope: 1.0 };
        let system = KrigingSystem::new(&points, &values, model).unwrap();
        let near = system.solve([0.1, 0.1, 0.0]).unwrap();
        let far = system.solve([20.0, 20.0, 20.0]).unwrap();
        assert!(near.variance < far.variance);
    }

    #[test]
    fn flat_field_predicts_constant_with_zero_variance() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let values = vec![5.0, 5.0, 5.0];
        let model = VariogramModel::Linear { nugget: 0.0, slope: 0.0 };
        let system = KrigingSystem::new(&points, &values, model).unwrap();
        let estimate = system.solve([0.3, 0.3, 3.0]).unwrap();
        assert!((estimate.value - 5.0).abs() < 1e-12);
        assert_eq!(estimate.variance, 0.0);
    }

    #[test]
    fn coincident_observations_are_jittered_once() {
        let points = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [2.0, 0.0, 1.0]];
        let values = vec![1.0, 3.0, 3.0, 2.0];
        let model = VariogramModel::Linear { nugget: 0.0, slope: 1.0 };
        let system = KrigingSystem::new(&points, &values, model).unwrap();
        assert!(system.was_jittered());

        let estimate = system.solve([1.0, 0.5, 0.5]).unwrap();
        assert!(estimate.value > 1.0 && estimate.value < 3.0);
        let total: f64 = system.weights([1.0, 0.5, 0.5]).unwrap().iter().take(4).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jitter_moves_only_repeats() {
        let points = [[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let (jittered, moved) = KrigingSystem::jitter_duplicates(&points);
        assert_eq!(moved, 2);
        assert_eq!(jittered[0], [0.0, 0.0, 0.0]);
        assert!((jittered[1][0] - JITTER_FRACTION).abs() < 1e-18);
        assert!((jittered[2][0] - 2.0 * JITTER_FRACTION).abs() < 1e-18);
        assert_eq!(jittered[3], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn single_observation_is_reproduced_everywhere() {
        let system = KrigingSystem::new(
            &[[1.0, 2.0, 3.0]],
            &[42.0],
            VariogramModel::PureNugget { nugget: 0.0 },
        )
        .unwrap();
        let estimate = system.solve([9.0, 9.0, 9.0]).unwrap();
        assert!((estimate.value - 42.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_observation_is_numerical_error() {
        let result = KrigingSystem::new(
            &[[0.0, 0.0, 0.0], [f64::NAN, 1.0, 1.0]],
            &[1.0, 2.0],
            VariogramModel::Linear { nugget: 0.0, slope: 1.0 },
        );
        assert!(matches!(result, Err(KrigeError::Numerical(_))));
        assert!(KrigingSystem::new(&[], &[], VariogramModel::PureNugget { nugget: 1.0 }).is_err());
    }

    #[test]
    fn parallel_solves_match_serial() {
        let (points, values) = scattered();
        let model = VariogramModel::Exponential { nugget: 0.0, sill: 3.0, range: 5.0 };
        let system = KrigingSystem::new(&points, &values, model).unwrap();
        let nodes: Vec<[f64; 3]> = (0..50).map(|i| [i as f64 * 0.1, 1.0, 0.5]).collect();
        let parallel = system.solve_many(&nodes).unwrap();
        for (node, estimate) in nodes.iter().zip(parallel) {
            assert_eq!(estimate, system.solve(*node).unwrap());
        }
    }
}
