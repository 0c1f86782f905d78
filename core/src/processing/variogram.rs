use crate::math::matrix::MatrixHelper;
use crate::math::stats::StatsHelper;
use crate::prelude::{KrigeError, KrigeResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of equal-width lag bins used for the empirical semivariogram.
pub const DEFAULT_NLAGS: usize = 6;

/// Separations below this are treated as the same location.
pub const ZERO_LAG: f64 = 1e-10;

const RANGE_CANDIDATES: usize = 48;
const GOLDEN_ITERATIONS: usize = 40;

/// Parametric family fitted to the empirical semivariogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Linear,
    Spherical,
    Exponential,
    Gaussian,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Spherical => "spherical",
            Self::Exponential => "exponential",
            Self::Gaussian => "gaussian",
        }
    }

    /// Normalised shape in `[0, 1]` for bounded models at `h / range`.
    fn shape(&self, ratio: f64) -> f64 {
        match self {
            Self::Linear => ratio,
            Self::Spherical => {
                if ratio >= 1.0 {
                    1.0
                } else {
                    1.5 * ratio - 0.5 * ratio.powi(3)
                }
            }
            Self::Exponential => 1.0 - (-3.0 * ratio).exp(),
            Self::Gaussian => 1.0 - (-3.0 * ratio * ratio).exp(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "spherical" => Ok(Self::Spherical),
            "exponential" => Ok(Self::Exponential),
            "gaussian" => Ok(Self::Gaussian),
            other => Err(format!(
                "unknown variogram model `{other}` (expected linear, spherical, exponential or gaussian)"
            )),
        }
    }
}

/// Fitted semivariogram γ(h).
///
/// `sill` is the total plateau including the nugget. γ(0) is 0 for every
/// variant so kriging honours the observations exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariogramModel {
    Linear { nugget: f64, slope: f64 },
    Spherical { nugget: f64, sill: f64, range: f64 },
    Exponential { nugget: f64, sill: f64, range: f64 },
    Gaussian { nugget: f64, sill: f64, range: f64 },
    /// Spatially uncorrelated noise; the fallback when a fit is under-determined.
    PureNugget { nugget: f64 },
}

impl VariogramModel {
    /// Bounded variant for `kind`; `None` for the unbounded linear model.
    pub fn bounded(kind: ModelKind, nugget: f64, sill: f64, range: f64) -> Option<Self> {
        match kind {
            ModelKind::Spherical => Some(Self::Spherical { nugget, sill, range }),
            ModelKind::Exponential => Some(Self::Exponential { nugget, sill, range }),
            ModelKind::Gaussian => Some(Self::Gaussian { nugget, sill, range }),
            ModelKind::Linear => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "linear",
            Self::Spherical { .. } => "spherical",
            Self::Exponential { .. } => "exponential",
            Self::Gaussian { .. } => "gaussian",
            Self::PureNugget { .. } => "nugget",
        }
    }

    pub fn nugget(&self) -> f64 {
        match *self {
            Self::Linear { nugget, .. }
            | Self::Spherical { nugget, .. }
            | Self::Exponential { nugget, .. }
            | Self::Gaussian { nugget, .. }
            | Self::PureNugget { nugget } => nugget,
        }
    }

    pub fn gamma(&self, h: f64) -> f64 {
        if h < ZERO_LAG {
            return 0.0;
        }
        match *self {
            Self::Linear { nugget, slope } => nugget + slope * h,
            Self::Spherical { nugget, sill, range } => {
                nugget + (sill - nugget) * ModelKind::Spherical.shape(h / range)
            }
            Self::Exponential { nugget, sill, range } => {
                nugget + (sill - nugget) * ModelKind::Exponential.shape(h / range)
            }
            Self::Gaussian { nugget, sill, range } => {
                nugget + (sill - nugget) * ModelKind::Gaussian.shape(h / range)
            }
            Self::PureNugget { nugget } => nugget,
        }
    }

    /// Rejects negative nuggets and slopes, sills below the nugget and non-positive ranges.
    pub fn validate(&self) -> KrigeResult<()> {
        let finite = match *self {
            Self::Linear { nugget, slope } => nugget.is_finite() && slope.is_finite(),
            Self::Spherical { nugget, sill, range }
            | Self::Exponential { nugget, sill, range }
            | Self::Gaussian { nugget, sill, range } => {
                nugget.is_finite() && sill.is_finite() && range.is_finite()
            }
            Self::PureNugget { nugget } => nugget.is_finite(),
        };
        let ok = finite && match *self {
            Self::Linear { nugget, slope } => nugget >= 0.0 && slope >= 0.0,
            Self::Spherical { nugget, sill, range }
            | Self::Exponential { nugget, sill, range }
            | Self::Gaussian { nugget, sill, range } => {
                nugget >= 0.0 && sill >= nugget && range > 0.0
            }
            Self::PureNugget { nugget } => nugget >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(KrigeError::VariogramConfig(format!(
                "parameters out of range: {self:?}"
            )))
        }
    }
}

/// Binned semivariance estimate: one `(lag, semivariance)` pair per non-empty bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmpiricalVariogram {
    pub lags: Vec<f64>,
    pub semivariance: Vec<f64>,
    pub counts: Vec<usize>,
}

impl EmpiricalVariogram {
    /// Bins every pair by separation into `nlags` equal-width bins spanning
    /// the observed distance range. The lag of a bin is the mean separation
    /// of its pairs; semivariance is half the mean squared value difference.
    pub fn compute(points: &[[f64; 3]], values: &[f64], nlags: usize) -> Self {
        let n = points.len().min(values.len());
        let distances = MatrixHelper::pairwise_distances(&points[..n]);

        let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push((distances[[i, j]], (values[i] - values[j]).powi(2)));
            }
        }
        if pairs.is_empty() || nlags == 0 {
            return Self::default();
        }

        let (d_min, d_max) = pairs
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &(d, _)| {
                (acc.0.min(d), acc.1.max(d))
            });
        let width = (d_max - d_min) / nlags as f64;

        let mut lag_sum = vec![0.0; nlags];
        let mut sq_sum = vec![0.0; nlags];
        let mut counts = vec![0usize; nlags];
        for &(d, sq) in &pairs {
            let bin = if width > 0.0 {
                (((d - d_min) / width) as usize).min(nlags - 1)
            } else {
                0
            };
            lag_sum[bin] += d;
            sq_sum[bin] += sq;
            counts[bin] += 1;
        }

        let mut empirical = Self::default();
        for bin in 0..nlags {
            if counts[bin] == 0 {
                continue;
            }
            let count = counts[bin] as f64;
            empirical.lags.push(lag_sum[bin] / count);
            empirical.semivariance.push(0.5 * sq_sum[bin] / count);
            empirical.counts.push(counts[bin]);
        }
        empirical
    }

    pub fn len(&self) -> usize {
        self.lags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lags.is_empty()
    }
}

/// Variogram options shared by every Frame of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramSettings {
    pub model: ModelKind,
    pub nlags: usize,
    /// Skip fitting and use these parameters for every Frame.
    pub fixed: Option<VariogramModel>,
}

impl Default for VariogramSettings {
    fn default() -> Self {
        Self {
            model: ModelKind::Linear,
            nlags: DEFAULT_NLAGS,
            fixed: None,
        }
    }
}

/// Least-squares fit of a [`VariogramModel`] to one Frame.
#[derive(Debug, Clone)]
pub struct VariogramFitter {
    kind: ModelKind,
    nlags: usize,
    fixed: Option<VariogramModel>,
}

impl VariogramFitter {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            nlags: DEFAULT_NLAGS,
            fixed: None,
        }
    }

    /// Fails with [`KrigeError::VariogramConfig`] when a fixed model is out of range.
    pub fn from_settings(settings: &VariogramSettings) -> KrigeResult<Self> {
        if let Some(fixed) = &settings.fixed {
            fixed.validate()?;
        }
        Ok(Self {
            kind: settings.model,
            nlags: settings.nlags.max(1),
            fixed: settings.fixed,
        })
    }

    /// Fails with [`KrigeError::Numerical`] when fewer than two lag bins are populated.
    pub fn fit(&self, points: &[[f64; 3]], values: &[f64]) -> KrigeResult<VariogramModel> {
        if let Some(fixed) = self.fixed {
            return Ok(fixed);
        }

        let empirical = EmpiricalVariogram::compute(points, values, self.nlags);
        if empirical.len() < 2 {
            return Err(KrigeError::Numerical(format!(
                "{} populated lag bin(s) from {} observations; need at least 2",
                empirical.len(),
                points.len()
            )));
        }

        let model = match self.kind {
            ModelKind::Linear => {
                let (nugget, slope) = nonneg_line_fit(&empirical.lags, &empirical.semivariance);
                VariogramModel::Linear { nugget, slope }
            }
            kind => fit_bounded(kind, &empirical).ok_or_else(|| {
                KrigeError::Numerical(format!("{kind} has no bounded form"))
            })?,
        };
        debug!("fitted {:?} to {} lag bins", model, empirical.len());
        Ok(model)
    }

    /// Like [`fit`](Self::fit) but degrades to a nugget-only model when too
    /// few lag bins are populated. A fixed model is returned unchanged.
    pub fn fit_or_nugget(&self, points: &[[f64; 3]], values: &[f64]) -> VariogramModel {
        match self.fit(points, values) {
            Ok(model) => model,
            Err(err) => {
                let nugget = StatsHelper::population_variance(values);
                warn!("{err}; falling back to nugget-only model ({nugget:.4})");
                VariogramModel::PureNugget { nugget }
            }
        }
    }
}

/// Non-negative least squares for `y ≈ a + b·x` with `a, b >= 0`.
fn nonneg_line_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let sx: f64 = xs.iter().sum();
    let sy: f64 = ys.iter().sum();
    let sxx: f64 = xs.iter().map(|x| x * x).sum();
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();

    let det = n * sxx - sx * sx;
    if det.abs() > f64::EPSILON * n * sxx.max(1.0) {
        let b = (n * sxy - sx * sy) / det;
        let a = (sy - b * sx) / n;
        if a >= 0.0 && b >= 0.0 {
            return (a, b);
        }
    }

    // Optimum lies on a boundary of the feasible quadrant.
    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(ys)
            .map(|(x, y)| (a + b * x - y).powi(2))
            .sum()
    };
    let through_origin = (0.0, if sxx > 0.0 { (sxy / sxx).max(0.0) } else { 0.0 });
    let flat = ((sy / n).max(0.0), 0.0);
    if sse(through_origin.0, through_origin.1) <= sse(flat.0, flat.1) {
        through_origin
    } else {
        flat
    }
}

/// For a fixed range the bounded models are linear in (nugget, partial sill),
/// so only the range needs a one-dimensional search.
fn fit_bounded(kind: ModelKind, empirical: &EmpiricalVariogram) -> Option<VariogramModel> {
    let max_lag = empirical.lags.iter().copied().fold(0.0, f64::max);
    let lo = (max_lag * 0.01).ln();
    let hi = (max_lag * 4.0).ln();

    let evaluate = |log_range: f64| -> (f64, f64, f64) {
        let range = log_range.exp();
        let shapes: Vec<f64> = empirical
            .lags
            .iter()
            .map(|&h| kind.shape(h / range))
            .collect();
        let (nugget, partial) = nonneg_line_fit(&shapes, &empirical.semivariance);
        let sse = shapes
            .iter()
            .zip(&empirical.semivariance)
            .map(|(s, g)| (nugget + partial * s - g).powi(2))
            .sum();
        (sse, nugget, partial)
    };

    let step = (hi - lo) / (RANGE_CANDIDATES - 1) as f64;
    let best = (0..RANGE_CANDIDATES)
        .map(|i| (i, evaluate(lo + i as f64 * step).0))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    // Golden-section refinement between the neighbours of the best candidate.
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let mut a = lo + best.saturating_sub(1) as f64 * step;
    let mut b = lo + (best + 1).min(RANGE_CANDIDATES - 1) as f64 * step;
    for _ in 0..GOLDEN_ITERATIONS {
        let c = b - ratio * (b - a);
        let d = a + ratio * (b - a);
        if evaluate(c).0 <= evaluate(d).0 {
            b = d;
        } else {
            a = c;
        }
    }

    let log_range = (a + b) / 2.0;
    let (_, nugget, partial) = evaluate(log_range);
    VariogramModel::bounded(kind, nugget, nugget + partial, log_range.exp())
}
