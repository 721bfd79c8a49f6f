use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::linalg::{cholesky, cholesky_inverse, cholesky_solve};

/// Model family used by the regression estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Poisson GLM with log link, for non-negative counts (extensive variables).
    Poisson,
    /// Ordinary least squares, for continuous rates (intensive variables).
    Gaussian,
}

impl Family {
    pub fn to_str(&self) -> &'static str {
        match self {
            Family::Poisson => "poisson",
            Family::Gaussian => "gaussian",
        }
    }

    /// Map the linear predictor onto the response scale.
    #[inline]
    pub(super) fn inverse_link(&self, eta: f64) -> f64 {
        match self {
            Family::Poisson => eta.exp(),
            Family::Gaussian => eta,
        }
    }
}

/// Raw result of a fit, before it is wrapped with names and a formula.
#[derive(Debug, Clone)]
pub(super) struct Fit {
    pub coefficients: Array1<f64>,
    pub covariance: Array2<f64>,
    pub deviance: f64, // Residual sum of squares for OLS
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FitFailure {
    Singular,
    NotConverged { iterations: usize },
}

/// Ordinary least squares via the normal equations.
pub(super) fn ols(x: &Array2<f64>, y: &Array1<f64>) -> Result<Fit, FitFailure> {
    let (n, p) = x.dim();
    let xtx = x.t().dot(x);
    let l = cholesky(&xtx).ok_or(FitFailure::Singular)?;
    let coefficients = cholesky_solve(&l, &x.t().dot(y));

    let residuals = y - &x.dot(&coefficients);
    let rss = residuals.dot(&residuals);
    let sigma2 = if n > p { rss / (n - p) as f64 } else { f64::NAN };

    Ok(Fit {
        coefficients,
        covariance: cholesky_inverse(&l) * sigma2,
        deviance: rss,
        iterations: 1,
    })
}

/// Poisson deviance `2 Σ [y ln(y/μ) - (y - μ)]`, with `y ln(y/μ) = 0` at `y = 0`.
fn poisson_deviance(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    2.0 * y.iter().zip(mu.iter())
        .map(|(&y, &mu)| if y > 0.0 { y * (y / mu).ln() - (y - mu) } else { mu })
        .sum::<f64>()
}

/// Solve the weighted normal equations `XᵀWX β = XᵀWz`.
fn weighted_step(x: &Array2<f64>, w: &Array1<f64>, z: &Array1<f64>) -> Result<Array1<f64>, FitFailure> {
    let xw = x * &w.view().insert_axis(Axis(1));
    let l = cholesky(&xw.t().dot(x)).ok_or(FitFailure::Singular)?;
    Ok(cholesky_solve(&l, &xw.t().dot(z)))
}

/// Poisson GLM (log link) by iteratively reweighted least squares.
///
/// Starts from `μ = (y + ȳ) / 2` and stops when the relative deviance change
/// `|D - D_old| / (|D| + 0.1)` drops below `tolerance`.
pub(super) fn poisson_irls(x: &Array2<f64>, y: &Array1<f64>, max_iter: usize, tolerance: f64) -> Result<Fit, FitFailure> {
    let ybar = y.mean().unwrap_or(0.0);
    let mut mu = y.mapv(|v| ((v + ybar) / 2.0).max(1e-10));
    let mut eta = mu.mapv(f64::ln);
    let mut deviance = poisson_deviance(y, &mu);

    for iteration in 1..=max_iter {
        // Working response and weights for the log link.
        let z = &eta + &((y - &mu) / &mu);
        let coefficients = weighted_step(x, &mu, &z)?;

        eta = x.dot(&coefficients);
        mu = eta.mapv(f64::exp);
        if mu.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(FitFailure::NotConverged { iterations: iteration })
        }

        let previous = deviance;
        deviance = poisson_deviance(y, &mu);
        if (deviance - previous).abs() / (deviance.abs() + 0.1) < tolerance {
            let xw = x * &mu.view().insert_axis(Axis(1));
            let l = cholesky(&xw.t().dot(x)).ok_or(FitFailure::Singular)?;
            return Ok(Fit { coefficients, covariance: cholesky_inverse(&l), deviance, iterations: iteration })
        }
    }

    Err(FitFailure::NotConverged { iterations: max_iter })
}
