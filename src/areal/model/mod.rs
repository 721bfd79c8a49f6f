mod formula;
mod glm;
mod linalg;

use std::fmt;

use anyhow::{bail, ensure, Result};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{InterpError, Side},
    frame::f64_column,
    variable::Variable,
};

pub use formula::Formula;
pub use glm::Family;

use glm::{ols, poisson_irls, FitFailure};

/// Iteration settings for the Poisson IRLS fit. Least squares ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegressionOptions {
    pub max_iter: usize,
    /// Relative deviance change below which IRLS stops.
    pub tolerance: f64,
}

impl Default for RegressionOptions {
    fn default() -> Self { Self { max_iter: 100, tolerance: 1e-8 } }
}

impl RegressionOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_iter > 0, InterpError::InvalidOption { name: "max_iter", reason: "must be at least 1".into() });
        ensure!(
            self.tolerance > 0.0 && self.tolerance.is_finite(),
            InterpError::InvalidOption { name: "tolerance", reason: format!("must be positive, got {}", self.tolerance) }
        );
        Ok(())
    }
}

/// Fits a regression of the variable on ancillary predictors, then predicts
/// onto target rows.
///
/// Extensive variables use a Poisson GLM with log link, intensive variables
/// use ordinary least squares.
#[derive(Debug, Clone)]
pub struct RegressionEstimator {
    variable: Variable,
    formula: Formula,
    options: RegressionOptions,
}

impl RegressionEstimator {
    pub fn new(variable: Variable, formula: &str) -> Result<Self> {
        let formula = formula.parse::<Formula>()?;
        Ok(Self { variable, formula, options: RegressionOptions::default() })
    }

    pub fn with_options(mut self, options: RegressionOptions) -> Result<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    #[inline] pub fn variable(&self) -> &Variable { &self.variable }

    #[inline] pub fn formula(&self) -> &Formula { &self.formula }

    /// Model family implied by the variable kind.
    #[inline]
    pub fn family(&self) -> Family {
        match self.variable {
            Variable::Extensive(_) => Family::Poisson,
            Variable::Intensive(_) => Family::Gaussian,
        }
    }

    /// Fit the model on a table holding the response and every predictor.
    /// Rows with a missing value in any model column are dropped.
    pub fn fit(&self, data: &DataFrame) -> Result<FittedModel> {
        let family = self.family();
        let formula = &self.formula;

        let response = f64_column(data, formula.response(), Side::Fit)?;
        let predictors = formula.terms().iter()
            .map(|term| f64_column(data, term, Side::Fit))
            .collect::<Result<Vec<_>>>()?;

        let complete = (0..data.height())
            .filter(|&row| response[row].is_some() && predictors.iter().all(|col| col[row].is_some()))
            .collect::<Vec<_>>();
        let dropped = data.height() - complete.len();
        if dropped > 0 {
            warn!("dropped {dropped} of {} rows with missing values before fitting {formula}", data.height());
        }

        let p = formula.coefficient_names().len();
        ensure!(
            complete.len() >= p,
            InterpError::SingularFit { formula: formula.to_string() }
        );

        let y = complete.iter()
            .map(|&row| response[row].unwrap_or_default())
            .collect::<Array1<f64>>();
        if family == Family::Poisson {
            if let Some((i, &value)) = y.iter().enumerate().find(|&(_, &v)| v < 0.0) {
                bail!(InterpError::NegativeResponse { column: formula.response().to_string(), row: complete[i], value })
            }
        }

        let x = design_matrix(formula, &predictors, &complete);
        let fit = match family {
            Family::Poisson => poisson_irls(&x, &y, self.options.max_iter, self.options.tolerance),
            Family::Gaussian => ols(&x, &y),
        };
        let fit = fit.map_err(|failure| match failure {
            FitFailure::Singular => InterpError::SingularFit { formula: formula.to_string() },
            FitFailure::NotConverged { iterations } => InterpError::NonConvergence { formula: formula.to_string(), iterations },
        })?;
        debug!("fitted {} model {formula} on {} rows in {} iterations", family.to_str(), complete.len(), fit.iterations);

        let std_errors = fit.covariance.diag().iter().map(|v| v.max(0.0).sqrt()).collect();
        Ok(FittedModel {
            family,
            formula: formula.clone(),
            coefficients: fit.coefficients,
            std_errors,
            observations: complete.len(),
            dropped,
            deviance: fit.deviance,
            iterations: fit.iterations,
        })
    }

    /// Fit on `fit`, predict on `pred`, and calibrate extensive predictions to `total`.
    pub fn estimate(&self, fit: &DataFrame, pred: &DataFrame, total: f64) -> Result<Prediction> {
        let model = self.fit(fit)?;
        let summary = model.summary();
        let mut values = model.predict(pred)?;
        if self.variable.is_extensive() {
            calibrate(&mut values, total, self.variable.name())?;
        }
        Ok(Prediction { values, summary })
    }
}

/// Build the design matrix for the given rows, with a leading column of ones
/// when the formula keeps the intercept.
fn design_matrix(formula: &Formula, predictors: &[Vec<Option<f64>>], rows: &[usize]) -> Array2<f64> {
    let offset = formula.intercept() as usize;
    Array2::from_shape_fn((rows.len(), predictors.len() + offset), |(i, j)| {
        if j < offset { 1.0 } else { predictors[j - offset][rows[i]].unwrap_or_default() }
    })
}

/// A fitted regression model. Predicting consumes it.
#[derive(Debug, Clone)]
pub struct FittedModel {
    family: Family,
    formula: Formula,
    coefficients: Array1<f64>,
    std_errors: Vec<f64>,
    observations: usize,
    dropped: usize,
    deviance: f64,
    iterations: usize,
}

impl FittedModel {
    #[inline] pub fn family(&self) -> Family { self.family }

    pub fn summary(&self) -> ModelSummary {
        let terms = self.formula.coefficient_names().into_iter()
            .zip(self.coefficients.iter().zip(&self.std_errors))
            .map(|(term, (&estimate, &std_error))| Coefficient { term, estimate, std_error })
            .collect();

        ModelSummary {
            family: self.family,
            formula: self.formula.to_string(),
            terms,
            observations: self.observations,
            dropped: self.dropped,
            deviance: self.deviance,
            iterations: self.iterations,
        }
    }

    /// Predict one value per row of `data`, in row order, on the response scale.
    pub fn predict(self, data: &DataFrame) -> Result<Vec<f64>> {
        let predictors = self.formula.terms().iter()
            .map(|term| f64_column(data, term, Side::Predict))
            .collect::<Result<Vec<_>>>()?;

        for (term, column) in self.formula.terms().iter().zip(&predictors) {
            if let Some(row) = column.iter().position(Option::is_none) {
                bail!(InterpError::MissingValue { side: Side::Predict, column: term.clone(), row })
            }
        }

        let rows = (0..data.height()).collect::<Vec<_>>();
        let eta = design_matrix(&self.formula, &predictors, &rows).dot(&self.coefficients);
        Ok(eta.iter().map(|&v| self.family.inverse_link(v)).collect())
    }
}

/// Scale predictions so they sum to `total`.
pub fn calibrate(predictions: &mut [f64], total: f64, column: &str) -> Result<()> {
    let sum = predictions.iter().sum::<f64>();
    if sum == 0.0 && total == 0.0 { return Ok(()) }
    ensure!(sum != 0.0 && sum.is_finite(), InterpError::ZeroTotal { column: column.to_string() });

    let factor = total / sum;
    debug!("calibrating {column:?} predictions by {factor}");
    predictions.iter_mut().for_each(|v| *v *= factor);
    Ok(())
}

/// Calibrated predictions and the summary of the model that produced them.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub values: Vec<f64>,
    pub summary: ModelSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
}

/// Summary of a fitted regression model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub family: Family,
    pub formula: String,
    pub terms: Vec<Coefficient>,
    pub observations: usize,
    pub dropped: usize,
    pub deviance: f64, // Residual sum of squares for OLS
    pub iterations: usize,
}

impl ModelSummary {
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.terms.iter().find(|c| c.term == term)
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Formula:      {}", self.formula)?;
        writeln!(f, "Family:       {}", self.family.to_str())?;
        writeln!(f, "Observations: {} ({} dropped)", self.observations, self.dropped)?;
        writeln!(f, "Deviance:     {:.4}", self.deviance)?;
        writeln!(f, "Iterations:   {}", self.iterations)?;

        let width = self.terms.iter().map(|c| c.term.len()).max().unwrap_or(0).max(4);
        writeln!(f, "{:<width$}  {:>14}  {:>14}", "term", "estimate", "std error")?;
        for c in &self.terms {
            writeln!(f, "{:<width$}  {:>14.6}  {:>14.6}", c.term, c.estimate, c.std_error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    #[test]
    fn family_follows_variable_kind() {
        assert_eq!(RegressionEstimator::new(Variable::extensive("pop"), "pop ~ b").unwrap().family(), Family::Poisson);
        assert_eq!(RegressionEstimator::new(Variable::intensive("dens"), "dens ~ b").unwrap().family(), Family::Gaussian);
    }

    #[test]
    fn gaussian_fit_and_predict() {
        let fit = df!("y" => [1.0, 3.0, 5.0, 7.0], "x" => [0.0, 1.0, 2.0, 3.0]).unwrap();
        let pred = df!("x" => [4.0, 10.0]).unwrap();
        let estimator = RegressionEstimator::new(Variable::intensive("y"), "y ~ x").unwrap();
        let model = estimator.fit(&fit).unwrap();
        let summary = model.summary();
        assert!((summary.coefficient("x").unwrap().estimate - 2.0).abs() < 1e-9);
        let values = model.predict(&pred).unwrap();
        assert!((values[0] - 9.0).abs() < 1e-9);
        assert!((values[1] - 21.0).abs() < 1e-9);
    }

    #[test]
    fn rows_with_nulls_are_dropped_from_fit() {
        let fit = df!("y" => [Some(1.0), None, Some(5.0), Some(7.0)], "x" => [Some(0.0), Some(1.0), Some(2.0), None]).unwrap();
        let model = RegressionEstimator::new(Variable::intensive("y"), "y ~ x").unwrap().fit(&fit).unwrap();
        let summary = model.summary();
        assert_eq!(summary.observations, 2);
        assert_eq!(summary.dropped, 2);
    }

    #[test]
    fn extensive_estimate_is_calibrated() {
        let fit = df!("pop" => [10.0, 20.0, 40.0], "build" => [1.0, 2.0, 4.0]).unwrap();
        let pred = df!("build" => [1.0, 3.0]).unwrap();
        let estimator = RegressionEstimator::new(Variable::extensive("pop"), "pop ~ -1 + build").unwrap();
        let prediction = estimator.estimate(&fit, &pred, 70.0).unwrap();
        assert!((prediction.values.iter().sum::<f64>() - 70.0).abs() < 1e-9);
        assert!(prediction.values[1] > prediction.values[0]);
        assert_eq!(prediction.summary.family, Family::Poisson);
    }

    #[test]
    fn negative_poisson_response_is_rejected() {
        let fit = df!("pop" => [1.0, -2.0, 3.0], "b" => [1.0, 2.0, 3.0]).unwrap();
        let err = RegressionEstimator::new(Variable::extensive("pop"), "pop ~ b").unwrap().fit(&fit).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InterpError>(),
            Some(InterpError::NegativeResponse { row: 1, .. })
        ));
    }

    #[test]
    fn collinear_predictors_are_singular() {
        let fit = df!("y" => [1.0, 2.0, 3.0, 4.0], "a" => [1.0, 2.0, 3.0, 4.0], "b" => [2.0, 4.0, 6.0, 8.0]).unwrap();
        let err = RegressionEstimator::new(Variable::intensive("y"), "y ~ a + b").unwrap().fit(&fit).unwrap_err();
        assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::SingularFit { .. })));
    }

    #[test]
    fn prediction_table_nulls_and_missing_columns() {
        let fit = df!("y" => [1.0, 2.0, 4.0], "x" => [1.0, 2.0, 3.0]).unwrap();
        let estimator = RegressionEstimator::new(Variable::intensive("y"), "y ~ x").unwrap();

        let err = estimator.fit(&fit).unwrap().predict(&df!("x" => [Some(1.0), None]).unwrap()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InterpError>(),
            Some(&InterpError::MissingValue { side: Side::Predict, column: "x".into(), row: 1 })
        );

        let err = estimator.fit(&fit).unwrap().predict(&df!("z" => [1.0]).unwrap()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InterpError>(),
            Some(&InterpError::MissingColumn { side: Side::Predict, column: "x".into() })
        );
    }

    #[test]
    fn summary_renders_terms() {
        let fit = df!("y" => [1.0, 3.0, 5.0, 8.0], "x" => [0.0, 1.0, 2.0, 3.0]).unwrap();
        let summary = RegressionEstimator::new(Variable::intensive("y"), "y ~ x").unwrap().fit(&fit).unwrap().summary();
        let text = summary.to_string();
        assert!(text.contains("Intercept"));
        assert!(text.contains("gaussian"));
        assert!(summary.coefficient("x").unwrap().std_error > 0.0);
    }

    #[test]
    fn iteration_limit_is_a_model_error() {
        let fit = df!("pop" => [2.0, 4.0, 6.0, 8.0], "b" => [1.0, 2.0, 3.0, 5.0]).unwrap();
        let options = RegressionOptions { max_iter: 1, ..Default::default() };
        let err = RegressionEstimator::new(Variable::extensive("pop"), "pop ~ b").unwrap()
            .with_options(options).unwrap()
            .fit(&fit).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InterpError>(),
            Some(InterpError::NonConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn invalid_iteration_settings_are_rejected() {
        let estimator = RegressionEstimator::new(Variable::extensive("pop"), "pop ~ b").unwrap();
        let err = estimator.clone().with_options(RegressionOptions { max_iter: 0, ..Default::default() }).unwrap_err();
        assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::InvalidOption { name: "max_iter", .. })));
        assert!(estimator.with_options(RegressionOptions { tolerance: -1.0, ..Default::default() }).is_err());
    }

    #[test]
    fn calibrate_zero_sum() {
        let mut values = vec![0.0, 0.0];
        assert!(calibrate(&mut values, 5.0, "pop").is_err());
        assert!(calibrate(&mut values, 0.0, "pop").is_ok());
    }
}
