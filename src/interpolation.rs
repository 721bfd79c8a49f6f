use anyhow::{ensure, Result};
use polars::prelude::{Column, DataFrame};
use tracing::debug;

use crate::{
    areal::{self, BootstrapOptions, ModelSummary, RegressionEstimator, RegressionOptions, Weighting},
    cancel::Cancellation,
    config::InterpConfig,
    error::{InterpError, Side},
    frame::{check_crs_match, resolve_uid, CrsPolicy, GeoFrame, JoinPolicy},
    geom::MaskMode,
    variable::Variable,
};

/// Interpolates one variable from source polygons onto target polygons.
///
/// Every method validates the inputs (coordinate reference systems, identifier
/// columns), runs one estimator and merges its estimates back onto the targets.
/// The inputs are never modified.
#[derive(Debug, Clone)]
pub struct ArealInterpolation {
    sources: GeoFrame,
    targets: GeoFrame,
    variable: Variable,
    weights: Weighting,
    sid: Option<String>,
    tid: Option<String>,
    join: JoinPolicy,
    crs_policy: CrsPolicy,
    cancel: Cancellation,
    regression: RegressionOptions,
    bootstrap: BootstrapOptions,
}

/// Inputs that passed validation, with their resolved identifier columns.
struct Checked {
    sources: GeoFrame,
    targets: GeoFrame,
    tid: String,
}

/// Regression output: targets carrying predictions, plus the fitted model's summary.
#[derive(Debug, Clone)]
pub struct RegressionOutput {
    pub targets: GeoFrame,
    pub summary: ModelSummary,
}

impl ArealInterpolation {
    pub fn new(sources: GeoFrame, targets: GeoFrame, variable: Variable) -> Self {
        Self {
            sources,
            targets,
            variable,
            weights: Weighting::default(),
            sid: None,
            tid: None,
            join: JoinPolicy::default(),
            crs_policy: CrsPolicy::default(),
            cancel: Cancellation::new(),
            regression: RegressionOptions::default(),
            bootstrap: BootstrapOptions::default(),
        }
    }

    /// Build an interpolation from a loose configuration.
    pub fn from_config(sources: GeoFrame, targets: GeoFrame, config: &InterpConfig) -> Result<Self> {
        let mut interp = Self::new(sources, targets, config.variable()?)
            .weights(config.weights)
            .join(JoinPolicy::from_all_geoms(config.all_geoms))
            .crs_policy(config.crs_policy)
            .regression_options(config.regression)
            .bootstrap_options(config.bootstrap);
        interp.sid = config.sid.clone();
        interp.tid = config.tid.clone();
        if let Some(timeout) = config.timeout() {
            interp.cancel = Cancellation::with_timeout(timeout);
        }
        Ok(interp)
    }

    pub fn weights(mut self, weights: Weighting) -> Self { self.weights = weights; self }

    /// Name the unique identifier column of the sources.
    pub fn sid(mut self, column: impl Into<String>) -> Self { self.sid = Some(column.into()); self }

    /// Name the unique identifier column of the targets.
    pub fn tid(mut self, column: impl Into<String>) -> Self { self.tid = Some(column.into()); self }

    pub fn join(mut self, join: JoinPolicy) -> Self { self.join = join; self }

    pub fn crs_policy(mut self, policy: CrsPolicy) -> Self { self.crs_policy = policy; self }

    /// Use a cancellation token; a clone of it can cancel the call from another thread.
    pub fn cancellation(mut self, cancel: Cancellation) -> Self { self.cancel = cancel; self }

    /// IRLS settings used by [`ArealInterpolation::regression`].
    pub fn regression_options(mut self, options: RegressionOptions) -> Self { self.regression = options; self }

    /// Resampling settings used by [`ArealInterpolation::geobootstrap`].
    pub fn bootstrap_options(mut self, options: BootstrapOptions) -> Self { self.bootstrap = options; self }

    #[inline] pub fn variable(&self) -> &Variable { &self.variable }

    #[inline] pub fn sources(&self) -> &GeoFrame { &self.sources }

    #[inline] pub fn targets(&self) -> &GeoFrame { &self.targets }

    fn areal_checks(&self) -> Result<Checked> {
        check_crs_match(&self.sources, &self.targets, Side::Targets, self.crs_policy)?;
        ensure!(
            !self.targets.has_column(self.variable.name()),
            InterpError::VariableCollision { column: self.variable.name().to_string() }
        );

        let (sources, sid) = resolve_uid(self.sources.clone(), self.sid.as_deref(), Side::Sources)?;
        let (targets, tid) = resolve_uid(self.targets.clone(), self.tid.as_deref(), Side::Targets)?;
        debug!("interpolating {:?} from {} sources ({sid:?}) to {} targets ({tid:?})", self.variable.name(), sources.len(), targets.len());

        Ok(Checked { sources, targets, tid })
    }

    /// Area-weighted interpolation.
    pub fn areal_weighting(&self) -> Result<GeoFrame> {
        let Checked { sources, targets, tid } = self.areal_checks()?;
        let estimates = areal::areal_weighting(&sources, &targets, &tid, &self.variable, self.weights, &self.cancel)?;
        targets.merge(&estimates, self.join)
    }

    /// Dasymetric interpolation: restrict targets to (or away from) a mask first.
    /// Estimates are merged onto the original, unmasked target shapes.
    pub fn dasymetric(&self, mask: &GeoFrame, how: MaskMode) -> Result<GeoFrame> {
        let Checked { sources, targets, tid } = self.areal_checks()?;
        check_crs_match(&sources, mask, Side::Mask, self.crs_policy)?;

        let estimates = areal::dasymetric(&sources, &targets, &tid, mask, how, &self.variable, self.weights, &self.cancel)?;
        targets.merge(&estimates, self.join)
    }

    /// Regression interpolation: fit `formula` on `fit`, predict one value per target
    /// from `pred` (row `i` belongs to target `i`), and calibrate extensive predictions
    /// to the source total.
    pub fn regression(&self, fit: &DataFrame, pred: &DataFrame, formula: &str) -> Result<RegressionOutput> {
        let column = self.variable.name();
        ensure!(!self.targets.has_column(column), InterpError::VariableCollision { column: column.to_string() });
        ensure!(
            pred.height() == self.targets.len(),
            InterpError::RowMismatch { side: Side::Predict, expected: self.targets.len(), found: pred.height() }
        );

        let total = match self.variable {
            Variable::Extensive(_) => areal::source_total(&self.sources.column_f64(column, Side::Sources)?),
            Variable::Intensive(_) => 0.0,
        };
        self.cancel.check()?;

        let prediction = RegressionEstimator::new(self.variable.clone(), formula)?
            .with_options(self.regression)?
            .estimate(fit, pred, total)?;
        let targets = self.targets.clone().with_column(Column::new(column.into(), prediction.values))?;
        Ok(RegressionOutput { targets, summary: prediction.summary })
    }

    /// Kernel-weighted bootstrap interpolation of an intensive variable. Adds the
    /// estimate column and a `<variable>_<spread>` uncertainty column.
    pub fn geobootstrap(&self) -> Result<GeoFrame> {
        if self.variable.is_extensive() {
            return Err(InterpError::ExtensiveResampling(self.variable.name().to_string()).into())
        }
        let Checked { sources, targets, tid } = self.areal_checks()?;
        let estimates = areal::geobootstrap(&sources, &targets, &tid, &self.variable, &self.bootstrap, &self.cancel)?;
        targets.merge(&estimates, self.join)
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use polars::prelude::*;

    use super::*;

    fn unit_square(x: f64) -> geo::Polygon<f64> {
        polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0)]
    }

    fn sources() -> GeoFrame {
        GeoFrame::from_polygons(vec![unit_square(0.0), unit_square(1.0)], df!("pop" => [10.0, 30.0]).unwrap(), Some(27700)).unwrap()
    }

    fn targets(epsg: Option<u32>) -> GeoFrame {
        GeoFrame::from_polygons(vec![unit_square(0.5)], df!("name" => ["middle"]).unwrap(), epsg).unwrap()
    }

    #[test]
    fn weighting_adds_variable_and_synthesised_tid() {
        let out = ArealInterpolation::new(sources(), targets(Some(27700)), Variable::extensive("pop"))
            .areal_weighting().unwrap();
        assert!(out.has_column("tid"));
        assert_eq!(out.column_f64("pop", Side::Targets).unwrap(), vec![Some(20.0)]);
    }

    #[test]
    fn strict_crs_policy_rejects_mismatch() {
        let interp = ArealInterpolation::new(sources(), targets(Some(4326)), Variable::extensive("pop"));
        let err = interp.areal_weighting().unwrap_err();
        assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::CrsMismatch { .. })));
        assert!(interp.crs_policy(CrsPolicy::Warn).areal_weighting().is_ok());
    }

    #[test]
    fn missing_target_crs_is_rejected() {
        let err = ArealInterpolation::new(sources(), targets(None), Variable::extensive("pop"))
            .areal_weighting().unwrap_err();
        assert_eq!(err.downcast_ref::<InterpError>(), Some(&InterpError::MissingCrs { side: Side::Targets }));
    }

    #[test]
    fn regression_rows_must_match_targets() {
        let interp = ArealInterpolation::new(sources(), targets(Some(27700)), Variable::extensive("pop"));
        let fit = df!("pop" => [10.0, 30.0], "b" => [1.0, 3.0]).unwrap();
        let pred = df!("b" => [1.0, 2.0]).unwrap();
        let err = interp.regression(&fit, &pred, "pop ~ b").unwrap_err();
        assert_eq!(
            err.downcast_ref::<InterpError>(),
            Some(&InterpError::RowMismatch { side: Side::Predict, expected: 1, found: 2 })
        );
    }

    #[test]
    fn geobootstrap_rejects_extensive() {
        let err = ArealInterpolation::new(sources(), targets(Some(27700)), Variable::extensive("pop"))
            .geobootstrap().unwrap_err();
        assert_eq!(err.downcast_ref::<InterpError>(), Some(&InterpError::ExtensiveResampling("pop".into())));
    }
}
