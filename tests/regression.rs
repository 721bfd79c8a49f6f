// Integration tests for regression interpolation:
//   Poisson calibration to the source total, uncalibrated OLS predictions,
//   model summaries, and fitting failures.

mod common;

use areal::{ArealInterpolation, Family, InterpError, RegressionEstimator, RegressionOptions, Side, Variable};
use common::{init_tracing, sources, targets, total};
use polars::prelude::*;

fn fit_table() -> DataFrame {
    df!(
        "pop" => [100.0, 200.0, 300.0, 400.0],
        "density" => [1.0, 2.0, 3.0, 4.0],
        "buildings" => [12.0, 19.0, 33.0, 41.0],
    ).unwrap()
}

fn pred_table() -> DataFrame {
    let buildings = (0..16).map(|i| 2.0 + (i % 5) as f64).collect::<Vec<_>>();
    df!("buildings" => buildings).unwrap()
}

#[test]
fn poisson_predictions_are_calibrated_to_source_total() {
    init_tracing();
    let out = ArealInterpolation::new(sources(), targets(), Variable::extensive("pop"))
        .regression(&fit_table(), &pred_table(), "pop ~ -1 + buildings").unwrap();

    assert_eq!(out.targets.len(), 16);
    assert!((total(&out.targets, "pop") - 1000.0).abs() < 1e-6);
    assert_eq!(out.summary.family, Family::Poisson);
    assert_eq!(out.summary.observations, 4);
    assert!(out.summary.coefficient("buildings").unwrap().estimate > 0.0);
    assert!(out.summary.coefficient("Intercept").is_none());
}

#[test]
fn gaussian_predictions_are_not_calibrated() {
    let fit = df!("density" => [1.0, 2.0, 3.0, 4.0], "buildings" => [10.0, 20.0, 30.0, 40.0]).unwrap();
    let out = ArealInterpolation::new(sources(), targets(), Variable::intensive("density"))
        .regression(&fit, &pred_table(), "density ~ buildings").unwrap();

    let values = out.targets.column_f64("density", Side::Targets).unwrap();
    // density = buildings / 10 exactly, and the first prediction row has 2 buildings.
    assert!((values[0].unwrap() - 0.2).abs() < 1e-9);
    assert_eq!(out.summary.family, Family::Gaussian);
    assert!(out.summary.deviance.abs() < 1e-12);
}

#[test]
fn summary_is_serialisable() {
    let model = RegressionEstimator::new(Variable::extensive("pop"), "pop ~ buildings").unwrap()
        .fit(&fit_table()).unwrap();
    let json = serde_json::to_value(model.summary()).unwrap();
    assert_eq!(json["family"], "poisson");
    assert_eq!(json["terms"][0]["term"], "Intercept");
    assert!(json["iterations"].as_u64().unwrap() >= 1);
}

#[test]
fn fitting_failures_are_model_errors() {
    let interp = ArealInterpolation::new(sources(), targets(), Variable::extensive("pop"));

    let err = interp.regression(&fit_table(), &pred_table(), "pop buildings").unwrap_err();
    assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::Formula { .. })));

    let err = interp.regression(&fit_table(), &pred_table(), "pop ~ roads").unwrap_err();
    assert_eq!(
        err.downcast_ref::<InterpError>(),
        Some(&InterpError::MissingColumn { side: Side::Fit, column: "roads".into() })
    );

    let mut collinear = fit_table();
    collinear.with_column(Column::new("twice".into(), [24.0, 38.0, 66.0, 82.0])).unwrap();
    let mut pred = pred_table();
    pred.with_column(Column::new("twice".into(), vec![1.0; 16])).unwrap();
    let err = interp.regression(&collinear, &pred, "pop ~ buildings + twice").unwrap_err();
    assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::SingularFit { .. })));
}

#[test]
fn iteration_limit_reaches_the_fit() {
    let interp = ArealInterpolation::new(sources(), targets(), Variable::extensive("pop"))
        .regression_options(RegressionOptions { max_iter: 1, ..Default::default() });
    let err = interp.regression(&fit_table(), &pred_table(), "pop ~ buildings").unwrap_err();
    assert!(matches!(err.downcast_ref::<InterpError>(), Some(InterpError::NonConvergence { iterations: 1, .. })));
}
