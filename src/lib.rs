#![doc = "Areal interpolation public API"]
mod areal;
mod cancel;
mod config;
mod error;
mod frame;
mod geom;
mod interpolation;
mod variable;

#[doc(inline)]
pub use interpolation::{ArealInterpolation, RegressionOutput};

#[doc(inline)]
pub use areal::{
    areal_weighting, calibrate, dasymetric, geobootstrap,
    Average, Bandwidth, BootstrapOptions, Coefficient, Family, FittedModel, Formula, Kernel,
    KernelBootstrap, Metric, ModelSummary, Prediction, RegressionEstimator, RegressionOptions, Resample, Spread,
    Weighting,
};

#[doc(inline)]
pub use frame::{check_crs_exists, check_crs_match, resolve_uid, CrsPolicy, Estimates, GeoFrame, JoinPolicy};

#[doc(inline)]
pub use geom::{Fragment, Geometries, MaskMode, SampleMethod, TaggedPoint};

#[doc(inline)]
pub use cancel::Cancellation;

#[doc(inline)]
pub use config::InterpConfig;

#[doc(inline)]
pub use error::{ErrorCategory, InterpError, Side};

#[doc(inline)]
pub use variable::Variable;
