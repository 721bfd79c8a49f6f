mod bootstrap;
mod dasy;
mod model;
mod weighting;

pub use bootstrap::{geobootstrap, Average, Bandwidth, BootstrapOptions, Kernel, KernelBootstrap, Metric, Resample, Spread};
pub use dasy::dasymetric;
pub use model::{calibrate, Coefficient, Family, FittedModel, Formula, ModelSummary, Prediction, RegressionEstimator, RegressionOptions};
pub use weighting::{areal_weighting, Weighting};

pub(crate) use weighting::source_total;
