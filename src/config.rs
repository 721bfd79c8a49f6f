use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    areal::{BootstrapOptions, RegressionOptions, Weighting},
    frame::CrsPolicy,
    variable::Variable,
};

/// Loose interpolation settings, as read from JSON.
///
/// Exactly one of `extensive` and `intensive` must be set; this is checked
/// when the variable is requested, not while parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterpConfig {
    pub extensive: Option<String>,
    pub intensive: Option<String>,
    pub weights: Weighting,
    pub sid: Option<String>,
    pub tid: Option<String>,
    /// Keep targets without an estimate (with a null value).
    pub all_geoms: bool,
    pub crs_policy: CrsPolicy,
    pub timeout_ms: Option<u64>,
    pub regression: RegressionOptions,
    pub bootstrap: BootstrapOptions,
}

impl InterpConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid interpolation config")
    }

    /// The declared variable, or a configuration error if zero or two are declared.
    pub fn variable(&self) -> Result<Variable> {
        Variable::from_flags(self.extensive.as_deref(), self.intensive.as_deref())
    }

    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
