use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::{InterpError, Side}, frame::GeoFrame};

/// What to do when sources and targets use different coordinate reference systems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrsPolicy {
    /// Fail with [`InterpError::CrsMismatch`].
    #[default]
    Strict,
    /// Log a warning and carry on with the overlay.
    Warn,
}

impl CrsPolicy {
    pub fn to_str(&self) -> &'static str {
        match self {
            CrsPolicy::Strict => "strict",
            CrsPolicy::Warn => "warn",
        }
    }
}

impl FromStr for CrsPolicy {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(CrsPolicy::Strict),
            "warn" => Ok(CrsPolicy::Warn),
            other => Err(InterpError::unsupported("crs policy", other, "strict, warn")),
        }
    }
}

/// Fail with [`InterpError::MissingCrs`] if the collection has no EPSG code.
pub fn check_crs_exists(frame: &GeoFrame, side: Side) -> Result<u32> {
    match frame.epsg() {
        Some(epsg) => Ok(epsg),
        None => bail!(InterpError::MissingCrs { side }),
    }
}

/// Check that the sources and another collection both have a CRS and that they agree.
pub fn check_crs_match(sources: &GeoFrame, other: &GeoFrame, side: Side, policy: CrsPolicy) -> Result<()> {
    let source_epsg = check_crs_exists(sources, Side::Sources)?;
    let other_epsg = check_crs_exists(other, side)?;

    if source_epsg != other_epsg {
        match policy {
            CrsPolicy::Strict => bail!(InterpError::CrsMismatch { side, sources: source_epsg, found: other_epsg }),
            CrsPolicy::Warn => warn!(
                "source (EPSG:{source_epsg}) and {side} (EPSG:{other_epsg}) coordinate reference systems must match"
            ),
        }
    }

    Ok(())
}
