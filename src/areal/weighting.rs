use std::str::FromStr;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cancel::Cancellation,
    error::{InterpError, Side},
    frame::{Estimates, GeoFrame},
    variable::Variable,
};

/// How overlap-weighted aggregates are scaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Weighting {
    /// No rescaling: each fragment contributes its proportional share only.
    /// Totals may drift when source and target extents differ.
    #[default]
    Sum,
    /// Rescale all targets by one global factor so the target total equals the source total.
    Total,
}

impl Weighting {
    pub fn to_str(&self) -> &'static str {
        match self {
            Weighting::Sum => "sum",
            Weighting::Total => "total",
        }
    }
}

impl FromStr for Weighting {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Weighting::Sum),
            "total" => Ok(Weighting::Total),
            other => Err(InterpError::unsupported("weighting mode", other, "sum, total")),
        }
    }
}

impl TryFrom<String> for Weighting {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// Sum of the non-null source values.
#[inline]
pub(crate) fn source_total(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().sum()
}

/// Scale estimates so they sum to `total`. An empty set of estimates is left as is.
pub(crate) fn rescale(estimates: &mut Estimates, total: f64) -> Result<()> {
    let current = estimates.total();
    if estimates.is_empty() || (current == 0.0 && total == 0.0) { return Ok(()) }
    ensure!(current != 0.0, InterpError::ZeroTotal { column: estimates.column().to_string() });

    let factor = total / current;
    debug!("rescaling {:?} by {factor}", estimates.column());
    estimates.scale(factor);
    Ok(())
}

/// Interpolate a variable from sources to targets by the area of their overlap.
///
/// Each intersection fragment contributes `value * area(fragment) / reference`,
/// where the reference area is the source's area for an extensive variable and
/// the target's area for an intensive one. Contributions are summed per target.
/// Targets without any overlapping source (or overlapping only null values)
/// get no estimate.
pub fn areal_weighting(
    sources: &GeoFrame,
    targets: &GeoFrame,
    tid: &str,
    variable: &Variable,
    weights: Weighting,
    cancel: &Cancellation,
) -> Result<Estimates> {
    let column = variable.name();

    if variable.is_intensive() && weights == Weighting::Total {
        bail!(InterpError::IntensiveTotal(column.to_string()))
    }
    if targets.has_column(column) {
        bail!(InterpError::VariableCollision { column: column.to_string() })
    }

    let values = sources.column_f64(column, Side::Sources)?;
    let target_ids = targets.ids(tid, Side::Targets)?;

    // The reference area anchors the weight: source area for counts, target area for rates.
    let reference = match variable {
        Variable::Extensive(_) => sources.geoms().areas(),
        Variable::Intensive(_) => targets.geoms().areas(),
    };

    let fragments = targets.geoms().overlay(sources.geoms(), cancel)?;
    debug!("{} intersection fragments between {} sources and {} targets", fragments.len(), sources.len(), targets.len());

    let mut sums = vec![None; targets.len()];
    for fragment in &fragments {
        let Some(value) = values[fragment.source] else { continue };
        let area = match variable {
            Variable::Extensive(_) => reference[fragment.source],
            Variable::Intensive(_) => reference[fragment.target],
        };
        *sums[fragment.target].get_or_insert(0.0) += value * fragment.area / area;
    }

    let (ids, estimates): (Vec<String>, Vec<f64>) = sums.into_iter().zip(target_ids)
        .filter_map(|(sum, id)| sum.map(|sum| (id, sum)))
        .unzip();

    let mut estimates = Estimates::new(tid, column, ids, estimates);
    if weights == Weighting::Total {
        rescale(&mut estimates, source_total(&values))?;
    }

    Ok(estimates)
}
