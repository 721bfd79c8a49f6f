use anyhow::Result;
use tracing::debug;

use crate::{
    areal::weighting::{areal_weighting, rescale, source_total, Weighting},
    cancel::Cancellation,
    error::Side,
    frame::{Estimates, GeoFrame},
    geom::MaskMode,
    variable::Variable,
};

/// Binary dasymetric interpolation: mask the targets, weight by overlap with the
/// masked shapes, then (for extensive variables) rescale so the masked targets
/// carry the full source total.
///
/// Estimates are keyed by the original target identifiers, so they can be merged
/// back onto the unmasked target shapes. Targets masked away entirely get no estimate.
pub fn dasymetric(
    sources: &GeoFrame,
    targets: &GeoFrame,
    tid: &str,
    mask: &GeoFrame,
    how: MaskMode,
    variable: &Variable,
    weights: Weighting,
    cancel: &Cancellation,
) -> Result<Estimates> {
    let (rows, shapes): (Vec<_>, Vec<_>) = targets.geoms().apply_mask(mask.geoms(), how)?.into_iter().unzip();
    debug!("{} of {} targets keep area after {} mask", rows.len(), targets.len(), how.to_str());

    let masked = targets.with_shapes(&rows, shapes)?;
    let mut estimates = areal_weighting(sources, &masked, tid, variable, weights, cancel)?;

    // Masking removes area that must not reduce the represented total.
    if variable.is_extensive() {
        let total = source_total(&sources.column_f64(variable.name(), Side::Sources)?);
        rescale(&mut estimates, total)?;
    }

    Ok(estimates)
}
