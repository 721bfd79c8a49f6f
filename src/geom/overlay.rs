use anyhow::Result;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rayon::prelude::*;

use crate::{cancel::Cancellation, geom::{bbox::envelope, Geometries}};

/// One piece of the pairwise intersection between a source and a target polygon.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub source: usize, // Row in the source Geometries
    pub target: usize, // Row in the target Geometries
    pub area: f64,
    pub geometry: MultiPolygon<f64>,
}

impl Geometries {
    /// Intersect every shape in `self` (targets) with every overlapping shape in `sources`.
    ///
    /// Candidates come from the source R-tree; pairs whose intersection has zero
    /// area (disjoint or merely touching) produce no fragment. Fragments are
    /// ordered by target row, then by source row. Targets are processed in
    /// parallel and the cancellation token is checked once per target.
    pub fn overlay(&self, sources: &Geometries, cancel: &Cancellation) -> Result<Vec<Fragment>> {
        let per_target = (0..self.len()).into_par_iter()
            .map(|t| {
                cancel.check()?;
                let target = self.shape(t);
                let Some(rect) = target.bounding_rect() else { return Ok(Vec::new()) };

                let mut candidates = sources.query(&envelope(&rect)).collect::<Vec<_>>();
                candidates.sort_unstable();

                Ok(candidates.into_iter()
                    .filter_map(|s| {
                        let geometry = target.intersection(sources.shape(s));
                        let area = geometry.unsigned_area();
                        (area > 0.0).then_some(Fragment { source: s, target: t, area, geometry })
                    })
                    .collect::<Vec<_>>())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(per_target.into_iter().flatten().collect())
    }
}
