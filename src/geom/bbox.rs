use geo::Rect;
use rstar::{RTreeObject, AABB};

/// R-tree entry: the bounding rectangle of one shape and the shape's row.
#[derive(Debug, Clone)]
pub(super) struct BoundingBox {
    idx: usize, // Row of the corresponding MultiPolygon in Geometries
    bbox: Rect<f64>,
}

impl BoundingBox {
    pub(super) fn new(idx: usize, bbox: Rect<f64>) -> Self {
        Self { idx, bbox }
    }

    #[inline] pub(super) fn idx(&self) -> usize { self.idx }
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope { envelope(&self.bbox) }
}

/// Envelope of a rectangle, for querying an R-tree of `BoundingBox`es.
#[inline]
pub(super) fn envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(rect.min().into(), rect.max().into())
}
