use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::{RTree, AABB};

use crate::geom::bbox::BoundingBox;

/// An ordered polygon store with an R-tree over the shapes' bounding boxes.
/// Shapes may overlap; row order is preserved and is the identity of a shape.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    epsg: Option<u32>, // EPSG code, if known
}

impl Geometries {
    /// Index the shapes. Empty shapes keep their row but are left out of the R-tree.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, epsg: Option<u32>) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
                    .collect()
            ),
            shapes,
            epsg,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    /// Get the MultiPolygon at a given row.
    #[inline] pub fn shape(&self, idx: usize) -> &MultiPolygon<f64> { &self.shapes[idx] }

    /// Get the EPSG code, if known.
    #[inline] pub fn epsg(&self) -> Option<u32> { self.epsg }

    /// Rows whose bounding boxes intersect `envelope`, in no particular order.
    #[inline]
    pub(super) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = usize> + '_ {
        self.rtree.locate_in_envelope_intersecting(envelope).map(|bbox| bbox.idx())
    }

    /// Planar area of every shape, in CRS units squared.
    pub fn areas(&self) -> Vec<f64> {
        self.shapes.iter().map(|shape| shape.unsigned_area()).collect()
    }

    /// Dissolve every shape into one MultiPolygon (empty when there are no shapes).
    pub fn union(&self) -> MultiPolygon<f64> {
        self.shapes.iter().fold(MultiPolygon::new(vec![]), |acc, shape| acc.union(shape))
    }
}
