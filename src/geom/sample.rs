use std::str::FromStr;

use anyhow::{bail, ensure, Result};
use geo::{BoundingRect, Centroid, Contains, Coord, InteriorPoint, MultiPolygon, Point, Rect};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{error::{InterpError, Side}, geom::Geometries};

/// How a polygon is reduced to representative point(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMethod {
    /// Area-weighted centroid. May fall outside non-convex shapes.
    Centroid,
    /// A point guaranteed to lie inside the shape.
    InteriorPoint,
    /// Uniform draws in the shape's bounding box, rejection-tested against the shape.
    /// Falls back to the interior point after `max_attempts` misses.
    Uniform { max_attempts: usize },
}

impl Default for SampleMethod {
    fn default() -> Self { SampleMethod::Centroid }
}

impl FromStr for SampleMethod {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "centroid" => Ok(SampleMethod::Centroid),
            "interior_point" => Ok(SampleMethod::InteriorPoint),
            "uniform" => Ok(SampleMethod::Uniform { max_attempts: 1000 }),
            other => Err(InterpError::unsupported("sampling method", other, "centroid, interior_point, uniform")),
        }
    }
}

/// A representative point tagged with the row of the polygon it stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedPoint {
    pub owner: usize,
    pub point: Point<f64>,
}

/// Draw a uniform point inside `bounds`.
#[inline]
fn uniform_in(bounds: &Rect<f64>, rng: &mut impl Rng) -> Point<f64> {
    let (min, max) = (bounds.min(), bounds.max());
    Point::from(Coord {
        x: min.x + rng.random::<f64>() * (max.x - min.x),
        y: min.y + rng.random::<f64>() * (max.y - min.y),
    })
}

/// Rejection-sample one point inside `shape`, or `None` if every attempt missed.
fn rejection_sample(shape: &MultiPolygon<f64>, max_attempts: usize, rng: &mut impl Rng) -> Option<Point<f64>> {
    let bounds = shape.bounding_rect()?;
    (0..max_attempts)
        .map(|_| uniform_in(&bounds, rng))
        .find(|point| shape.contains(point))
}

impl Geometries {
    /// Reduce every shape to `per_polygon` representative points.
    /// Deterministic methods repeat the same point `per_polygon` times.
    pub fn sample_points(&self, method: SampleMethod, per_polygon: usize, side: Side, rng: &mut impl Rng) -> Result<Vec<TaggedPoint>> {
        ensure!(per_polygon > 0, InterpError::InvalidOption {
            name: "per_polygon",
            reason: "at least one point per polygon is required".into(),
        });

        let mut points = Vec::with_capacity(self.len() * per_polygon);
        for (owner, shape) in self.shapes().iter().enumerate() {
            for _ in 0..per_polygon {
                let point = match method {
                    SampleMethod::Centroid => shape.centroid(),
                    SampleMethod::InteriorPoint => shape.interior_point(),
                    SampleMethod::Uniform { max_attempts } => rejection_sample(shape, max_attempts, rng)
                        .or_else(|| shape.interior_point()),
                };
                let Some(point) = point else { bail!(InterpError::EmptyGeometry { side, row: owner }) };
                points.push(TaggedPoint { owner, point });
            }
        }

        Ok(points)
    }
}
