use std::str::FromStr;

use anyhow::{bail, Result};
use geo::{Area, BooleanOps, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::{error::InterpError, geom::Geometries};

/// How a mask restricts target geometries in dasymetric mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MaskMode {
    /// Keep the part of each target inside the mask.
    #[default]
    Clip,
    /// Keep the part of each target outside the mask.
    Difference,
}

impl MaskMode {
    pub fn to_str(&self) -> &'static str {
        match self {
            MaskMode::Clip => "clip",
            MaskMode::Difference => "difference",
        }
    }
}

impl FromStr for MaskMode {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clip" => Ok(MaskMode::Clip),
            "difference" => Ok(MaskMode::Difference),
            other => Err(InterpError::unsupported("masking mode", other, "clip, difference")),
        }
    }
}

impl TryFrom<String> for MaskMode {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl Geometries {
    /// Apply a mask to every shape, returning `(row, masked shape)` for the rows
    /// that keep a positive area. Rows masked away entirely are omitted.
    pub fn apply_mask(&self, mask: &Geometries, how: MaskMode) -> Result<Vec<(usize, MultiPolygon<f64>)>> {
        if mask.is_empty() {
            bail!(InterpError::InvalidOption { name: "mask", reason: "mask has no geometries".into() })
        }
        let mask = mask.union();

        Ok(self.shapes().iter().enumerate()
            .map(|(i, shape)| match how {
                MaskMode::Clip => (i, shape.intersection(&mask)),
                MaskMode::Difference => (i, shape.difference(&mask)),
            })
            .filter(|(_, shape)| shape.unsigned_area() > 0.0)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
        ]])
    }

    #[test]
    fn parse_modes() {
        assert_eq!("clip".parse::<MaskMode>().unwrap(), MaskMode::Clip);
        assert_eq!("difference".parse::<MaskMode>().unwrap(), MaskMode::Difference);
        assert!(matches!("erase".parse::<MaskMode>(), Err(InterpError::Unsupported { .. })));
    }

    #[test]
    fn clip_and_difference_partition_each_target() {
        let targets = Geometries::new(vec![rect(0.0, 0.0, 2.0, 1.0), rect(5.0, 0.0, 6.0, 1.0)], None);
        let mask = Geometries::new(vec![rect(1.0, -1.0, 3.0, 2.0)], None);

        let clipped = targets.apply_mask(&mask, MaskMode::Clip).unwrap();
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].0, 0);
        assert!((clipped[0].1.unsigned_area() - 1.0).abs() < 1e-12);

        let outside = targets.apply_mask(&mask, MaskMode::Difference).unwrap();
        assert_eq!(outside.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
        assert!((outside[0].1.unsigned_area() - 1.0).abs() < 1e-12);
        assert!((outside[1].1.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let targets = Geometries::new(vec![rect(0.0, 0.0, 1.0, 1.0)], None);
        assert!(targets.apply_mask(&Geometries::new(vec![], None), MaskMode::Clip).is_err());
    }
}
