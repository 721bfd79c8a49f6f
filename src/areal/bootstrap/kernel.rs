use std::str::FromStr;

use geo::Point;
use serde::{Deserialize, Serialize};

use crate::error::InterpError;

/// Mean Earth radius in metres, used by the haversine metric.
const EARTH_RADIUS: f64 = 6_371_008.8;

/// Distance-decay function turning a distance into a sampling weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Kernel {
    #[default]
    Gaussian,
    Bisquare,
    Exponential,
    Triangular,
    Uniform,
}

impl Kernel {
    pub fn to_str(&self) -> &'static str {
        match self {
            Kernel::Gaussian => "gaussian",
            Kernel::Bisquare => "bisquare",
            Kernel::Exponential => "exponential",
            Kernel::Triangular => "triangular",
            Kernel::Uniform => "uniform",
        }
    }

    /// Weight of a point at `distance` under bandwidth `h`.
    /// Compact kernels are zero beyond the bandwidth.
    #[inline]
    pub fn weight(&self, distance: f64, h: f64) -> f64 {
        let u = distance / h;
        match self {
            Kernel::Gaussian => (-0.5 * u * u).exp(),
            Kernel::Exponential => (-u).exp(),
            Kernel::Bisquare => if u < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 },
            Kernel::Triangular => if u < 1.0 { 1.0 - u } else { 0.0 },
            Kernel::Uniform => if u <= 1.0 { 1.0 } else { 0.0 },
        }
    }
}

impl FromStr for Kernel {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaussian" => Ok(Kernel::Gaussian),
            "bisquare" => Ok(Kernel::Bisquare),
            "exponential" => Ok(Kernel::Exponential),
            "triangular" => Ok(Kernel::Triangular),
            "uniform" => Ok(Kernel::Uniform),
            other => Err(InterpError::unsupported("kernel", other, "gaussian, bisquare, exponential, triangular, uniform")),
        }
    }
}

impl TryFrom<String> for Kernel {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// How distances between points are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
    /// Great-circle distance in metres; coordinates are longitude/latitude degrees.
    Haversine,
}

impl Metric {
    pub fn to_str(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Haversine => "haversine",
        }
    }

    pub fn distance(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        match self {
            Metric::Euclidean => (a.x() - b.x()).hypot(a.y() - b.y()),
            Metric::Manhattan => (a.x() - b.x()).abs() + (a.y() - b.y()).abs(),
            Metric::Haversine => {
                let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
                let dlat = lat2 - lat1;
                let dlon = (b.x() - a.x()).to_radians();
                let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
                2.0 * EARTH_RADIUS * h.sqrt().min(1.0).asin()
            }
        }
    }
}

impl FromStr for Metric {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euclidean" => Ok(Metric::Euclidean),
            "manhattan" => Ok(Metric::Manhattan),
            "haversine" => Ok(Metric::Haversine),
            other => Err(InterpError::unsupported("distance metric", other, "euclidean, manhattan, haversine")),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// Kernel bandwidth: a fixed distance, or adaptive to the k-th nearest source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bandwidth {
    Fixed(f64),
    Adaptive(usize),
}

impl Default for Bandwidth {
    fn default() -> Self { Bandwidth::Fixed(1000.0) }
}

impl Bandwidth {
    pub(super) fn validate(&self) -> Result<(), InterpError> {
        match *self {
            Bandwidth::Fixed(h) if !(h.is_finite() && h > 0.0) => Err(InterpError::InvalidOption {
                name: "bandwidth",
                reason: format!("fixed bandwidth must be a positive distance, got {h}"),
            }),
            Bandwidth::Adaptive(0) => Err(InterpError::InvalidOption {
                name: "bandwidth",
                reason: "adaptive bandwidth needs at least one neighbour".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve the bandwidth for one target given its distances to every source.
    /// An adaptive `k` beyond the number of sources uses the farthest source.
    /// Coincident points give a zero distance, which is floored to keep `d / h` finite.
    pub(super) fn resolve(&self, distances: &[f64]) -> f64 {
        let h = match *self {
            Bandwidth::Fixed(h) => h,
            Bandwidth::Adaptive(k) => {
                let mut sorted = distances.to_vec();
                sorted.sort_by(f64::total_cmp);
                sorted.get(k.min(sorted.len()).saturating_sub(1)).copied().unwrap_or(0.0)
            }
        };
        h.max(f64::MIN_POSITIVE)
    }
}

#[cfg(test)]
mod tests {
    use geo::point;

    use super::*;

    #[test]
    fn kernels_decay_with_distance() {
        for kernel in [Kernel::Gaussian, Kernel::Bisquare, Kernel::Exponential, Kernel::Triangular] {
            assert_eq!(kernel.weight(0.0, 10.0), 1.0, "{}", kernel.to_str());
            assert!(kernel.weight(2.0, 10.0) > kernel.weight(5.0, 10.0), "{}", kernel.to_str());
        }
        assert_eq!(Kernel::Uniform.weight(10.0, 10.0), 1.0);
        assert_eq!(Kernel::Uniform.weight(10.5, 10.0), 0.0);
        assert_eq!(Kernel::Bisquare.weight(12.0, 10.0), 0.0);
        assert!((Kernel::Gaussian.weight(10.0, 10.0) - (-0.5_f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn metrics() {
        let (a, b) = (point!(x: 0.0, y: 0.0), point!(x: 3.0, y: 4.0));
        assert_eq!(Metric::Euclidean.distance(a, b), 5.0);
        assert_eq!(Metric::Manhattan.distance(a, b), 7.0);

        // One degree of longitude on the equator.
        let d = Metric::Haversine.distance(point!(x: 0.0, y: 0.0), point!(x: 1.0, y: 0.0));
        assert!((d - 111_195.0).abs() < 10.0);
    }

    #[test]
    fn parse_names() {
        assert_eq!("bisquare".parse::<Kernel>().unwrap(), Kernel::Bisquare);
        assert_eq!("haversine".parse::<Metric>().unwrap(), Metric::Haversine);
        assert!(matches!("epanechnikov".parse::<Kernel>(), Err(InterpError::Unsupported { kind: "kernel", .. })));
        assert!(matches!("chebyshev".parse::<Metric>(), Err(InterpError::Unsupported { kind: "distance metric", .. })));
    }

    #[test]
    fn adaptive_bandwidth_is_kth_nearest() {
        let distances = [5.0, 1.0, 3.0, 9.0];
        assert_eq!(Bandwidth::Adaptive(2).resolve(&distances), 3.0);
        assert_eq!(Bandwidth::Adaptive(10).resolve(&distances), 9.0);
        assert_eq!(Bandwidth::Fixed(250.0).resolve(&distances), 250.0);
        assert_eq!(Bandwidth::Adaptive(1).resolve(&[0.0]), f64::MIN_POSITIVE);
    }

    #[test]
    fn bandwidth_validation() {
        assert!(Bandwidth::Fixed(1000.0).validate().is_ok());
        assert!(Bandwidth::Adaptive(5).validate().is_ok());
        assert!(Bandwidth::Adaptive(0).validate().is_err());
        assert!(Bandwidth::Fixed(-1.0).validate().is_err());
        assert!(Bandwidth::Fixed(f64::NAN).validate().is_err());
    }
}
