mod kernel;
mod stats;

use anyhow::{bail, ensure, Result};
use geo::Point;
use rand::{distr::{weighted::WeightedIndex, Distribution}, rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    cancel::Cancellation,
    error::{InterpError, Side},
    frame::{Estimates, GeoFrame},
    geom::SampleMethod,
    variable::Variable,
};

pub use kernel::{Bandwidth, Kernel, Metric};
pub use stats::{Average, Spread};

/// Options for the kernel-weighted geobootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapOptions {
    /// Number of draws per target; defaults to the number of targets.
    pub resamples: Option<usize>,
    pub kernel: Kernel,
    pub metric: Metric,
    pub bandwidth: Bandwidth,
    pub average: Average,
    pub spread: Spread,
    /// Seed for reproducible draws; drawn from the OS when absent.
    pub seed: Option<u64>,
    /// How polygons are reduced to points.
    pub points: SampleMethod,
    pub points_per_polygon: usize,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            resamples: None,
            kernel: Kernel::default(),
            metric: Metric::default(),
            bandwidth: Bandwidth::default(),
            average: Average::default(),
            spread: Spread::default(),
            seed: None,
            points: SampleMethod::default(),
            points_per_polygon: 1,
        }
    }
}

impl BootstrapOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.resamples != Some(0), InterpError::InvalidOption {
            name: "resamples",
            reason: "at least one resample is required".into(),
        });
        ensure!(self.points_per_polygon > 0, InterpError::InvalidOption {
            name: "points_per_polygon",
            reason: "at least one point per polygon is required".into(),
        });
        if let SampleMethod::Uniform { max_attempts: 0 } = self.points {
            bail!(InterpError::InvalidOption { name: "points", reason: "uniform sampling needs at least one attempt".into() })
        }
        self.bandwidth.validate()?;
        Ok(())
    }

    /// Name of the uncertainty column for a variable.
    #[inline]
    pub fn spread_column(&self, variable: &str) -> String {
        format!("{variable}_{}", self.spread.to_str())
    }
}

/// Mix a base seed with a stream index (splitmix64 finaliser), so that every
/// target gets an independent, schedule-free random stream.
fn stream_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Point estimate and spread of one target's resample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resample {
    pub estimate: f64,
    pub spread: f64,
}

/// Kernel-weighted resampling with replacement of source values around target points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelBootstrap {
    pub kernel: Kernel,
    pub metric: Metric,
    pub bandwidth: Bandwidth,
    pub average: Average,
    pub spread: Spread,
}

impl From<&BootstrapOptions> for KernelBootstrap {
    fn from(options: &BootstrapOptions) -> Self {
        Self {
            kernel: options.kernel,
            metric: options.metric,
            bandwidth: options.bandwidth,
            average: options.average,
            spread: options.spread,
        }
    }
}

impl KernelBootstrap {
    /// Sampling weight of every source point as seen from `target`.
    pub fn weights(&self, target: Point<f64>, sources: &[Point<f64>]) -> Vec<f64> {
        let distances = sources.iter().map(|&s| self.metric.distance(target, s)).collect::<Vec<_>>();
        let h = self.bandwidth.resolve(&distances);
        distances.into_iter().map(|d| self.kernel.weight(d, h)).collect()
    }

    /// Draw `r` values with replacement, with probability proportional to `weights`.
    /// Returns `None` when no source carries any weight.
    pub fn draw(&self, values: &[f64], weights: &[f64], r: usize, rng: &mut impl Rng) -> Option<Vec<f64>> {
        let index = WeightedIndex::new(weights).ok()?;
        Some((0..r).map(|_| values[index.sample(rng)]).collect())
    }

    /// Resample around every target in parallel.
    ///
    /// Target `i` draws from its own RNG seeded from `(seed, i)`, so results do
    /// not depend on thread scheduling. Targets with no weighted source get `None`.
    pub fn resample(
        &self,
        sources: &[(Point<f64>, f64)],
        targets: &[Point<f64>],
        r: usize,
        seed: u64,
        cancel: &Cancellation,
    ) -> Result<Vec<Option<Resample>>> {
        let (points, values): (Vec<Point<f64>>, Vec<f64>) = sources.iter().copied().unzip();

        targets.par_iter().enumerate()
            .map(|(i, &target)| {
                cancel.check()?;
                let weights = self.weights(target, &points);
                let mut rng = StdRng::seed_from_u64(stream_seed(seed, i as u64));
                let Some(mut draws) = self.draw(&values, &weights, r, &mut rng) else { return Ok(None) };

                draws.sort_by(f64::total_cmp);
                Ok(Some(Resample { estimate: self.average.reduce(&draws), spread: self.spread.reduce(&draws) }))
            })
            .collect()
    }
}

/// Interpolate an intensive variable by kernel-weighted bootstrap resampling.
///
/// Sources and targets are reduced to representative points; each target then
/// resamples source values with probabilities given by the distance kernel. The
/// estimates carry an uncertainty column named `<variable>_<spread>`.
pub fn geobootstrap(
    sources: &GeoFrame,
    targets: &GeoFrame,
    tid: &str,
    variable: &Variable,
    options: &BootstrapOptions,
    cancel: &Cancellation,
) -> Result<Estimates> {
    let column = variable.name();
    if variable.is_extensive() {
        bail!(InterpError::ExtensiveResampling(column.to_string()))
    }
    options.validate()?;

    let spread_column = options.spread_column(column);
    for name in [column, spread_column.as_str()] {
        if targets.has_column(name) {
            bail!(InterpError::VariableCollision { column: name.to_string() })
        }
    }

    let values = sources.column_f64(column, Side::Sources)?;
    let target_ids = targets.ids(tid, Side::Targets)?;

    let r = options.resamples.unwrap_or_else(|| {
        info!("using the number of targets ({}) as the number of resamples", targets.len());
        targets.len()
    });
    let seed = options.seed.unwrap_or_else(|| rand::rng().random());

    // Point sampling gets its own stream, disjoint from the per-target streams.
    let mut rng = StdRng::seed_from_u64(stream_seed(seed, u64::MAX));
    let source_points = sources.geoms().sample_points(options.points, options.points_per_polygon, Side::Sources, &mut rng)?;
    let target_points = targets.geoms().sample_points(options.points, 1, Side::Targets, &mut rng)?
        .into_iter().map(|p| p.point).collect::<Vec<_>>();

    // Null source values are left out of the resampling pool.
    let pool = source_points.iter()
        .filter_map(|p| values[p.owner].map(|value| (p.point, value)))
        .collect::<Vec<_>>();
    debug!("resampling {r} draws for {} targets from {} source points", target_points.len(), pool.len());

    let resamples = KernelBootstrap::from(options).resample(&pool, &target_points, r, seed, cancel)?;

    let mut ids = Vec::new();
    let mut estimates = Vec::new();
    let mut spreads = Vec::new();
    for (id, resample) in target_ids.into_iter().zip(resamples) {
        let Some(resample) = resample else { continue };
        ids.push(id);
        estimates.push(resample.estimate);
        spreads.push(resample.spread);
    }

    Ok(Estimates::new(tid, column, ids, estimates).with_spread(spread_column, spreads))
}
