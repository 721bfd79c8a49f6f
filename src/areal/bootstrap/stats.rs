use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InterpError;

/// Linear-interpolated percentile of sorted values (`q` in [0, 100]).
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let (lo, hi) = (pos.floor() as usize, pos.ceil() as usize);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (ddof 0).
fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Point estimate computed from a resample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Average {
    #[default]
    Mean,
    Median,
    /// Most frequent value; the smallest one on ties.
    Mode,
}

impl Average {
    pub fn to_str(&self) -> &'static str {
        match self {
            Average::Mean => "mean",
            Average::Median => "median",
            Average::Mode => "mode",
        }
    }

    /// Reduce a non-empty, ascending-sorted resample.
    pub fn reduce(&self, sorted: &[f64]) -> f64 {
        debug_assert!(!sorted.is_empty());
        match self {
            Average::Mean => mean(sorted),
            Average::Median => percentile(sorted, 50.0),
            Average::Mode => {
                let (mut best, mut best_count) = (sorted[0], 0);
                for run in sorted.chunk_by(|a, b| a == b) {
                    // Strictly greater keeps the first (smallest) value on ties.
                    if run.len() > best_count {
                        (best, best_count) = (run[0], run.len());
                    }
                }
                best
            }
        }
    }
}

impl FromStr for Average {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Average::Mean),
            "median" => Ok(Average::Median),
            "mode" => Ok(Average::Mode),
            other => Err(InterpError::unsupported("average", other, "mean, median, mode")),
        }
    }
}

impl TryFrom<String> for Average {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// Uncertainty measure computed from a resample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Spread {
    #[default]
    Std,
    Iqr,
    Var,
    Range,
}

impl Spread {
    pub fn to_str(&self) -> &'static str {
        match self {
            Spread::Std => "std",
            Spread::Iqr => "iqr",
            Spread::Var => "var",
            Spread::Range => "range",
        }
    }

    /// Reduce a non-empty, ascending-sorted resample.
    pub fn reduce(&self, sorted: &[f64]) -> f64 {
        debug_assert!(!sorted.is_empty());
        match self {
            Spread::Std => variance(sorted).sqrt(),
            Spread::Var => variance(sorted),
            Spread::Iqr => percentile(sorted, 75.0) - percentile(sorted, 25.0),
            Spread::Range => sorted[sorted.len() - 1] - sorted[0],
        }
    }
}

impl FromStr for Spread {
    type Err = InterpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "std" => Ok(Spread::Std),
            "iqr" => Ok(Spread::Iqr),
            "var" => Ok(Spread::Var),
            "range" => Ok(Spread::Range),
            other => Err(InterpError::unsupported("spread", other, "std, iqr, var, range")),
        }
    }
}

impl TryFrom<String> for Spread {
    type Error = InterpError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}
