use std::fmt;

use thiserror::Error;

/// Which collection or table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Sources,
    Targets,
    Mask,
    Fit,    // Regression fitting table
    Predict, // Regression prediction table
}

impl Side {
    pub fn to_str(&self) -> &'static str {
        match self {
            Side::Sources => "sources",
            Side::Targets => "targets",
            Side::Mask => "mask",
            Side::Fit => "fitting table",
            Side::Predict => "prediction table",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.to_str()) }
}

/// Broad class of an [`InterpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    DataIntegrity,
    Model,
    Cancelled,
}

/// Root cause of every failure raised by the interpolation engine.
///
/// Public functions return `anyhow::Result`; match on the cause with
/// `err.downcast_ref::<InterpError>()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpError {
    #[error("areal interpolation requires either an extensive or an intensive variable")]
    MissingVariable,

    #[error("mixed interpolation of extensive {extensive:?} and intensive {intensive:?} is not supported")]
    MixedVariables { extensive: String, intensive: String },

    #[error("unsupported {kind} {value:?} (expected one of: {expected})")]
    Unsupported { kind: &'static str, value: String, expected: &'static str },

    #[error("intensive variable {0:?} only supports 'sum' weights")]
    IntensiveTotal(String),

    #[error("geobootstrap only supports intensive variables, {0:?} is extensive")]
    ExtensiveResampling(String),

    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("{side} must have a coordinate reference system")]
    MissingCrs { side: Side },

    #[error("coordinate reference systems differ (sources EPSG:{sources}, {side} EPSG:{found})")]
    CrsMismatch { side: Side, sources: u32, found: u32 },

    #[error("identifier column {column:?} on {side} is not unique (duplicate value {value:?})")]
    NonUniqueIdentifier { side: Side, column: String, value: String },

    #[error("identifier column {column:?} on {side} contains null values")]
    NullIdentifier { side: Side, column: String },

    #[error("column {column:?} not found on {side}")]
    MissingColumn { side: Side, column: String },

    #[error("{column:?} already exists on targets")]
    VariableCollision { column: String },

    #[error("{side} has {found} rows, expected {expected}")]
    RowMismatch { side: Side, expected: usize, found: usize },

    #[error("column {column:?} on {side} has a missing value at row {row}")]
    MissingValue { side: Side, column: String, row: usize },

    #[error("geometry {row} on {side} is empty or degenerate")]
    EmptyGeometry { side: Side, row: usize },

    #[error("invalid formula {formula:?}: {reason}")]
    Formula { formula: String, reason: String },

    #[error("design matrix for {formula:?} is singular")]
    SingularFit { formula: String },

    #[error("model for {formula:?} did not converge after {iterations} iterations")]
    NonConvergence { formula: String, iterations: usize },

    #[error("poisson response {column:?} has negative value {value} at row {row}")]
    NegativeResponse { column: String, row: usize, value: f64 },

    #[error("cannot rescale {column:?}: estimates sum to zero")]
    ZeroTotal { column: String },

    #[error("interpolation cancelled")]
    Cancelled,
}

impl InterpError {
    /// Classify the error into configuration, data integrity, model or cancellation failures.
    pub fn category(&self) -> ErrorCategory {
        use InterpError::*;
        match self {
            MissingVariable | MixedVariables { .. } | Unsupported { .. } | IntensiveTotal(_)
                | ExtensiveResampling(_) | InvalidOption { .. } => ErrorCategory::Configuration,
            MissingCrs { .. } | CrsMismatch { .. } | NonUniqueIdentifier { .. } | NullIdentifier { .. }
                | MissingColumn { .. } | VariableCollision { .. } | RowMismatch { .. }
                | MissingValue { .. } | EmptyGeometry { .. } => ErrorCategory::DataIntegrity,
            Formula { .. } | SingularFit { .. } | NonConvergence { .. } | NegativeResponse { .. }
                | ZeroTotal { .. } => ErrorCategory::Model,
            Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub(crate) fn unsupported(kind: &'static str, value: &str, expected: &'static str) -> Self {
        InterpError::Unsupported { kind, value: value.to_string(), expected }
    }

    pub(crate) fn missing_column(side: Side, column: &str) -> Self {
        InterpError::MissingColumn { side, column: column.to_string() }
    }
}
