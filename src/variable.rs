use anyhow::{bail, Result};

use crate::error::InterpError;

/// The single variable being interpolated, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    /// A count-like quantity whose total must be conserved (e.g. population).
    Extensive(String),
    /// An area-independent quantity such as a rate or density.
    Intensive(String),
}

impl Variable {
    #[inline] pub fn extensive(column: impl Into<String>) -> Self { Variable::Extensive(column.into()) }

    #[inline] pub fn intensive(column: impl Into<String>) -> Self { Variable::Intensive(column.into()) }

    /// Build a variable from loose extensive/intensive flags.
    /// Exactly one of the two must be set.
    pub fn from_flags(extensive: Option<&str>, intensive: Option<&str>) -> Result<Self> {
        match (extensive, intensive) {
            (Some(ext), None) => Ok(Variable::extensive(ext)),
            (None, Some(int)) => Ok(Variable::intensive(int)),
            (Some(ext), Some(int)) => bail!(InterpError::MixedVariables {
                extensive: ext.to_string(),
                intensive: int.to_string(),
            }),
            (None, None) => bail!(InterpError::MissingVariable),
        }
    }

    /// Column name of the variable.
    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Variable::Extensive(name) | Variable::Intensive(name) => name,
        }
    }

    #[inline] pub fn is_extensive(&self) -> bool { matches!(self, Variable::Extensive(_)) }

    #[inline] pub fn is_intensive(&self) -> bool { matches!(self, Variable::Intensive(_)) }
}
