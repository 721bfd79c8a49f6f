use ahash::AHashSet;
use anyhow::{bail, Result};
use polars::prelude::*;
use tracing::debug;
use uuid::Uuid;

use crate::{error::{InterpError, Side}, frame::GeoFrame};

/// Resolve the identifier column of a collection.
///
/// With a column name, the column must exist and hold unique, non-null values.
/// Without one, a column of random UUIDs is added under `sid` (sources) or
/// `tid` (other sides), suffixed if that name is already taken so that no
/// caller column is overwritten.
pub fn resolve_uid(frame: GeoFrame, uid: Option<&str>, side: Side) -> Result<(GeoFrame, String)> {
    if let Some(column) = uid {
        let mut seen = AHashSet::with_capacity(frame.len());
        for value in frame.column_str(column, side)? {
            let Some(value) = value else {
                bail!(InterpError::NullIdentifier { side, column: column.to_string() })
            };
            if !seen.insert(value.clone()) {
                bail!(InterpError::NonUniqueIdentifier { side, column: column.to_string(), value })
            }
        }
        return Ok((frame, column.to_string()))
    }

    let base = if side == Side::Sources { "sid" } else { "tid" };
    let mut column = base.to_string();
    let mut suffix = 0;
    while frame.has_column(&column) {
        suffix += 1;
        column = format!("{base}_{suffix}");
    }

    let ids = (0..frame.len()).map(|_| Uuid::new_v4().to_string()).collect::<Vec<_>>();
    debug!("synthesised {} identifiers for {side} in column {column:?}", ids.len());

    let frame = frame.with_column(Column::new(column.as_str().into(), ids))?;
    Ok((frame, column))
}
