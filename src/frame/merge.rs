use ahash::AHashMap;
use anyhow::{ensure, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{error::Side, frame::GeoFrame};

/// Which target rows survive when estimates are merged back onto targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Only targets that received an estimate.
    #[default]
    Inner,
    /// Every target; those without an estimate get a null value.
    Outer,
}

impl JoinPolicy {
    /// Map the `all_geoms` flag onto a join policy.
    #[inline]
    pub fn from_all_geoms(all_geoms: bool) -> Self {
        if all_geoms { JoinPolicy::Outer } else { JoinPolicy::Inner }
    }
}

/// Per-target estimates keyed by target identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    id_column: String,
    column: String,
    ids: Vec<String>,
    values: Vec<f64>,
    spread: Option<(String, Vec<f64>)>, // Uncertainty column (name, values), bootstrap only
}

impl Estimates {
    pub fn new(id_column: impl Into<String>, column: impl Into<String>, ids: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(ids.len(), values.len());
        Self { id_column: id_column.into(), column: column.into(), ids, values, spread: None }
    }

    /// Attach an uncertainty column aligned with the estimates.
    pub fn with_spread(mut self, column: impl Into<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.values.len());
        self.spread = Some((column.into(), values));
        self
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn id_column(&self) -> &str { &self.id_column }

    #[inline] pub fn column(&self) -> &str { &self.column }

    #[inline] pub fn ids(&self) -> &[String] { &self.ids }

    #[inline] pub fn values(&self) -> &[f64] { &self.values }

    /// Name and values of the uncertainty column, if any.
    #[inline]
    pub fn spread(&self) -> Option<(&str, &[f64])> {
        self.spread.as_ref().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Sum of all estimates.
    #[inline] pub fn total(&self) -> f64 { self.values.iter().sum() }

    /// Multiply every estimate by a constant factor.
    pub(crate) fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// The bare identifier/estimate table, without geometries.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new(self.id_column.as_str().into(), &self.ids),
            Column::new(self.column.as_str().into(), &self.values),
        ];
        if let Some((name, values)) = &self.spread {
            columns.push(Column::new(name.as_str().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

impl GeoFrame {
    /// Join estimates onto this frame by identifier.
    ///
    /// Rows keep their original order. With [`JoinPolicy::Inner`] rows without an
    /// estimate are dropped; with [`JoinPolicy::Outer`] they are kept with nulls.
    pub fn merge(&self, estimates: &Estimates, how: JoinPolicy) -> Result<GeoFrame> {
        let lookup = estimates.ids().iter().enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect::<AHashMap<_, _>>();

        let matched = self.column_str(estimates.id_column(), Side::Targets)?.iter()
            .map(|id| id.as_deref().and_then(|id| lookup.get(id).copied()))
            .collect::<Vec<_>>();

        let unmatched = estimates.len() - matched.iter().flatten().count();
        ensure!(unmatched == 0, "{unmatched} estimates have no matching row in column {:?}", estimates.id_column());

        let rows = match how {
            JoinPolicy::Inner => (0..self.len()).filter(|&i| matched[i].is_some()).collect::<Vec<_>>(),
            JoinPolicy::Outer => (0..self.len()).collect::<Vec<_>>(),
        };

        let column = |values: &[f64]| rows.iter()
            .map(|&i| matched[i].map(|j| values[j]))
            .collect::<Vec<Option<f64>>>();

        let mut frame = self.select(&rows)?
            .with_column(Column::new(estimates.column().into(), column(estimates.values())))?;
        if let Some((name, values)) = estimates.spread() {
            frame = frame.with_column(Column::new(name.into(), column(values)))?;
        }

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn targets() -> GeoFrame {
        let squares = (0..3)
            .map(|i| {
                let x = i as f64;
                polygon![(x: x, y: 0.0), (x: x + 1.0, y: 0.0), (x: x + 1.0, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0)]
            })
            .collect();
        GeoFrame::from_polygons(squares, df!("tid" => ["a", "b", "c"]).unwrap(), Some(27700)).unwrap()
    }

    fn estimates() -> Estimates {
        Estimates::new("tid", "pop", vec!["c".into(), "a".into()], vec![3.0, 1.0])
    }

    #[test]
    fn inner_join_keeps_matched_rows_in_target_order() {
        let merged = targets().merge(&estimates(), JoinPolicy::Inner).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.column_str("tid", Side::Targets).unwrap(), vec![Some("a".into()), Some("c".into())]);
        assert_eq!(merged.column_f64("pop", Side::Targets).unwrap(), vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn outer_join_keeps_all_rows_with_nulls() {
        let merged = targets().merge(&estimates(), JoinPolicy::Outer).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.column_f64("pop", Side::Targets).unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn spread_column_is_merged() {
        let est = estimates().with_spread("pop_std", vec![0.3, 0.1]);
        let merged = targets().merge(&est, JoinPolicy::Outer).unwrap();
        assert_eq!(merged.column_f64("pop_std", Side::Targets).unwrap(), vec![Some(0.1), None, Some(0.3)]);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let est = Estimates::new("tid", "pop", vec!["z".into()], vec![1.0]);
        assert!(targets().merge(&est, JoinPolicy::Outer).is_err());
    }

    #[test]
    fn table_output() {
        let df = estimates().to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(JoinPolicy::from_all_geoms(true), JoinPolicy::Outer);
    }
}
