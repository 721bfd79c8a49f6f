use anyhow::{ensure, Result};
use geo::{MultiPolygon, Polygon};
use polars::prelude::*;

use crate::{error::{InterpError, Side}, geom::Geometries};

/// A geometry collection: one polygon and one attribute row per entity,
/// sharing a single coordinate reference system.
#[derive(Debug, Clone)]
pub struct GeoFrame {
    geoms: Geometries,
    data: DataFrame, // Attribute rows, aligned with geoms (may have no columns)
}

impl GeoFrame {
    /// Construct a GeoFrame from MultiPolygons and an attribute table of matching height.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, data: DataFrame, epsg: Option<u32>) -> Result<Self> {
        ensure!(
            data.width() == 0 || data.height() == shapes.len(),
            "attribute table has {} rows but there are {} geometries",
            data.height(), shapes.len()
        );
        Ok(Self { geoms: Geometries::new(shapes, epsg), data })
    }

    /// Construct a GeoFrame from single-part Polygons.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>, data: DataFrame, epsg: Option<u32>) -> Result<Self> {
        Self::new(polygons.into_iter().map(|p| MultiPolygon::new(vec![p])).collect(), data, epsg)
    }

    /// Get the number of entities.
    #[inline] pub fn len(&self) -> usize { self.geoms.len() }

    /// Check if there are no entities.
    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    /// Get the EPSG code, if known.
    #[inline] pub fn epsg(&self) -> Option<u32> { self.geoms.epsg() }

    /// Get a reference to the indexed geometry store.
    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { self.geoms.shapes() }

    /// Get a reference to the attribute table.
    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    /// Check whether the attribute table has a column with this name.
    #[inline] pub fn has_column(&self, name: &str) -> bool { self.data.column(name).is_ok() }

    /// Replace the coordinate reference system, keeping geometries and attributes.
    pub fn with_epsg(self, epsg: Option<u32>) -> Self {
        let Self { geoms, data } = self;
        Self { geoms: Geometries::new(geoms.shapes().to_vec(), epsg), data }
    }

    /// Read a column as floats (nulls preserved).
    pub fn column_f64(&self, name: &str, side: Side) -> Result<Vec<Option<f64>>> {
        f64_column(&self.data, name, side)
    }

    /// Read a column as strings (nulls preserved).
    pub fn column_str(&self, name: &str, side: Side) -> Result<Vec<Option<String>>> {
        str_column(&self.data, name, side)
    }

    /// Read an identifier column; identifiers may not be null.
    pub fn ids(&self, column: &str, side: Side) -> Result<Vec<String>> {
        self.column_str(column, side)?.into_iter()
            .map(|id| id.ok_or_else(|| InterpError::NullIdentifier { side, column: column.to_string() }.into()))
            .collect()
    }

    /// Add (or replace) an attribute column.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        ensure!(
            column.len() == self.len(),
            "column {:?} has {} values but there are {} geometries",
            column.name().as_str(), column.len(), self.len()
        );
        self.data.with_column(column)?;
        Ok(self)
    }

    /// Build a new GeoFrame from the given rows, in the given order.
    pub(crate) fn select(&self, rows: &[usize]) -> Result<Self> {
        self.with_shapes(rows, rows.iter().map(|&i| self.geoms.shape(i).clone()).collect())
    }

    /// Build a new GeoFrame from the attributes of the given rows and replacement shapes.
    pub(crate) fn with_shapes(&self, rows: &[usize], shapes: Vec<MultiPolygon<f64>>) -> Result<Self> {
        debug_assert_eq!(rows.len(), shapes.len());
        let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
        let data = if self.data.width() == 0 { DataFrame::empty() } else { self.data.take(&idx)? };
        Self::new(shapes, data, self.epsg())
    }
}

/// Read a DataFrame column as floats, casting numeric and string columns as needed.
pub(crate) fn f64_column(df: &DataFrame, name: &str, side: Side) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .map_err(|_| InterpError::missing_column(side, name))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Read a DataFrame column as strings, casting non-string columns as needed.
pub(crate) fn str_column(df: &DataFrame, name: &str, side: Side) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .map_err(|_| InterpError::missing_column(side, name))?
        .cast(&DataType::String)?;
    Ok(column.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}
