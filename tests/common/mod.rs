// Shared fixtures for the integration tests: square grids with attribute tables.
#![allow(dead_code)]

use areal::GeoFrame;
use geo::{polygon, MultiPolygon};
use polars::prelude::*;

pub const EPSG: u32 = 27700;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1), (x: x0, y: y0),
    ]])
}

/// `n` x `n` grid of cells of side `size`, row-major from the origin.
pub fn grid(n: usize, size: f64) -> Vec<MultiPolygon<f64>> {
    (0..n * n)
        .map(|i| {
            let (x, y) = ((i % n) as f64 * size, (i / n) as f64 * size);
            rect(x, y, x + size, y + size)
        })
        .collect()
}

/// A 2x2 grid of 10 m sources with population counts and densities.
pub fn sources() -> GeoFrame {
    let data = df!(
        "zone" => ["a", "b", "c", "d"],
        "pop" => [100.0, 200.0, 300.0, 400.0],
        "density" => [1.0, 2.0, 3.0, 4.0],
    ).unwrap();
    GeoFrame::new(grid(2, 10.0), data, Some(EPSG)).unwrap()
}

/// A 4x4 grid of 5 m targets covering the same 20 m square.
pub fn targets() -> GeoFrame {
    let codes = (0..16).map(|i| format!("t{i:02}")).collect::<Vec<_>>();
    GeoFrame::new(grid(4, 5.0), df!("code" => codes).unwrap(), Some(EPSG)).unwrap()
}

pub fn total(frame: &GeoFrame, column: &str) -> f64 {
    frame.column_f64(column, areal::Side::Targets).unwrap().into_iter().flatten().sum()
}
