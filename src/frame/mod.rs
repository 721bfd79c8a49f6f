mod crs;
mod frame;
mod merge;
mod uid;

pub use crs::{check_crs_exists, check_crs_match, CrsPolicy};
pub use frame::GeoFrame;
pub(crate) use frame::f64_column;
pub use merge::{Estimates, JoinPolicy};
pub use uid::resolve_uid;
