mod bbox;
mod geom;
mod mask;
mod overlay;
mod sample;

pub use geom::Geometries;
pub use mask::MaskMode;
pub use overlay::Fragment;
pub use sample::{SampleMethod, TaggedPoint};
