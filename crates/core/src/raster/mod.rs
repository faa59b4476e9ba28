//! Raster grids and georeferencing

mod element;
mod geotransform;
mod grid;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
