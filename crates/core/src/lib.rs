//! # Ardhi Core
//!
//! Data model and I/O for the ardhi land-cover toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid with nodata-based validity
//! - `Image` / `ImageCollection`: named bands on a shared grid, plus properties
//! - `Feature` / `FeatureCollection`: boundaries and labelled ground points
//! - `CRS` and `GeoTransform` for georeferencing
//! - GeoTIFF and GeoJSON I/O and directory-backed stores

pub mod crs;
pub mod error;
pub mod image;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use image::{Band, Image, ImageCollection, TIME_START};
pub use raster::{GeoTransform, Raster, RasterElement, RasterStatistics};
pub use vector::{AttributeValue, Feature, FeatureCollection, Properties};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::image::{Image, ImageCollection};
    pub use crate::io::{ExportSink, FeatureStore, ImageStore, LocalStore};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection};
}
