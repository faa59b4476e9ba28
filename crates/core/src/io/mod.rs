//! Reading and writing rasters, feature collections and local stores

mod features;
mod native;
pub mod store;

pub use features::{features_to_geojson, parse_features, read_features, write_features};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_class_geotiff, write_geotiff,
    write_geotiff_to_buffer, write_rgba_tiff,
};
pub use store::{Catalog, CatalogEntry, ExportSink, FeatureStore, ImageStore, LocalStore};
