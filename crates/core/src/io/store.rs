//! Named image and feature stores backed by a local directory
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<collection>/catalog.json   image catalog
//! <root>/<collection>/*.tif          one single-band GeoTIFF per image band
//! <root>/<features>.geojson          feature collections
//! ```

use crate::error::{Error, Result};
use crate::image::{Image, ImageCollection, TIME_START};
use crate::io::features::{read_features, write_features};
use crate::io::native::{read_geotiff, write_geotiff};
use crate::vector::{AttributeValue, FeatureCollection, Properties};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CATALOG_FILE: &str = "catalog.json";

/// Source of named image collections
pub trait ImageStore {
    fn collection(&self, name: &str) -> Result<ImageCollection>;
}

/// Source of named feature collections (boundaries, ground control points)
pub trait FeatureStore {
    fn features(&self, name: &str) -> Result<FeatureCollection>;
}

/// Destination for computed images and tables
pub trait ExportSink {
    fn export_image(&self, image: &Image, destination: &str) -> Result<PathBuf>;
    fn export_features(&self, features: &FeatureCollection, destination: &str) -> Result<PathBuf>;
}

/// On-disk catalog of one image collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub images: Vec<CatalogEntry>,
}

/// One image of a [`Catalog`]. Band paths are relative to the collection
/// directory; bands load in name order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: Properties,
    pub bands: BTreeMap<String, String>,
}

/// Directory-backed store implementing every store trait
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parsed catalog of a collection, without loading pixels
    pub fn catalog(&self, name: &str) -> Result<Catalog> {
        let path = self.root.join(name).join(CATALOG_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Other(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    fn load_entry(&self, dir: &Path, entry: &CatalogEntry) -> Result<Image> {
        let mut image = Image::new(entry.id.clone());
        for (band, file) in &entry.bands {
            let raster = read_geotiff::<f64, _>(dir.join(file))?;
            image.add_band(band.clone(), raster)?;
        }
        for (key, value) in &entry.properties {
            image.set_property(key.clone(), value.clone());
        }
        if let Some(t) = entry.time_start {
            image.set_property(TIME_START, t);
        }
        Ok(image)
    }
}

impl ImageStore for LocalStore {
    fn collection(&self, name: &str) -> Result<ImageCollection> {
        let catalog = self.catalog(name)?;
        let dir = self.root.join(name);
        let images = catalog
            .images
            .iter()
            .map(|entry| self.load_entry(&dir, entry))
            .collect::<Result<Vec<_>>>()?;
        debug!(collection = name, images = images.len(), "loaded image collection");
        Ok(ImageCollection::new(images))
    }
}

impl FeatureStore for LocalStore {
    fn features(&self, name: &str) -> Result<FeatureCollection> {
        let path = self.root.join(format!("{}.geojson", name));
        let features = read_features(&path)?;
        debug!(collection = name, features = features.len(), "loaded feature collection");
        Ok(features)
    }
}

fn band_file_name(band: &str) -> String {
    band.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>()
        + ".tif"
}

impl ExportSink for LocalStore {
    /// Writes `<root>/<destination>/` as a one-image collection that
    /// [`ImageStore::collection`] can load back.
    fn export_image(&self, image: &Image, destination: &str) -> Result<PathBuf> {
        let dir = self.root.join(destination);
        fs::create_dir_all(&dir)?;

        let mut bands = BTreeMap::new();
        for band in image.bands() {
            let file = band_file_name(&band.name);
            write_geotiff(&band.raster, dir.join(&file))?;
            bands.insert(band.name.clone(), file);
        }

        let mut properties = image.properties().clone();
        let time_start = properties
            .remove(TIME_START)
            .as_ref()
            .and_then(AttributeValue::as_time);
        let catalog = Catalog {
            images: vec![CatalogEntry {
                id: image.id().to_string(),
                time_start,
                properties,
                bands,
            }],
        };
        fs::write(dir.join(CATALOG_FILE), serde_json::to_string_pretty(&catalog)?)?;
        debug!(destination, bands = image.band_count(), "exported image");
        Ok(dir)
    }

    fn export_features(&self, features: &FeatureCollection, destination: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.geojson", destination));
        write_features(features, &path)?;
        debug!(destination, features = features.len(), "exported features");
        Ok(path)
    }
}
