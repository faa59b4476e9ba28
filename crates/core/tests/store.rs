//! Round trips through the directory-backed store

use ardhi_core::io::{ExportSink, FeatureStore, ImageStore, LocalStore};
use ardhi_core::vector::{AttributeValue, Feature, FeatureCollection};
use ardhi_core::{Error, GeoTransform, Image, Raster, CRS};
use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use geo_types::{Geometry, Point};

fn band(seed: f64) -> Raster<f64> {
    let data: Vec<f64> = (0..12).map(|i| seed + i as f64 * 0.01).collect();
    let mut r = Raster::from_vec(data, 3, 4)
        .unwrap()
        .with_transform(GeoTransform::new(250_000.0, 9_880_000.0, 10.0, -10.0));
    r.set_crs(Some(CRS::utm37s()));
    r
}

fn acquisition() -> Image {
    Image::new("20190214T074001_20190214T075605_T37MBU")
        .with_band("B4", band(0.05))
        .unwrap()
        .with_band("B8", band(0.30))
        .unwrap()
        .with_property("CLOUDY_PIXEL_PERCENTAGE", 12.5)
        .with_property("time_start", Utc.with_ymd_and_hms(2019, 2, 14, 7, 40, 1).unwrap())
}

#[test]
fn exported_image_loads_back_as_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());

    let image = acquisition();
    store.export_image(&image, "s2_kileleshwa").unwrap();

    let collection = store.collection("s2_kileleshwa").unwrap();
    assert_eq!(collection.len(), 1);
    let back = &collection.images()[0];
    assert_eq!(back.id(), image.id());
    assert_eq!(back.band_names(), vec!["B4", "B8"]);
    assert_eq!(back.time_start(), image.time_start());
    assert_eq!(
        back.property("CLOUDY_PIXEL_PERCENTAGE").and_then(AttributeValue::as_f64),
        Some(12.5)
    );
    assert_relative_eq!(back.band("B8").unwrap().get(2, 3).unwrap(), 0.41, epsilon = 1e-12);
    assert_eq!(back.crs().and_then(CRS::epsg), Some(32737));
}

#[test]
fn exported_features_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());

    let mut gcps = FeatureCollection::new();
    gcps.push(Feature::new(Geometry::Point(Point::new(36.78, -1.27))).with_property("landcover", 3));
    gcps.push(Feature::new(Geometry::Point(Point::new(36.78, -1.27))).with_property("landcover", 0));
    store.export_features(&gcps, "gcps").unwrap();

    let back = store.features("gcps").unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.distinct("landcover").len(), 2);
}

#[test]
fn missing_collection_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    assert!(matches!(store.collection("nope"), Err(Error::Other(_))));
    assert!(store.features("nope").is_err());
}
