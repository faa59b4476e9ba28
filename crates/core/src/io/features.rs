//! GeoJSON reading/writing for feature collections

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection, Properties};
use geojson::{feature::Id, GeoJson, JsonObject};
use std::fs;
use std::path::Path;

/// Read a GeoJSON file (FeatureCollection, Feature or bare Geometry)
pub fn read_features<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_features(&text)
}

/// Parse GeoJSON text into a feature collection
pub fn parse_features(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature::from(g)],
    };
    features.into_iter().map(convert_feature).collect()
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = match feature.geometry {
        Some(g) => Some(geo_types::Geometry::<f64>::try_from(g.value)?),
        None => None,
    };
    let mut properties = Properties::new();
    for (key, value) in feature.properties.unwrap_or_default() {
        // Nested objects and arrays are kept as their JSON text
        let attr = serde_json::from_value::<AttributeValue>(value.clone())
            .unwrap_or_else(|_| AttributeValue::String(value.to_string()));
        properties.insert(key, attr);
    }
    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });
    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

/// Serialise a feature collection to GeoJSON text.
///
/// Table rows without geometry are written with a `null` geometry.
pub fn features_to_geojson(features: &FeatureCollection) -> Result<String> {
    let mut out = Vec::with_capacity(features.len());
    for f in features.iter() {
        let mut properties = JsonObject::new();
        for (key, value) in &f.properties {
            properties.insert(key.clone(), serde_json::to_value(value)?);
        }
        out.push(geojson::Feature {
            bbox: None,
            geometry: f
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: f.id.clone().map(Id::String),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    let fc = geojson::FeatureCollection {
        bbox: None,
        features: out,
        foreign_members: None,
    };
    serde_json::to_string_pretty(&GeoJson::FeatureCollection(fc)).map_err(Error::from)
}

/// Write a feature collection as a GeoJSON file
pub fn write_features<P: AsRef<Path>>(features: &FeatureCollection, path: P) -> Result<()> {
    fs::write(path.as_ref(), features_to_geojson(features)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WARDS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]},
                "properties": {"ward": "Kileleshwa", "county": "Nairobi", "pop": 186204}
            },
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [1.5, 2.5]},
                "properties": {"landcover": 3}
            }
        ]
    }"#;

    #[test]
    fn test_parse_features() {
        let fc = parse_features(WARDS).unwrap();
        assert_eq!(fc.len(), 2);
        let ward = &fc.features[0];
        assert_eq!(ward.id.as_deref(), Some("7"));
        assert_eq!(ward.get_property("ward").and_then(|v| v.as_str()), Some("Kileleshwa"));
        assert!(matches!(ward.geometry, Some(geo_types::Geometry::Polygon(_))));
        assert_eq!(fc.features[1].get_property("landcover").and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn test_table_rows_serialise_with_null_geometry() {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::table_row().with_property("class", 2).with_property("area_ha", 14.5));
        let text = features_to_geojson(&fc).unwrap();
        let back = parse_features(&text).unwrap();
        assert!(back.features[0].geometry.is_none());
        assert_eq!(back.features[0].get_property("class").and_then(|v| v.as_i64()), Some(2));
    }
}
