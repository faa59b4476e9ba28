//! Vector features: boundaries, ground control points and attribute tables

use chrono::{DateTime, Utc};
use geo_types::Geometry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar attribute attached to a feature or an image.
///
/// Deserialises untagged, so RFC 3339 strings in catalogs become [`AttributeValue::Time`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Time(DateTime<Utc>),
    String(String),
}

impl AttributeValue {
    /// Numeric view (ints, floats and bools)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view; floats qualify only when they hold a whole number
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            AttributeValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Equality used by attribute filters: numbers compare numerically,
    /// everything else by its textual form.
    pub fn loosely_equals(&self, other: &AttributeValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            AttributeValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(t: DateTime<Utc>) -> Self {
        AttributeValue::Time(t)
    }
}

/// Ordered property map shared by features, images and sample rows
pub type Properties = BTreeMap<String, AttributeValue>;

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// `None` for table rows (e.g. an area-by-class table)
    pub geometry: Option<Geometry<f64>>,
    pub properties: Properties,
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: Properties::new(),
            id: None,
        }
    }

    /// A feature without geometry
    pub fn table_row() -> Self {
        Self {
            geometry: None,
            properties: Properties::new(),
            id: None,
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style [`Feature::set_property`]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Identifier used in error messages
    pub fn describe(&self) -> String {
        match &self.id {
            Some(id) => format!("feature '{}'", id),
            None => "feature".to_string(),
        }
    }
}

/// Ordered collection of features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Features whose `key` attribute equals `value`. Features without the
    /// attribute never match.
    pub fn filter_eq(&self, key: &str, value: &AttributeValue) -> FeatureCollection {
        self.features
            .iter()
            .filter(|f| f.get_property(key).is_some_and(|v| v.loosely_equals(value)))
            .cloned()
            .collect()
    }

    /// Features for which `predicate` holds, order preserved
    pub fn filter<P>(&self, predicate: P) -> FeatureCollection
    where
        P: Fn(&Feature) -> bool,
    {
        self.features.iter().filter(|f| predicate(f)).cloned().collect()
    }

    /// Concatenate two collections. Features at the same location are all kept.
    pub fn merge(&self, other: &FeatureCollection) -> FeatureCollection {
        let mut features = Vec::with_capacity(self.len() + other.len());
        features.extend(self.features.iter().cloned());
        features.extend(other.features.iter().cloned());
        FeatureCollection { features }
    }

    /// Add a uniform [0, 1) property drawn from a seeded generator, so the
    /// same seed always produces the same column.
    pub fn random_column(&self, name: &str, seed: u64) -> FeatureCollection {
        let mut rng = StdRng::seed_from_u64(seed);
        self.features
            .iter()
            .map(|f| f.clone().with_property(name, rng.gen::<f64>()))
            .collect()
    }

    /// Distinct values of a property, in first-seen order
    pub fn distinct(&self, key: &str) -> Vec<AttributeValue> {
        let mut out: Vec<AttributeValue> = Vec::new();
        for value in self.features.iter().filter_map(|f| f.get_property(key)) {
            if !out.iter().any(|v| v.loosely_equals(value)) {
                out.push(value.clone());
            }
        }
        out
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    fn point(x: f64, y: f64, landcover: i64) -> Feature {
        Feature::new(Geometry::Point(Point::new(x, y))).with_property("landcover", landcover)
    }

    #[test]
    fn test_filter_eq_matches_numbers_loosely() {
        let fc: FeatureCollection = vec![point(0.0, 0.0, 1), point(1.0, 1.0, 2)].into_iter().collect();
        assert_eq!(fc.filter_eq("landcover", &AttributeValue::Float(2.0)).len(), 1);
        assert!(fc.filter_eq("county", &"Kisii".into()).is_empty());
    }

    #[test]
    fn test_merge_keeps_duplicate_locations() {
        let a: FeatureCollection = vec![point(5.0, 5.0, 0)].into_iter().collect();
        let b: FeatureCollection = vec![point(5.0, 5.0, 3)].into_iter().collect();
        let merged = a.merge(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.distinct("landcover").len(), 2);
    }

    #[test]
    fn test_random_column_is_reproducible() {
        let fc: FeatureCollection = (0..20).map(|i| point(i as f64, 0.0, 0)).collect();
        let a = fc.random_column("random", 7);
        let b = fc.random_column("random", 7);
        assert_eq!(a, b);
        for f in a.iter() {
            let r = f.get_property("random").and_then(AttributeValue::as_f64).unwrap();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_attribute_json_roundtrip_time() {
        let v: AttributeValue = serde_json::from_str("\"2019-03-01T00:00:00Z\"").unwrap();
        assert!(v.as_time().is_some());
        let n: AttributeValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(n.as_f64(), Some(12.5));
        let i: AttributeValue = serde_json::from_str("3").unwrap();
        assert_eq!(i.as_i64(), Some(3));
    }
}
