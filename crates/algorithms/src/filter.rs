//! Temporal, spatial and property filters over image collections
//!
//! Filters are conjoined and never mutate their input: every call returns a
//! new, order-preserving subset. An image lacking the property a filter
//! reads is excluded.

use crate::region::Region;
use ardhi_core::{AttributeValue, Image, ImageCollection};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Comparison applied by [`Filter::Property`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Comparison {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Gte => lhs >= rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

/// One collection predicate
#[derive(Debug, Clone)]
pub enum Filter {
    /// Acquisition time in `[start, end)`
    Date {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Image footprint intersects the region
    Bounds(Region),
    /// Numeric property compared against a threshold
    Property {
        name: String,
        op: Comparison,
        value: f64,
    },
}

impl Filter {
    pub fn date(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Filter::Date { start, end }
    }

    pub fn property(name: impl Into<String>, op: Comparison, value: f64) -> Self {
        Filter::Property {
            name: name.into(),
            op,
            value,
        }
    }

    /// Shorthand for `property < value`
    pub fn lt(name: impl Into<String>, value: f64) -> Self {
        Self::property(name, Comparison::Lt, value)
    }

    pub fn matches(&self, image: &Image) -> bool {
        match self {
            Filter::Date { start, end } => image
                .time_start()
                .is_some_and(|t| t >= *start && t < *end),
            Filter::Bounds(region) => image
                .footprint()
                .is_some_and(|rect| region.intersects_polygon(&rect.to_polygon())),
            Filter::Property { name, op, value } => image
                .property(name)
                .and_then(AttributeValue::as_f64)
                .is_some_and(|v| op.holds(v, *value)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Filter::Date { start, end } => format!("date [{}, {})", start.date_naive(), end.date_naive()),
            Filter::Bounds(region) => format!("bounds {}", region.label()),
            Filter::Property { name, op, value } => format!("{} {:?} {}", name, op, value),
        }
    }
}

/// Images matching every filter, in collection order
pub fn filter_collection(collection: &ImageCollection, filters: &[Filter]) -> ImageCollection {
    let mut current = collection.clone();
    for filter in filters {
        let before = current.len();
        current = current.retain_where(|img| filter.matches(img));
        debug!(filter = %filter.describe(), before, after = current.len(), "filtered collection");
    }
    current
}
