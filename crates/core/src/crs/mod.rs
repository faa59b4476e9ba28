//! Coordinate reference system handling

use std::fmt;

/// EPSG codes of geographic (lat/lon degree) systems recognised without a WKT.
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4258, 4269, 4210];

/// Coordinate reference system of a raster grid.
///
/// Only what the pipeline needs is kept: an identifier for display and
/// comparison, and whether coordinates are in degrees (which changes how
/// per-pixel area is computed).
#[derive(Debug, Clone, PartialEq)]
pub struct CRS {
    epsg: Option<u32>,
    wkt: Option<String>,
    geographic: bool,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
            geographic: GEOGRAPHIC_EPSG.contains(&code),
        }
    }

    /// Create from WKT. A `GEOGCS`/`GEOGCRS` root marks it geographic.
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let head = wkt.trim_start().to_ascii_uppercase();
        let geographic = head.starts_with("GEOGCS") || head.starts_with("GEOGCRS");
        Self {
            epsg: None,
            wkt: Some(wkt),
            geographic,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// UTM zone 37 south on WGS84, the projected grid covering most of Kenya
    pub fn utm37s() -> Self {
        Self::from_epsg(32737)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    /// Two systems are equivalent when their EPSG codes (or WKT strings) agree
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => matches!((&self.wkt, &other.wkt), (Some(a), Some(b)) if a == b),
        }
    }

    pub fn identifier(&self) -> String {
        match (&self.epsg, &self.wkt) {
            (Some(code), _) => format!("EPSG:{}", code),
            (None, Some(wkt)) => format!("WKT:{}", wkt.chars().take(40).collect::<String>()),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_detection() {
        assert!(CRS::wgs84().is_geographic());
        assert!(!CRS::utm37s().is_geographic());
        assert!(CRS::from_wkt("GEOGCS[\"WGS 84\"]").is_geographic());
    }

    #[test]
    fn test_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::wgs84().is_equivalent(&CRS::utm37s()));
        assert_eq!(CRS::utm37s().identifier(), "EPSG:32737");
    }
}
