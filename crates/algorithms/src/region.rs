//! Regions of interest resolved from boundary collections
//!
//! A region is the union of the polygonal and point geometry of every
//! boundary feature matching an attribute lookup. Lookups that match nothing
//! give an empty region; operations that need a footprint (clip, area) call
//! [`Region::require_non_empty`] before touching any pixel.

use crate::maybe_rayon::*;
use ardhi_core::raster::{Raster, RasterElement};
use ardhi_core::vector::{AttributeValue, FeatureCollection};
use ardhi_core::{Error, Image, Result};
use geo::{BoundingRect, Contains, Geometry, Intersects, MultiPolygon, Point, Polygon, Rect};
use ndarray::Array2;
use tracing::{debug, warn};

/// Resolved region of interest
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    label: String,
    polygons: MultiPolygon<f64>,
    points: Vec<Point<f64>>,
}

impl Region {
    /// Region with no geometry
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            polygons: MultiPolygon::new(Vec::new()),
            points: Vec::new(),
        }
    }

    /// Region covering a single geometry
    pub fn from_geometry(label: impl Into<String>, geometry: &Geometry<f64>) -> Self {
        let mut region = Self::empty(label);
        region.absorb(geometry);
        region
    }

    pub(crate) fn absorb(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Polygon(p) => self.polygons.0.push(p.clone()),
            Geometry::MultiPolygon(mp) => self.polygons.0.extend(mp.0.iter().cloned()),
            Geometry::Rect(r) => self.polygons.0.push(r.to_polygon()),
            Geometry::Triangle(t) => self.polygons.0.push(t.to_polygon()),
            Geometry::Point(p) => self.points.push(*p),
            Geometry::MultiPoint(mp) => self.points.extend(mp.0.iter().copied()),
            Geometry::GeometryCollection(gc) => {
                for g in gc.iter() {
                    self.absorb(g);
                }
            }
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                warn!(region = %self.label, "ignoring linear geometry in region");
            }
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty() && self.points.is_empty()
    }

    /// [`Error::EmptyRegion`] for an empty region
    pub fn require_non_empty(&self) -> Result<&Self> {
        if self.is_empty() {
            return Err(Error::EmptyRegion(self.label.clone()));
        }
        Ok(self)
    }

    /// Bounding box over polygons and points
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        let mut rect = self.polygons.bounding_rect();
        for p in &self.points {
            let pr = Rect::new(p.0, p.0);
            rect = Some(match rect {
                Some(r) => Rect::new(
                    geo::coord! { x: r.min().x.min(pr.min().x), y: r.min().y.min(pr.min().y) },
                    geo::coord! { x: r.max().x.max(pr.max().x), y: r.max().y.max(pr.max().y) },
                ),
                None => pr,
            });
        }
        rect
    }

    /// Whether any part of the region touches `polygon`
    pub fn intersects_polygon(&self, polygon: &Polygon<f64>) -> bool {
        self.polygons.intersects(polygon) || self.points.iter().any(|p| polygon.intersects(p))
    }

    /// Whether a map position lies inside the polygonal part of the region
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        self.polygons.contains(&Point::new(x, y))
    }

    /// Pixels `(row, col)` of `grid` covered by the region: pixel centre
    /// inside a polygon, or the pixel containing a point. Sorted, no repeats.
    pub fn pixels<T: RasterElement>(&self, grid: &Raster<T>) -> Vec<(usize, usize)> {
        let (rows, cols) = grid.shape();
        let gt = *grid.transform();
        let mut hits: Vec<(usize, usize)> = Vec::new();

        if let Some(bbox) = self.polygons.bounding_rect() {
            let window = gt.window((bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y), rows, cols);
            if let Some((r0, c0, r1, c1)) = window {
                hits = (r0..r1)
                    .into_par_iter()
                    .flat_map(|row| {
                        let mut row_hits = Vec::new();
                        for col in c0..c1 {
                            let (x, y) = gt.pixel_to_geo(col, row);
                            if self.contains_xy(x, y) {
                                row_hits.push((row, col));
                            }
                        }
                        row_hits
                    })
                    .collect();
            }
        }

        hits.extend(
            self.points
                .iter()
                .filter_map(|p| gt.pixel_index(p.x(), p.y(), rows, cols)),
        );
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// [`Region::pixels`] as a boolean grid
    pub fn pixel_mask<T: RasterElement>(&self, grid: &Raster<T>) -> Array2<bool> {
        let mut mask = Array2::from_elem(grid.shape(), false);
        for idx in self.pixels(grid) {
            mask[idx] = true;
        }
        mask
    }
}

/// Resolve the boundary features whose `attribute` equals `value` into one
/// region. No match gives an empty region, not an error.
pub fn resolve_region(
    boundaries: &FeatureCollection,
    attribute: &str,
    value: &AttributeValue,
) -> Region {
    let matched = boundaries.filter_eq(attribute, value);
    let mut region = Region::empty(format!("{}={}", attribute, value));
    for geometry in matched.iter().filter_map(|f| f.geometry.as_ref()) {
        region.absorb(geometry);
    }
    debug!(
        region = %region.label,
        features = matched.len(),
        polygons = region.polygons.0.len(),
        points = region.points.len(),
        "resolved region"
    );
    region
}

/// Invalidate every sample of `image` outside `region`
pub fn clip(image: &Image, region: &Region) -> Result<Image> {
    region.require_non_empty()?;
    let template = image.template()?;
    let mask = region.pixel_mask(template);

    let mut out = image.clone();
    for band in out.bands_mut() {
        for (value, inside) in band.raster.data_mut().iter_mut().zip(mask.iter()) {
            if !inside {
                *value = f64::NAN;
            }
        }
    }
    Ok(out)
}
