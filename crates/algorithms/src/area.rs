//! Per-class area aggregation of classified rasters
//!
//! Pixel areas come from [`pixel_area`]: planar for projected grids,
//! spherical-zone areas for geographic (lon/lat) grids, where a pixel's
//! ground area shrinks with latitude. Aggregations are restricted to a
//! region and guarded by a pixel cap that fails loudly instead of
//! downsampling.

use crate::maybe_rayon::*;
use crate::region::Region;
use ardhi_core::raster::{Raster, RasterElement};
use ardhi_core::vector::{Feature, FeatureCollection};
use ardhi_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Mean Earth radius (m) used for geographic pixel areas
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Unit of reported areas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMeters,
    #[default]
    Hectares,
    SquareKilometers,
}

impl AreaUnit {
    pub fn from_square_meters(self, m2: f64) -> f64 {
        match self {
            AreaUnit::SquareMeters => m2,
            AreaUnit::Hectares => m2 / 1.0e4,
            AreaUnit::SquareKilometers => m2 / 1.0e6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AreaUnit::SquareMeters => "m2",
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareKilometers => "km2",
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for AreaUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m2" | "square_meters" => Ok(AreaUnit::SquareMeters),
            "ha" | "hectares" => Ok(AreaUnit::Hectares),
            "km2" | "square_kilometers" => Ok(AreaUnit::SquareKilometers),
            _ => Err(Error::InvalidParameter {
                name: "unit",
                value: s.to_string(),
                reason: "expected m2, ha or km2".into(),
            }),
        }
    }
}

/// Parameters for [`area_by_class`] and [`class_area`]
#[derive(Debug, Clone)]
pub struct AreaParams {
    /// Upper bound on pixels the region's bounding window may span
    pub max_pixels: u64,
    pub unit: AreaUnit,
}

impl Default for AreaParams {
    fn default() -> Self {
        Self {
            max_pixels: 10_000_000_000,
            unit: AreaUnit::Hectares,
        }
    }
}

/// Area of every pixel of `grid` in square metres.
///
/// Geographic grids use the area of the spherical zone between the pixel's
/// edge latitudes; other grids use `|pixel_width * pixel_height|`.
pub fn pixel_area<T: RasterElement>(grid: &Raster<T>) -> Result<Raster<f64>> {
    let (rows, cols) = grid.shape();
    let gt = *grid.transform();
    let geographic = grid.crs().is_some_and(|c| c.is_geographic());

    let data: Vec<f64> = if geographic {
        let d_lon = gt.pixel_width.abs().to_radians();
        (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let (_, lat_top) = gt.pixel_to_geo_corner(0, row);
                let (_, lat_bottom) = gt.pixel_to_geo_corner(0, row + 1);
                let band = (lat_top.to_radians().sin() - lat_bottom.to_radians().sin()).abs();
                vec![EARTH_RADIUS_M * EARTH_RADIUS_M * d_lon * band; cols]
            })
            .collect()
    } else {
        vec![(gt.pixel_width * gt.pixel_height).abs(); rows * cols]
    };

    grid.with_data(data, None)
}

/// Check the region's bounding window against the pixel cap
fn check_cap<T: RasterElement>(grid: &Raster<T>, region: &Region, max_pixels: u64) -> Result<()> {
    let (rows, cols) = grid.shape();
    let required = region
        .bounding_rect()
        .and_then(|r| {
            grid.transform()
                .window((r.min().x, r.min().y, r.max().x, r.max().y), rows, cols)
        })
        .map_or(0, |(r0, c0, r1, c1)| ((r1 - r0) * (c1 - c0)) as u64);
    if required > max_pixels {
        return Err(Error::SampleCapExceeded {
            required,
            cap: max_pixels,
        });
    }
    Ok(())
}

/// Valid (class, area m2) pairs of the region's pixels, in pixel order
fn region_cells(
    classified: &Raster<i32>,
    pixel_area: &Raster<f64>,
    region: &Region,
    params: &AreaParams,
) -> Result<Vec<(i32, f64)>> {
    region.require_non_empty()?;
    classified.ensure_same_grid(pixel_area)?;
    check_cap(classified, region, params.max_pixels)?;

    Ok(region
        .pixels(classified)
        .into_iter()
        .filter_map(|(row, col)| {
            let class = classified.valid_value(row, col)?;
            let area = pixel_area.valid_value(row, col)?;
            Some((class, area))
        })
        .collect())
}

/// Summed area per class value inside `region`, in one pass keyed on the
/// class value. Classes are reported under their own integer value.
pub fn area_by_class(
    classified: &Raster<i32>,
    pixel_area: &Raster<f64>,
    region: &Region,
    params: &AreaParams,
) -> Result<BTreeMap<i32, f64>> {
    let cells = region_cells(classified, pixel_area, region, params)?;
    let mut sums: BTreeMap<i32, f64> = BTreeMap::new();
    for (class, area) in &cells {
        *sums.entry(*class).or_insert(0.0) += area;
    }
    for v in sums.values_mut() {
        *v = params.unit.from_square_meters(*v);
    }
    debug!(region = region.label(), pixels = cells.len(), classes = sums.len(), "aggregated area by class");
    Ok(sums)
}

/// Area of a single class inside `region`
pub fn class_area(
    classified: &Raster<i32>,
    pixel_area: &Raster<f64>,
    region: &Region,
    class: i32,
    params: &AreaParams,
) -> Result<f64> {
    let cells = region_cells(classified, pixel_area, region, params)?;
    let m2 = cells
        .iter()
        .filter(|(c, _)| *c == class)
        .fold(0.0, |acc, (_, a)| acc + a);
    Ok(params.unit.from_square_meters(m2))
}

/// Area table as geometry-less features with `class`, `area` and `unit`
pub fn area_table(areas: &BTreeMap<i32, f64>, unit: AreaUnit) -> FeatureCollection {
    areas
        .iter()
        .map(|(class, area)| {
            Feature::table_row()
                .with_property("class", *class)
                .with_property("area", *area)
                .with_property("unit", unit.symbol())
        })
        .collect()
}
