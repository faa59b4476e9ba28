//! Statistics of raster samples inside vector zones

pub mod zonal;

pub use zonal::{zonal_statistics, zonal_table, ZonalResult};
