//! # Ardhi Algorithms
//!
//! Pipeline stages for land-cover mapping from optical imagery.
//!
//! ## Stages
//!
//! - **region**: Resolve boundary features into a region, clip images
//! - **filter**: Date, bounds and property filters over collections
//! - **cloud_mask**: Link cloud-score images and mask low-quality pixels
//! - **composite**: Per-pixel median and first-valid mosaic
//! - **imagery**: Normalized-difference indices and change detection
//! - **sampling**: Band values at labelled features
//! - **classification**: Random forest training and prediction
//! - **accuracy**: Train/validation split and confusion matrices
//! - **area**: Pixel areas and per-class area inside a region
//! - **timeseries**: Region means over a collection
//! - **statistics**: Zonal statistics

pub mod accuracy;
pub mod area;
pub mod classification;
pub mod cloud_mask;
pub mod composite;
pub mod filter;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod region;
pub mod sampling;
pub mod statistics;
pub mod timeseries;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::accuracy::{evaluate, split, ConfusionMatrix, SplitParams, PREDICTION_COLUMN};
    pub use crate::area::{
        area_by_class, area_table, class_area, pixel_area, AreaParams, AreaUnit,
    };
    pub use crate::classification::{ForestParams, RandomForest};
    pub use crate::cloud_mask::{link_collection, mask_collection, mask_low_quality, CloudMaskParams};
    pub use crate::composite::{composite, median_composite, mosaic, CompositeMethod, CompositeParams};
    pub use crate::filter::{filter_collection, Comparison, Filter};
    pub use crate::imagery::{
        add_index, add_normalized_difference, index_difference, nbr, ndvi, ndwi,
        normalized_difference, threshold_mask, SpectralIndex, DEFAULT_BURN_THRESHOLD,
    };
    pub use crate::region::{clip, resolve_region, Region};
    pub use crate::sampling::{sample_regions, SampleRow, SampleTable};
    pub use crate::statistics::{zonal_statistics, zonal_table, ZonalResult};
    pub use crate::timeseries::{region_mean_series, SeriesPoint};
    pub use ardhi_core::prelude::*;
}
