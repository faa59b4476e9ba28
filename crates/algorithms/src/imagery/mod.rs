//! Imagery analysis algorithms
//!
//! - Spectral indices: generic normalized difference, NDVI, NBR, NDWI
//! - Change detection: index differencing and threshold masks

mod change_detection;
mod indices;

pub use change_detection::{index_difference, threshold_mask, DEFAULT_BURN_THRESHOLD};
pub use indices::{
    add_index, add_normalized_difference, nbr, ndvi, ndwi, normalized_difference, SpectralIndex,
};
