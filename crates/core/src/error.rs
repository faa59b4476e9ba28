//! Error types for ardhi

use thiserror::Error;

/// Main error type for ardhi operations.
///
/// The first five variants are the pipeline failures callers are expected to
/// branch on; none of them is ever coerced into an empty or zero result.
#[derive(Error, Debug)]
pub enum Error {
    #[error("region '{0}' resolved to an empty geometry")]
    EmptyRegion(String),

    #[error("image collection is empty after {stage}")]
    EmptyCollection { stage: String },

    #[error("band '{band}' not found in image '{image}'")]
    MissingBand { band: String, image: String },

    #[error(
        "region requires {required} samples, above the cap of {cap}; coarsen the grid or split the region"
    )]
    SampleCapExceeded { required: u64, cap: u64 },

    #[error("insufficient training data: {0}")]
    TrainingDataInsufficient(String),

    #[error("property '{property}' missing on {owner}")]
    MissingProperty { property: String, owner: String },

    #[error("band '{0}' already exists in image")]
    DuplicateBand(String),

    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::MissingBand`].
    pub fn missing_band(band: impl Into<String>, image: impl Into<String>) -> Self {
        Error::MissingBand {
            band: band.into(),
            image: image.into(),
        }
    }

    /// Shorthand for [`Error::EmptyCollection`].
    pub fn empty_collection(stage: impl Into<String>) -> Self {
        Error::EmptyCollection {
            stage: stage.into(),
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for ardhi operations
pub type Result<T> = std::result::Result<T, Error>;
