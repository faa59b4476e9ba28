//! Error types for visualization

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColormapError {
    #[error("invalid visualization parameters: {0}")]
    InvalidVisParams(String),

    #[error("invalid colour '{0}': expected #rrggbb, rrggbb or a colour name")]
    InvalidColor(String),

    #[error("unknown colour scheme '{0}'")]
    UnknownScheme(String),

    #[error("no layer named '{0}'")]
    UnknownLayer(String),

    #[error(transparent)]
    Core(#[from] ardhi_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ColormapError>;
