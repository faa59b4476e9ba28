//! # Ardhi Colormap
//!
//! Visualization for ardhi images: validated visualization parameters,
//! palettes with multi-stop interpolation, RGBA rendering and an explicit
//! render context of named layers.
//!
//! ## Usage
//!
//! ```ignore
//! use ardhi_colormap::{render_image, VisParams};
//!
//! let vis = VisParams::palette("NDVI", -1.0, 1.0, &["red", "yellow", "green"]);
//! let rgba = render_image(&composite, &vis)?;
//! ```

mod context;
mod error;
mod render;
mod scheme;

pub use context::{Layer, RenderContext};
pub use error::{ColormapError, Result};
pub use render::{data_range, render_image, VisParams, TRANSPARENT};
pub use scheme::{ColorScheme, ColorStop, Palette, Rgb};
