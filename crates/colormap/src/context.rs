//! Named render layers held in an explicit context value.

use crate::error::{ColormapError, Result};
use crate::render::{render_image, VisParams};
use ardhi_core::io::write_rgba_tiff;
use ardhi_core::{Image, CRS, GeoTransform};
use std::path::Path;
use tracing::debug;

/// One rendered image
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub vis: VisParams,
    pub rgba: Vec<u8>,
    pub shape: (usize, usize),
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub visible: bool,
}

/// Ordered set of layers plus an optional view centre `(x, y, zoom)`
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    layers: Vec<Layer>,
    center: Option<(f64, f64, u8)>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `image` with `vis` and append it. A layer with the same name
    /// is replaced in place.
    pub fn add_layer(&mut self, name: impl Into<String>, image: &Image, vis: &VisParams, visible: bool) -> Result<&Layer> {
        let name = name.into();
        let template = image.template()?;
        let layer = Layer {
            rgba: render_image(image, vis)?,
            shape: template.shape(),
            transform: *template.transform(),
            crs: template.crs().cloned(),
            vis: vis.clone(),
            visible,
            name: name.clone(),
        };
        debug!(layer = %name, rows = layer.shape.0, cols = layer.shape.1, "rendered layer");

        let idx = match self.layers.iter().position(|l| l.name == name) {
            Some(idx) => {
                self.layers[idx] = layer;
                idx
            }
            None => {
                self.layers.push(layer);
                self.layers.len() - 1
            }
        };
        Ok(&self.layers[idx])
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Result<&Layer> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ColormapError::UnknownLayer(name.to_string()))
    }

    pub fn center_on(&mut self, x: f64, y: f64, zoom: u8) {
        self.center = Some((x, y, zoom));
    }

    pub fn center(&self) -> Option<(f64, f64, u8)> {
        self.center
    }

    /// Write one layer as a georeferenced RGBA TIFF
    pub fn write_layer<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<()> {
        let layer = self.layer(name)?;
        write_rgba_tiff(&layer.rgba, layer.shape, &layer.transform, layer.crs.as_ref(), path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardhi_core::Raster;

    fn ndvi_image(value: f64) -> Image {
        let band = Raster::filled(3, 2, value).with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        Image::new("composite").with_band("NDVI", band).unwrap()
    }

    #[test]
    fn layers_are_named_and_replaced() {
        let vis = VisParams::palette("NDVI", -1.0, 1.0, &["red", "yellow", "green"]);
        let mut ctx = RenderContext::new();
        ctx.add_layer("ndvi", &ndvi_image(1.0), &vis, true).unwrap();
        ctx.add_layer("ndvi_dry", &ndvi_image(-1.0), &vis, false).unwrap();
        assert_eq!(ctx.layers().len(), 2);
        assert_eq!(&ctx.layer("ndvi").unwrap().rgba[0..4], &[0, 128, 0, 255]);

        ctx.add_layer("ndvi", &ndvi_image(-1.0), &vis, true).unwrap();
        assert_eq!(ctx.layers().len(), 2);
        assert_eq!(&ctx.layer("ndvi").unwrap().rgba[0..4], &[255, 0, 0, 255]);
        assert_eq!(ctx.layer("ndvi").unwrap().shape, (3, 2));
        assert!(matches!(ctx.layer("rgb"), Err(ColormapError::UnknownLayer(_))));
    }

    #[test]
    fn center_is_explicit_state() {
        let mut ctx = RenderContext::new();
        assert_eq!(ctx.center(), None);
        ctx.center_on(39.8, -3.6, 9);
        assert_eq!(ctx.center(), Some((39.8, -3.6, 9)));
    }
}
