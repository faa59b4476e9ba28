//! Affine georeferencing for raster grids

use geo_types::{coord, Rect};

/// North-up affine transform mapping pixel (col, row) to map (x, y).
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// `pixel_height` is negative for the usual north-up layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Map coordinates of the centre of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Map coordinates of the upper-left corner of pixel (col, row)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + col as f64 * self.pixel_width,
            self.origin_y + row as f64 * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates (col, row) of a map position.
    ///
    /// Returns NaN for a degenerate transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.pixel_width.abs() < 1e-12 || self.pixel_height.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Integer pixel containing a map position, if it lies on a `rows x cols` grid
    pub fn pixel_index(&self, x: f64, y: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (c, r) = self.geo_to_pixel(x, y);
        if !c.is_finite() || !r.is_finite() || c < 0.0 || r < 0.0 {
            return None;
        }
        let (col, row) = (c.floor() as usize, r.floor() as usize);
        (row < rows && col < cols).then_some((row, col))
    }

    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a `cols x rows` grid
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(cols, rows);
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Footprint of a `cols x rows` grid as a rectangle
    pub fn footprint(&self, cols: usize, rows: usize) -> Rect<f64> {
        let (min_x, min_y, max_x, max_y) = self.bounds(cols, rows);
        Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y })
    }

    /// Pixel window `(row_start, col_start, row_end, col_end)` (end exclusive)
    /// covering a map-space box, clamped to a `rows x cols` grid.
    ///
    /// `None` when the box misses the grid entirely.
    pub fn window(
        &self,
        bbox: (f64, f64, f64, f64),
        rows: usize,
        cols: usize,
    ) -> Option<(usize, usize, usize, usize)> {
        let (min_x, min_y, max_x, max_y) = bbox;
        let (c0, r0) = self.geo_to_pixel(min_x, max_y);
        let (c1, r1) = self.geo_to_pixel(max_x, min_y);
        let (c_lo, c_hi) = (c0.min(c1), c0.max(c1));
        let (r_lo, r_hi) = (r0.min(r1), r0.max(r1));
        if !(c_lo.is_finite() && c_hi.is_finite() && r_lo.is_finite() && r_hi.is_finite()) {
            return None;
        }
        let col_start = c_lo.floor().max(0.0) as usize;
        let row_start = r_lo.floor().max(0.0) as usize;
        let col_end = (c_hi.ceil().max(0.0) as usize).min(cols);
        let row_end = (r_hi.ceil().max(0.0) as usize).min(rows);
        if col_start >= col_end || row_start >= row_end {
            return None;
        }
        Some((row_start, col_start, row_end, col_end))
    }

    /// Whether two transforms describe the same pixel lattice
    pub fn same_lattice(&self, other: &GeoTransform) -> bool {
        const TOL: f64 = 1e-9;
        (self.origin_x - other.origin_x).abs() < TOL
            && (self.origin_y - other.origin_y).abs() < TOL
            && (self.pixel_width - other.pixel_width).abs() < TOL
            && (self.pixel_height - other.pixel_height).abs() < TOL
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_centre_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);
        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
        assert_eq!(gt.pixel_index(x, y, 20, 20), Some((10, 5)));
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);
        assert_relative_eq!(min_x, 0.0);
        assert_relative_eq!(min_y, 0.0);
        assert_relative_eq!(max_x, 100.0);
        assert_relative_eq!(max_y, 100.0);
    }

    #[test]
    fn test_window_clamps_to_grid() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.window((2.5, 3.5, 4.5, 6.5), 10, 10), Some((3, 2, 7, 5)));
        assert_eq!(gt.window((-5.0, -5.0, 50.0, 50.0), 10, 10), Some((0, 0, 10, 10)));
        assert_eq!(gt.window((20.0, 20.0, 30.0, 30.0), 10, 10), None);
    }

    #[test]
    fn test_pixel_index_outside() {
        let gt = GeoTransform::new(0.0, 10.0, 1.0, -1.0);
        assert_eq!(gt.pixel_index(-0.5, 5.0, 10, 10), None);
        assert_eq!(gt.pixel_index(10.5, 5.0, 10, 10), None);
    }
}
