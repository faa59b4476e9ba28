//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use geo_types::Rect;
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// Cells equal to the nodata value (or NaN, for floats) are invalid and are
/// skipped by every reduction in the workspace.
///
/// # Example
///
/// ```ignore
/// use ardhi_core::Raster;
///
/// let mut band: Raster<f64> = Raster::filled(100, 100, f64::NAN);
/// band.set(10, 20, 0.42)?;
/// assert!(band.is_valid_at(10, 20));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: data.len(),
                ac: 1,
            });
        }
        let array =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster on the same grid with another cell type, every cell
    /// set to that type's invalid sentinel.
    pub fn invalid_like<U: RasterElement>(&self) -> Raster<U> {
        let sentinel = U::nodata_sentinel();
        Raster {
            data: Array2::from_elem(self.data.dim(), sentinel),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: Some(sentinel),
        }
    }

    /// Same grid and metadata, new data. Fails if the shape differs.
    pub fn with_data<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        if data.len() != rows * cols {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: data.len(),
                ac: 1,
            });
        }
        let data =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        })
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Builder-style [`Raster::set_transform`]
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    pub fn footprint(&self) -> Rect<f64> {
        self.transform.footprint(self.cols(), self.rows())
    }

    /// Map coordinates of a pixel centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    // Grid comparison

    /// Same shape and pixel lattice
    pub fn same_grid<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape() && self.transform.same_lattice(other.transform())
    }

    /// [`Raster::same_grid`] as a `Result`
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if !self.transform.same_lattice(other.transform()) {
            return Err(Error::GridMismatch(format!(
                "{:?} vs {:?}",
                self.transform,
                other.transform()
            )));
        }
        Ok(())
    }

    // Validity

    pub fn is_valid(&self, value: T) -> bool {
        !value.is_missing(self.nodata)
    }

    /// Whether (row, col) is inside the grid and holds a valid value
    pub fn is_valid_at(&self, row: usize, col: usize) -> bool {
        self.data
            .get((row, col))
            .is_some_and(|v| !v.is_missing(self.nodata))
    }

    /// Valid value at (row, col), `None` if invalid or out of bounds
    pub fn valid_value(&self, row: usize, col: usize) -> Option<T> {
        self.data
            .get((row, col))
            .copied()
            .filter(|v| !v.is_missing(self.nodata))
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_missing(self.nodata)).count()
    }

    /// Basic statistics over valid cells
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut count = 0usize;

        for v in self.data.iter().filter(|v| !v.is_missing(self.nodata)) {
            if let Some(v) = v.to_f64() {
                min = min.min(v);
                max = max.max(v);
                sum += v;
                count += 1;
            }
        }

        let (min, max, mean) = if count > 0 {
            (Some(min), Some(max), Some(sum / count as f64))
        } else {
            (None, None, None)
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            invalid_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster. `None` when there is no valid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub invalid_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.set(10, 0, 1.0).is_err());
    }

    #[test]
    fn test_nan_cells_are_invalid() {
        let mut raster: Raster<f64> = Raster::filled(3, 3, 1.0);
        raster.set(1, 1, f64::NAN).unwrap();
        assert!(!raster.is_valid_at(1, 1));
        assert!(!raster.is_valid_at(5, 5));
        assert_eq!(raster.valid_count(), 8);
        assert_eq!(raster.valid_value(0, 0), Some(1.0));
    }

    #[test]
    fn test_statistics_skip_invalid() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.set(9, 9, f64::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(98.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.invalid_count, 1);
    }

    #[test]
    fn test_all_invalid_statistics_are_none() {
        let raster: Raster<f64> = Raster::filled(2, 2, f64::NAN);
        let stats = raster.statistics();
        assert_eq!(stats.mean, None);
        assert_eq!(stats.valid_count, 0);
    }

    #[test]
    fn test_grid_comparison() {
        let a: Raster<f64> = Raster::new(4, 4).with_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        let b: Raster<i32> = a.invalid_like();
        assert!(a.same_grid(&b));
        let c: Raster<f64> = Raster::new(4, 4).with_transform(GeoTransform::new(1.0, 4.0, 1.0, -1.0));
        assert!(matches!(a.ensure_same_grid(&c), Err(Error::GridMismatch(_))));
        let d: Raster<f64> = Raster::new(3, 4);
        assert!(matches!(a.ensure_same_grid(&d), Err(Error::SizeMismatch { .. })));
    }
}
