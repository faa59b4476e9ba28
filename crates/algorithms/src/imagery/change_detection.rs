//! Two-date change detection on index rasters
//!
//! Burn mapping: `dNBR = NBR(pre) - NBR(post)`, thresholded into a 0/1 burn
//! class raster whose class-1 area is the burned area.

use crate::maybe_rayon::*;
use ardhi_core::raster::Raster;
use ardhi_core::Result;

/// Default dNBR threshold above which a pixel counts as burned
pub const DEFAULT_BURN_THRESHOLD: f64 = 0.2;

/// `before - after`, invalid where either input is invalid
pub fn index_difference(before: &Raster<f64>, after: &Raster<f64>) -> Result<Raster<f64>> {
    before.ensure_same_grid(after)?;

    let (rows, cols) = before.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };
                if before.is_valid(b) && after.is_valid(a) {
                    *slot = b - a;
                }
            }
            row_data
        })
        .collect();

    before.with_data(data, None)
}

/// Class raster: 1 where `value > threshold`, 0 elsewhere, invalid where the
/// input is invalid.
pub fn threshold_mask(raster: &Raster<f64>, threshold: f64) -> Result<Raster<i32>> {
    let (rows, cols) = raster.shape();
    let data: Vec<i32> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![i32::MIN; cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                let v = unsafe { raster.get_unchecked(row, col) };
                if raster.is_valid(v) {
                    *slot = i32::from(v > threshold);
                }
            }
            row_data
        })
        .collect();

    raster.with_data(data, Some(i32::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ardhi_core::GeoTransform;

    fn band(values: Vec<f64>) -> Raster<f64> {
        Raster::from_vec(values, 1, 4)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0))
    }

    #[test]
    fn test_dnbr_is_pre_minus_post() {
        let pre = band(vec![0.6, 0.5, f64::NAN, 0.1]);
        let post = band(vec![0.1, 0.45, 0.2, 0.3]);
        let d = index_difference(&pre, &post).unwrap();
        assert_relative_eq!(d.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(d.get(0, 3).unwrap(), -0.2, epsilon = 1e-12);
        assert!(!d.is_valid_at(0, 2));
    }

    #[test]
    fn test_threshold_is_strict() {
        let d = band(vec![0.5, 0.2, f64::NAN, -0.1]);
        let burned = threshold_mask(&d, DEFAULT_BURN_THRESHOLD).unwrap();
        assert_eq!(burned.get(0, 0).unwrap(), 1);
        assert_eq!(burned.get(0, 1).unwrap(), 0);
        assert!(!burned.is_valid_at(0, 2));
        assert_eq!(burned.get(0, 3).unwrap(), 0);
    }
}
