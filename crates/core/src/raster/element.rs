//! Cell value trait for rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Invalid (masked) cells are represented by a sentinel value rather than a
/// separate mask array: NaN for floats, `MIN` for signed integers and `MAX`
/// for unsigned integers.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel used for invalid cells when a raster has no explicit nodata.
    fn nodata_sentinel() -> Self;

    /// Whether `self` is an invalid cell given the raster's nodata value.
    fn is_missing(&self, nodata: Option<Self>) -> bool;

    /// Convert to f64, `None` if the value is not representable.
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_integer_element {
    ($t:ty, $sentinel:expr) => {
        impl RasterElement for $t {
            fn nodata_sentinel() -> Self {
                $sentinel
            }

            fn is_missing(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ty) => {
        impl RasterElement for $t {
            fn nodata_sentinel() -> Self {
                <$t>::NAN
            }

            fn is_missing(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if !nd.is_nan() => *self == nd,
                    _ => false,
                }
            }
        }
    };
}

impl_integer_element!(i32, i32::MIN);
impl_integer_element!(i64, i64::MIN);
impl_integer_element!(u8, u8::MAX);
impl_integer_element!(u16, u16::MAX);
impl_float_element!(f32);
impl_float_element!(f64);
