//! Checked numeric conversions for raster geometry.
//!
//! Widening `usize` to `f64` is done with plain `as` casts throughout the
//! crate: raster dimensions stay far below 2^53. The narrowing directions live
//! here:
//!
//! - inverse-projected coordinates to pixel indices (may be negative, NaN or
//!   past the edge)
//! - extent ratios to output dimensions
//! - `usize`/`i32` to the `u32` and `u16` fields of TIFF and GeoKeys

use crate::error::{Error, Result};

/// Convert a `usize` dimension to the `u32` TIFF/PNG field type.
///
/// # Errors
/// Returns [`Error::InvalidData`] if the value exceeds `u32::MAX`.
#[inline]
pub fn usize_to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidData(format!("Value {value} exceeds u32 maximum")))
}

/// Convert a `u32` TIFF dimension to `usize`.
///
/// # Errors
/// Returns [`Error::InvalidData`] on 16-bit targets where it does not fit.
#[inline]
pub fn u32_to_usize(value: u32) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidData(format!("Value {value} exceeds usize maximum")))
}

/// Convert an EPSG code to the `u16` GeoKey value type.
///
/// # Errors
/// Returns [`Error::UnsupportedCrs`] if the code cannot be stored in a GeoKey.
#[inline]
pub fn epsg_to_geokey(epsg: i32) -> Result<u16> {
    u16::try_from(epsg).map_err(|_| Error::UnsupportedCrs(format!("EPSG:{epsg} does not fit in a GeoKey")))
}

/// Index of the pixel containing continuous coordinate `value` along an axis
/// of `len` pixels, or `None` when it lies outside `[0, len)` or is NaN.
#[inline]
#[must_use]
pub fn f64_to_pixel_index(value: f64, len: usize) -> Option<usize> {
    if value.is_nan() || value < 0.0 {
        return None;
    }
    // Non-negative here; huge values saturate and fail the bound below
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = value.floor() as usize;
    (index < len).then_some(index)
}

/// Round a positive extent ratio to a pixel count of at least 1.
#[inline]
#[must_use]
pub fn f64_to_dimension(value: f64) -> usize {
    if value.is_nan() || value < 1.5 {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (value + 0.5) as usize;
    count
}
