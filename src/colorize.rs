//! Render one raster band as an RGBA image.
//!
//! The band is stretched linearly between its smallest and largest valid
//! value, pushed through a [`Colormap`], and nodata pixels are made fully
//! transparent.

use std::path::Path;

use image::{ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::casting::usize_to_u32;
use crate::colormap::{to_rgba8, Colormap, BAD_COLOR};
use crate::error::{Error, Result};
use crate::raster::{is_nodata, Raster};

/// Band rendered by [`Colorizer`] (1-based).
pub const RENDER_BAND: usize = 1;

/// Smallest and largest valid sample of a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// A flat band has nothing to stretch.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_flat(&self) -> bool {
        self.min == self.max
    }
}

/// Range over samples that are finite and not nodata, `None` if there are none.
#[must_use]
pub fn value_range(values: &[f32], nodata: Option<f64>) -> Option<ValueRange> {
    values
        .iter()
        .filter(|&&v| v.is_finite() && !is_nodata(v, nodata))
        .map(|&v| f64::from(v))
        .fold(None, |range, v| match range {
            None => Some(ValueRange { min: v, max: v }),
            Some(r) => Some(ValueRange { min: r.min.min(v), max: r.max.max(v) }),
        })
}

/// Convert `values` to RGBA8 bytes (4 per sample, row-major).
///
/// Valid samples are mapped to `(v - min) / (max - min)`; a flat or empty
/// range maps every sample to 0. Nodata samples always get alpha 0.
#[must_use]
pub fn colorize(values: &[f32], nodata: Option<f64>, colormap: Colormap) -> Vec<u8> {
    let range = value_range(values, nodata).filter(|r| !r.is_flat());
    let mut rgba = Vec::with_capacity(values.len() * 4);

    for &v in values {
        let masked = is_nodata(v, nodata);
        let mut pixel = match range {
            // Masked samples are "bad" while stretching
            Some(_) if masked => to_rgba8(BAD_COLOR),
            Some(r) => colormap.rgba8((f64::from(v) - r.min) / (r.max - r.min)),
            None => colormap.rgba8(0.0),
        };
        if masked {
            pixel[3] = 0;
        }
        rgba.extend_from_slice(&pixel);
    }
    rgba
}

/// Builder turning band 1 of a [`Raster`] into an [`RgbaImage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Colorizer {
    colormap: Colormap,
}

impl Colorizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the colormap (turbo by default)
    #[must_use]
    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    /// Render band 1 at the raster's full size.
    ///
    /// # Errors
    /// Returns [`Error::BandNotFound`] for a raster without bands, or
    /// [`Error::InvalidData`] if the dimensions do not fit a PNG.
    pub fn render(&self, raster: &Raster) -> Result<RgbaImage> {
        let values = raster.band(RENDER_BAND)?;

        if let Some(range) = value_range(&values, raster.nodata) {
            debug!(min = range.min, max = range.max, colormap = %self.colormap, "Stretching band");
        } else {
            debug!("Band has no valid samples");
        }

        let rgba = colorize(&values, raster.nodata, self.colormap);
        let width = usize_to_u32(raster.width)?;
        let height = usize_to_u32(raster.height)?;
        RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            Error::InvalidData(format!("RGBA buffer does not fill a {width}x{height} image"))
        })
    }
}

/// Encode `image` as PNG at `path`, replacing any existing file.
///
/// # Errors
/// Returns [`Error::Image`] if encoding or writing fails.
pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    let path = path.as_ref();
    image.save_with_format(path, ImageFormat::Png)?;
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Wrote PNG"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;

    fn pixel(rgba: &[u8], i: usize) -> [u8; 4] {
        [rgba[i * 4], rgba[i * 4 + 1], rgba[i * 4 + 2], rgba[i * 4 + 3]]
    }

    #[test]
    fn test_value_range_skips_nodata() {
        let range = value_range(&[-1.0, 5.0, 10.0, 20.0], Some(-1.0)).unwrap();
        assert_eq!(range, ValueRange { min: 5.0, max: 20.0 });

        let range = value_range(&[-1.0, 5.0], None).unwrap();
        assert_eq!(range.min, -1.0);

        assert!(value_range(&[-1.0, -1.0], Some(-1.0)).is_none());
        assert!(value_range(&[f32::NAN, 3.0], None).unwrap().is_flat());
    }

    #[test]
    fn test_nodata_is_transparent() {
        let rgba = colorize(&[-1.0, 5.0, 10.0, 20.0], Some(-1.0), Colormap::Turbo);
        assert_eq!(rgba.len(), 16);
        assert_eq!(pixel(&rgba, 0), [0, 0, 0, 0]);
        for i in 1..4 {
            assert_eq!(pixel(&rgba, i)[3], 255);
        }
        assert_eq!(pixel(&rgba, 1), [48, 18, 59, 255]);
        assert_eq!(pixel(&rgba, 2), [26, 228, 182, 255]);
        assert_eq!(pixel(&rgba, 3), [122, 4, 2, 255]);
    }

    #[test]
    fn test_flat_band_maps_to_zero() {
        let rgba = colorize(&[7.0, 7.0, 0.0], Some(0.0), Colormap::Turbo);
        assert_eq!(pixel(&rgba, 0), [48, 18, 59, 255]);
        assert_eq!(pixel(&rgba, 1), [48, 18, 59, 255]);
        // Unstretched nodata keeps the color but loses alpha
        assert_eq!(pixel(&rgba, 2), [48, 18, 59, 0]);
    }

    #[test]
    fn test_all_nodata_band() {
        let rgba = colorize(&[-1.0; 4], Some(-1.0), Colormap::Turbo);
        assert!(rgba.chunks_exact(4).all(|p| p[3] == 0));
    }

    #[test]
    fn test_without_nodata_everything_is_opaque() {
        let rgba = colorize(&[0.0, 1.0, 2.0], None, Colormap::Grayscale);
        assert_eq!(pixel(&rgba, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&rgba, 1), [128, 128, 128, 255]);
        assert_eq!(pixel(&rgba, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn test_nan_sample_is_transparent() {
        let rgba = colorize(&[0.0, f32::NAN, 2.0], None, Colormap::Turbo);
        assert_eq!(pixel(&rgba, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_render_dimensions_and_band() {
        // 2 bands, 3x2; only band 1 drives the colors
        let mut pixels = Vec::new();
        for i in 0..6u8 {
            pixels.push(f32::from(i));
            pixels.push(100.0);
        }
        let raster = Raster::new(pixels, 2, 3, 2, 4326, GeoTransform::north_up(0.0, 2.0, 1.0, -1.0), None).unwrap();
        let img = Colorizer::new().colormap(Colormap::Grayscale).render(&raster).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(2, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let img = RgbaImage::from_raw(1, 1, vec![1, 2, 3, 0]).unwrap();
        save_png(&img, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3, 0]);
    }
}
