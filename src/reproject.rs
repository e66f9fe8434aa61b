//! Raster reprojection between coordinate reference systems.
//!
//! Two steps, mirroring GDAL's warp:
//!
//! 1. [`calculate_default_transform`] picks the destination grid: the source
//!    footprint is sampled, projected, and enclosed in a north-up grid of
//!    square pixels whose diagonal has as many pixels as the source diagonal.
//! 2. [`Reprojector`] fills that grid by inverse-projecting every destination
//!    pixel centre into the source and resampling there.
//!
//! # Example
//!
//! ```rust,no_run
//! use thzmap::{read_geotiff, Reprojector, ResamplingMethod};
//!
//! fn main() -> thzmap::Result<()> {
//!     let source = read_geotiff("input.tif")?;
//!     let wgs84 = Reprojector::new(&source)
//!         .to_crs(4326)
//!         .resampling(ResamplingMethod::Nearest)
//!         .reproject()?;
//!     wgs84.write_geotiff("input_4326.tif")?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::casting::{f64_to_dimension, f64_to_pixel_index};
use crate::error::{Error, Result};
use crate::geometry::projection::{CoordTransformer, WGS84};
use crate::geometry::{BoundingBox, GeoTransform};
use crate::raster::{is_nodata, Raster};

/// Grid steps per edge when sampling the source footprint.
const FOOTPRINT_STEPS: usize = 20;

/// Resampling method used when reading source pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResamplingMethod {
    /// Nearest neighbor - preserves categorical values exactly
    #[default]
    Nearest,
    /// Bilinear interpolation of the four surrounding pixels, for continuous data
    Bilinear,
}

impl fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("nearest"),
            Self::Bilinear => f.write_str("bilinear"),
        }
    }
}

impl FromStr for ResamplingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            other => Err(Error::InvalidData(format!("Unknown resampling method '{other}'"))),
        }
    }
}

/// Destination grid computed by [`calculate_default_transform`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultTransform {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

/// Compute the destination grid for reprojecting a north-up raster covering
/// `bounds` with `width` x `height` pixels from `src_crs` to `dst_crs`.
///
/// # Errors
/// Fails if either CRS is unsupported or no footprint point can be projected.
pub fn calculate_default_transform(
    src_crs: i32,
    dst_crs: i32,
    width: usize,
    height: usize,
    bounds: &BoundingBox,
) -> Result<DefaultTransform> {
    #[allow(clippy::cast_precision_loss)]
    let src_transform = GeoTransform::north_up(
        bounds.minx,
        bounds.maxy,
        bounds.width() / width.max(1) as f64,
        -bounds.height() / height.max(1) as f64,
    );
    default_transform_for(&src_transform, src_crs, dst_crs, width, height)
}

/// Same as [`calculate_default_transform`] for an arbitrary source transform.
///
/// # Errors
/// Fails if either CRS is unsupported or no footprint point can be projected.
#[allow(clippy::cast_precision_loss)]
pub fn default_transform_for(
    src_transform: &GeoTransform,
    src_crs: i32,
    dst_crs: i32,
    width: usize,
    height: usize,
) -> Result<DefaultTransform> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidData("Source raster has zero dimensions".to_string()));
    }

    let transformer = CoordTransformer::new(src_crs, dst_crs)?;

    let mut extent = BoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut failed = 0usize;

    // Edges plus an interior grid so curved footprints are enclosed
    for i in 0..=FOOTPRINT_STEPS {
        let row = height as f64 * i as f64 / FOOTPRINT_STEPS as f64;
        for j in 0..=FOOTPRINT_STEPS {
            let col = width as f64 * j as f64 / FOOTPRINT_STEPS as f64;
            let (x, y) = src_transform.pixel_to_world(col, row);
            match transformer.transform(x, y) {
                Ok((dx, dy)) => {
                    extent.minx = extent.minx.min(dx);
                    extent.maxx = extent.maxx.max(dx);
                    extent.miny = extent.miny.min(dy);
                    extent.maxy = extent.maxy.max(dy);
                }
                Err(_) => failed += 1,
            }
        }
    }

    if !(extent.minx.is_finite() && extent.maxy.is_finite()) {
        return Err(Error::Projection(format!(
            "No part of the source footprint projects from EPSG:{src_crs} to EPSG:{dst_crs}"
        )));
    }
    if failed > 0 {
        warn!(failed, src_crs, dst_crs, "Some footprint points failed to project");
    }

    // Keep the pixel count along the diagonal
    let dst_diagonal = extent.width().hypot(extent.height());
    let src_diagonal_pixels = (width as f64).hypot(height as f64);
    let mut pixel_size = dst_diagonal / src_diagonal_pixels;
    if pixel_size <= 0.0 || !pixel_size.is_finite() {
        // Degenerate footprint (a single projected point); fall back to the source scale
        pixel_size = src_transform.pixel_width.abs().max(f64::MIN_POSITIVE);
    }

    let dst_width = f64_to_dimension(extent.width() / pixel_size);
    let dst_height = f64_to_dimension(extent.height() / pixel_size);

    let result = DefaultTransform {
        transform: GeoTransform::north_up(extent.minx, extent.maxy, pixel_size, -pixel_size),
        width: dst_width,
        height: dst_height,
    };
    debug!(
        src_crs,
        dst_crs,
        width = result.width,
        height = result.height,
        pixel_size,
        "Computed default transform"
    );
    Ok(result)
}

/// Builder for reprojecting a [`Raster`] into another CRS.
///
/// Every band is resampled; band count and nodata are carried over. Pixels
/// with no source coverage get the nodata value (0 if none is declared).
pub struct Reprojector<'a> {
    source: &'a Raster,
    target_crs: i32,
    resampling: ResamplingMethod,
}

impl<'a> Reprojector<'a> {
    /// Reproject `source` to EPSG:4326 with nearest-neighbour resampling unless configured otherwise.
    #[must_use]
    pub fn new(source: &'a Raster) -> Self {
        Self {
            source,
            target_crs: WGS84,
            resampling: ResamplingMethod::default(),
        }
    }

    /// Set the target EPSG code
    #[must_use]
    pub fn to_crs(mut self, epsg: i32) -> Self {
        self.target_crs = epsg;
        self
    }

    /// Set the resampling method
    #[must_use]
    pub fn resampling(mut self, method: ResamplingMethod) -> Self {
        self.resampling = method;
        self
    }

    /// Compute the destination grid and resample every band into it.
    ///
    /// # Errors
    /// Fails if the CRS pair is unsupported, the footprint does not project,
    /// or the source transform is singular.
    pub fn reproject(self) -> Result<Raster> {
        let src = self.source;
        let grid = default_transform_for(&src.transform, src.crs, self.target_crs, src.width, src.height)?;

        info!(
            src_crs = src.crs,
            dst_crs = self.target_crs,
            src_width = src.width,
            src_height = src.height,
            dst_width = grid.width,
            dst_height = grid.height,
            bands = src.bands,
            resampling = %self.resampling,
            "Reprojecting raster"
        );

        self.reproject_into(&grid)
    }

    /// Resample into a caller-supplied destination grid.
    ///
    /// # Errors
    /// Fails if the CRS pair is unsupported or the source transform is singular.
    #[allow(clippy::cast_precision_loss)]
    pub fn reproject_into(self, grid: &DefaultTransform) -> Result<Raster> {
        let src = self.source;
        let inverse = src
            .transform
            .inverse()
            .ok_or_else(|| Error::InvalidData("Source geotransform is not invertible".to_string()))?;
        // Destination pixel centres are projected back into the source CRS
        let transformer = CoordTransformer::new(self.target_crs, src.crs)?;

        let bands = src.bands;
        let fill = src.fill_value();
        let mut dst = Raster::filled(
            fill,
            bands,
            grid.width,
            grid.height,
            self.target_crs,
            grid.transform,
            src.nodata,
        )
        .with_sample_type(src.sample_type);

        let mut unprojectable = 0usize;
        for row in 0..grid.height {
            for col in 0..grid.width {
                let (x, y) = grid.transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5);
                let Ok((sx, sy)) = transformer.transform(x, y) else {
                    unprojectable += 1;
                    continue;
                };
                let (px, py) = inverse.pixel_to_world(sx, sy);

                let out = (row * grid.width + col) * bands;
                let pixel = &mut dst.pixels[out..out + bands];
                match self.resampling {
                    ResamplingMethod::Nearest => sample_nearest(src, px, py, pixel),
                    ResamplingMethod::Bilinear => sample_bilinear(src, px, py, pixel),
                }
            }
        }

        if unprojectable > 0 {
            debug!(unprojectable, "Destination pixels outside the source projection domain");
        }
        Ok(dst)
    }
}

/// Copy the source pixel containing `(px, py)`; leaves `out` untouched when outside.
fn sample_nearest(src: &Raster, px: f64, py: f64, out: &mut [f32]) {
    let (Some(col), Some(row)) = (
        f64_to_pixel_index(px, src.width),
        f64_to_pixel_index(py, src.height),
    ) else {
        return;
    };
    let start = (row * src.width + col) * src.bands;
    out.copy_from_slice(&src.pixels[start..start + src.bands]);
}

/// Interpolate between the four pixel centres around `(px, py)`.
///
/// Edge pixels are replicated past the border; nodata neighbours drop out and
/// the remaining weights are renormalized.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn sample_bilinear(src: &Raster, px: f64, py: f64, out: &mut [f32]) {
    if f64_to_pixel_index(px, src.width).is_none() || f64_to_pixel_index(py, src.height).is_none() {
        return;
    }

    let x = (px - 0.5).max(0.0);
    let y = (py - 0.5).max(0.0);
    let x0 = (x.floor() as usize).min(src.width - 1);
    let y0 = (y.floor() as usize).min(src.height - 1);
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ];

    for (band, value) in out.iter_mut().enumerate() {
        let mut sum = 0.0;
        let mut weight = 0.0;
        for &(c, r, w) in &taps {
            let Some(v) = src.get(band, c, r) else { continue };
            if w == 0.0 || is_nodata(v, src.nodata) || v.is_nan() {
                continue;
            }
            sum += f64::from(v) * w;
            weight += w;
        }
        if weight > 0.0 {
            *value = (sum / weight) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The 2x2 Web Mercator raster covering (0, 0)-(100, 100) metres.
    fn mercator_square() -> Raster {
        Raster::new(
            vec![-1.0, 5.0, 10.0, 20.0],
            1,
            2,
            2,
            3857,
            GeoTransform::north_up(0.0, 100.0, 50.0, -50.0),
            Some(-1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_default_transform_identity_crs() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        let grid = calculate_default_transform(4326, 4326, 10, 5, &bounds).unwrap();
        assert_eq!((grid.width, grid.height), (10, 5));
        assert!((grid.transform.pixel_width - 1.0).abs() < 1e-12);
        assert!((grid.transform.origin_x - 0.0).abs() < 1e-12);
        assert!((grid.transform.origin_y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_transform_mercator_square() {
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let grid = calculate_default_transform(3857, 4326, 2, 2, &bounds).unwrap();
        assert_eq!((grid.width, grid.height), (2, 2));
        assert!(grid.transform.is_north_up());

        let dst_bounds = grid.transform.bounds(grid.width, grid.height);
        assert!(dst_bounds.minx.abs() < 1e-9, "{dst_bounds:?}");
        assert!(dst_bounds.miny.abs() < 1e-5, "{dst_bounds:?}");
        assert!((dst_bounds.maxy - 0.000_898_3).abs() < 1e-6, "{dst_bounds:?}");
    }

    #[test]
    fn test_default_transform_unsupported_crs() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let result = calculate_default_transform(999_999, 4326, 1, 1, &bounds);
        assert!(matches!(result, Err(Error::UnsupportedCrs(_))));
    }

    #[test]
    fn test_reproject_preserves_class_values() {
        let src = mercator_square();
        let dst = Reprojector::new(&src).reproject().unwrap();

        assert_eq!(dst.crs, 4326);
        assert_eq!((dst.width, dst.height, dst.bands), (2, 2, 1));
        assert_eq!(dst.nodata, Some(-1.0));
        assert_eq!(dst.pixels, vec![-1.0, 5.0, 10.0, 20.0]);
    }

    #[test]
    fn test_reproject_keeps_sample_type() {
        let src = mercator_square().with_sample_type(crate::raster::SampleType::I16);
        let dst = Reprojector::new(&src).reproject().unwrap();
        assert_eq!(dst.sample_type, crate::raster::SampleType::I16);
    }

    #[test]
    fn test_reproject_same_crs_is_copy() {
        let mut src = mercator_square();
        src.crs = 4326;
        src.transform = GeoTransform::north_up(10.0, 50.0, 0.5, -0.5);
        let dst = Reprojector::new(&src).to_crs(4326).reproject().unwrap();
        assert_eq!(dst.pixels, src.pixels);
        assert_eq!(dst.transform, src.transform);
    }

    #[test]
    fn test_reproject_all_bands() {
        let src = Raster::new(
            vec![1.0, 100.0, 2.0, 200.0, 3.0, 300.0, 4.0, 400.0],
            2,
            2,
            2,
            3857,
            GeoTransform::north_up(0.0, 100.0, 50.0, -50.0),
            None,
        )
        .unwrap();
        let dst = Reprojector::new(&src).reproject().unwrap();
        assert_eq!(dst.bands, 2);
        assert_eq!(dst.band(1).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(dst.band(2).unwrap(), vec![100.0, 200.0, 300.0, 400.0]);
    }

    #[test]
    fn test_uncovered_pixels_get_fill() {
        let src = mercator_square();
        // Grid wider than the source footprint
        let grid = DefaultTransform {
            transform: GeoTransform::north_up(-0.001, 0.0009, 0.0005, -0.0005),
            width: 2,
            height: 1,
        };
        let dst = Reprojector::new(&src).reproject_into(&grid).unwrap();
        assert_eq!(dst.pixels[0], -1.0, "west of the source is nodata");
    }

    #[test]
    fn test_nearest_uses_containing_pixel() {
        let src = mercator_square();
        let mut out = [0.0f32];
        sample_nearest(&src, 1.99, 0.01, &mut out);
        assert_eq!(out[0], 5.0);
        sample_nearest(&src, 0.5, 1.5, &mut out);
        assert_eq!(out[0], 10.0);

        let mut untouched = [7.0f32];
        sample_nearest(&src, -0.1, 0.5, &mut untouched);
        assert_eq!(untouched[0], 7.0);
    }

    #[test]
    fn test_bilinear_skips_nodata() {
        let src = mercator_square();
        let mut out = [0.0f32];
        // Centre of the grid: (-1 is nodata) -> mean of 5, 10, 20
        sample_bilinear(&src, 1.0, 1.0, &mut out);
        assert!((out[0] - 35.0 / 3.0).abs() < 1e-5, "{}", out[0]);

        // On a pixel centre the value is exact
        sample_bilinear(&src, 1.5, 1.5, &mut out);
        assert!((out[0] - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_resampling_from_str() {
        assert_eq!("Nearest".parse::<ResamplingMethod>().unwrap(), ResamplingMethod::Nearest);
        assert_eq!("bilinear".parse::<ResamplingMethod>().unwrap(), ResamplingMethod::Bilinear);
        assert!("cubic".parse::<ResamplingMethod>().is_err());
    }
}
