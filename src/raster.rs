//! In-memory georeferenced raster.

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, GeoTransform};

/// Storage type of the samples in the file a raster came from.
///
/// Pixels are always held as `f32` in memory; this records what to write
/// back so a `u8` class raster stays `u8` on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    #[default]
    F32,
    F64,
}

impl SampleType {
    /// TIFF `BitsPerSample`.
    #[must_use]
    pub fn bits(self) -> u16 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 => 16,
            Self::U32 | Self::I32 | Self::F32 => 32,
            Self::U64 | Self::I64 | Self::F64 => 64,
        }
    }

    /// TIFF `SampleFormat`: 1 unsigned, 2 signed, 3 IEEE float.
    #[must_use]
    pub fn sample_format(self) -> u16 {
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => 1,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 => 2,
            Self::F32 | Self::F64 => 3,
        }
    }
}

/// A georeferenced multi-band raster held in memory.
///
/// Pixels are `f32`, band-interleaved by pixel (`B1,B2,...,B1,B2,...`), rows
/// top to bottom.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Pixel values (interleaved if multi-band)
    pub pixels: Vec<f32>,
    /// Number of bands
    pub bands: usize,
    pub width: usize,
    pub height: usize,
    /// EPSG code of the coordinate reference system
    pub crs: i32,
    /// Pixel-to-CRS affine transform
    pub transform: GeoTransform,
    /// Nodata sentinel, if declared
    pub nodata: Option<f64>,
    /// Sample type used when the raster is written out
    pub sample_type: SampleType,
}

impl Raster {
    /// Create a raster, checking that `pixels` matches the declared shape.
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] if the buffer length is not
    /// `width * height * bands` or any dimension is zero.
    pub fn new(
        pixels: Vec<f32>,
        bands: usize,
        width: usize,
        height: usize,
        crs: i32,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Result<Self> {
        if bands == 0 || width == 0 || height == 0 {
            return Err(Error::InvalidData(format!(
                "Raster has zero dimensions: {width}x{height}x{bands}"
            )));
        }
        let expected = width * height * bands;
        if pixels.len() != expected {
            return Err(Error::InvalidData(format!(
                "Expected {expected} samples for {width}x{height}x{bands}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            bands,
            width,
            height,
            crs,
            transform,
            nodata,
            sample_type: SampleType::default(),
        })
    }

    /// Set the on-disk sample type.
    #[must_use]
    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    /// Raster of `bands` bands filled with `value`.
    #[must_use]
    pub fn filled(
        value: f32,
        bands: usize,
        width: usize,
        height: usize,
        crs: i32,
        transform: GeoTransform,
        nodata: Option<f64>,
    ) -> Self {
        Self {
            pixels: vec![value; width * height * bands],
            bands,
            width,
            height,
            crs,
            transform,
            nodata,
            sample_type: SampleType::default(),
        }
    }

    /// Spatial extent in the raster's CRS.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    /// Sample at `(col, row)` of a 0-based band index.
    #[inline]
    #[must_use]
    pub fn get(&self, band: usize, col: usize, row: usize) -> Option<f32> {
        if band >= self.bands || col >= self.width || row >= self.height {
            return None;
        }
        self.pixels.get((row * self.width + col) * self.bands + band).copied()
    }

    /// Copy one band (1-based, like GDAL band numbers) into a row-major buffer.
    ///
    /// # Errors
    /// Returns [`Error::BandNotFound`] if `band` is 0 or past the band count.
    pub fn band(&self, band: usize) -> Result<Vec<f32>> {
        if band == 0 || band > self.bands {
            return Err(Error::BandNotFound { band, count: self.bands });
        }
        if self.bands == 1 {
            return Ok(self.pixels.clone());
        }
        Ok(self
            .pixels
            .iter()
            .skip(band - 1)
            .step_by(self.bands)
            .copied()
            .collect())
    }

    /// Whether `value` equals this raster's nodata sentinel.
    #[inline]
    #[must_use]
    pub fn is_nodata(&self, value: f32) -> bool {
        is_nodata(value, self.nodata)
    }

    /// Value used for pixels with no source data.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn fill_value(&self) -> f32 {
        self.nodata.map_or(0.0, |v| v as f32)
    }
}

/// Compare a sample against an optional nodata sentinel.
///
/// Comparison happens at `f32` precision because that is how samples are
/// stored; a NaN sentinel matches NaN samples.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn is_nodata(value: f32, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd as f32,
        None => false,
    }
}
