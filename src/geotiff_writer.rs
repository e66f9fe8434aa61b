//! GeoTIFF writer for in-memory rasters
//!
//! Writes a [`Raster`] as a GeoTIFF using pure Rust (the `tiff` crate, no
//! GDAL). Samples are stored as the raster's [`SampleType`], so a `u8` input
//! comes back out as `u8`. The georeferencing written is what
//! [`crate::geotiff_reader`] and GDAL-based tools need to place the raster:
//!
//! - `ModelPixelScale` + `ModelTiepoint` for north-up rasters,
//!   `ModelTransformation` otherwise
//! - a GeoKey directory naming the EPSG code
//! - `GDAL_NODATA` when the raster declares a nodata value
//!
//! # Example
//!
//! ```rust,no_run
//! use thzmap::{read_geotiff, GeoTiffCompression};
//!
//! fn main() -> thzmap::Result<()> {
//!     let raster = read_geotiff("input.tif")?;
//!     raster.geotiff_writer()
//!         .compression(GeoTiffCompression::Deflate)
//!         .write("copy.tif")?;
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64, Gray64Float, Gray8, GrayI16, GrayI32, GrayI64, GrayI8,
    RGB16, RGB32, RGB32Float, RGB64, RGB64Float, RGB8, RGBA16, RGBA32, RGBA32Float, RGBA64, RGBA64Float,
    RGBA8,
};
use tiff::encoder::{Compression, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

use crate::casting::{epsg_to_geokey, usize_to_u32};
use crate::error::{Error, Result};
use crate::geometry::projection::is_geographic_crs;
use crate::geotiff_reader::{
    GDAL_NODATA_TAG, GEOGRAPHIC_TYPE_GEO_KEY, GEO_KEY_DIRECTORY_TAG, MODEL_PIXEL_SCALE_TAG,
    MODEL_TIEPOINT_TAG, MODEL_TRANSFORMATION_TAG, PROJECTED_CS_TYPE_GEO_KEY,
};
use crate::raster::{Raster, SampleType};

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Strip compression of the written GeoTIFF.
///
/// Applies to single-band rasters and to 3 or 4 band rasters of unsigned or
/// float samples. Other layouts are always written uncompressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeoTiffCompression {
    #[default]
    None,
    Lzw,
    /// Deflate at its fast level
    Deflate,
}

/// Writes one [`Raster`] as a GeoTIFF
pub struct GeoTiffWriter<'a> {
    raster: &'a Raster,
    compression: GeoTiffCompression,
}

impl<'a> GeoTiffWriter<'a> {
    #[must_use]
    pub fn new(raster: &'a Raster) -> Self {
        Self {
            raster,
            compression: GeoTiffCompression::default(),
        }
    }

    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Write to a file path, replacing any existing file
    ///
    /// # Errors
    /// Fails if the file cannot be created or the raster cannot be encoded.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.display(), "Wrote GeoTIFF");
        Ok(())
    }

    /// Encode into any seekable sink.
    ///
    /// # Errors
    /// Fails if the raster is empty or encoding fails.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<()> {
        let raster = self.raster;

        if raster.pixels.is_empty() || raster.width == 0 || raster.height == 0 {
            return Err(Error::InvalidData("Raster has no pixel data".to_string()));
        }

        let width = usize_to_u32(raster.width)?;
        let height = usize_to_u32(raster.height)?;

        let compression = match self.compression {
            GeoTiffCompression::None => Compression::Uncompressed,
            GeoTiffCompression::Lzw => Compression::Lzw,
            GeoTiffCompression::Deflate => Compression::Deflate(tiff::encoder::DeflateLevel::Fast),
        };

        let encoder = TiffEncoder::new(writer)?.with_compression(compression);
        self.write_image(encoder, width, height)
    }

    fn write_image<W: Write + Seek>(
        &self,
        mut encoder: TiffEncoder<W>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        use SampleType as S;

        let encoder = &mut encoder;
        match (self.raster.bands, self.raster.sample_type) {
            (1, S::U8) => self.write_typed_image::<Gray8, W>(encoder, width, height),
            (1, S::U16) => self.write_typed_image::<Gray16, W>(encoder, width, height),
            (1, S::U32) => self.write_typed_image::<Gray32, W>(encoder, width, height),
            (1, S::U64) => self.write_typed_image::<Gray64, W>(encoder, width, height),
            (1, S::I8) => self.write_typed_image::<GrayI8, W>(encoder, width, height),
            (1, S::I16) => self.write_typed_image::<GrayI16, W>(encoder, width, height),
            (1, S::I32) => self.write_typed_image::<GrayI32, W>(encoder, width, height),
            (1, S::I64) => self.write_typed_image::<GrayI64, W>(encoder, width, height),
            (1, S::F32) => self.write_typed_image::<Gray32Float, W>(encoder, width, height),
            (1, S::F64) => self.write_typed_image::<Gray64Float, W>(encoder, width, height),
            (3, S::U8) => self.write_typed_image::<RGB8, W>(encoder, width, height),
            (3, S::U16) => self.write_typed_image::<RGB16, W>(encoder, width, height),
            (3, S::U32) => self.write_typed_image::<RGB32, W>(encoder, width, height),
            (3, S::U64) => self.write_typed_image::<RGB64, W>(encoder, width, height),
            (3, S::F32) => self.write_typed_image::<RGB32Float, W>(encoder, width, height),
            (3, S::F64) => self.write_typed_image::<RGB64Float, W>(encoder, width, height),
            (4, S::U8) => self.write_typed_image::<RGBA8, W>(encoder, width, height),
            (4, S::U16) => self.write_typed_image::<RGBA16, W>(encoder, width, height),
            (4, S::U32) => self.write_typed_image::<RGBA32, W>(encoder, width, height),
            (4, S::U64) => self.write_typed_image::<RGBA64, W>(encoder, width, height),
            (4, S::F32) => self.write_typed_image::<RGBA32Float, W>(encoder, width, height),
            (4, S::F64) => self.write_typed_image::<RGBA64Float, W>(encoder, width, height),
            (_, S::U8) => self.write_multiband_image::<u8, W>(encoder, width, height),
            (_, S::U16) => self.write_multiband_image::<u16, W>(encoder, width, height),
            (_, S::U32) => self.write_multiband_image::<u32, W>(encoder, width, height),
            (_, S::U64) => self.write_multiband_image::<u64, W>(encoder, width, height),
            (_, S::I8) => self.write_multiband_image::<i8, W>(encoder, width, height),
            (_, S::I16) => self.write_multiband_image::<i16, W>(encoder, width, height),
            (_, S::I32) => self.write_multiband_image::<i32, W>(encoder, width, height),
            (_, S::I64) => self.write_multiband_image::<i64, W>(encoder, width, height),
            (_, S::F32) => self.write_multiband_image::<f32, W>(encoder, width, height),
            (_, S::F64) => self.write_multiband_image::<f64, W>(encoder, width, height),
        }
    }

    /// Layouts with a matching TIFF color type, compressed as configured.
    fn write_typed_image<C, W>(&self, encoder: &mut TiffEncoder<W>, width: u32, height: u32) -> Result<()>
    where
        C: ColorType,
        C::Inner: Narrow,
        [C::Inner]: TiffValue,
        W: Write + Seek,
    {
        let samples: Vec<C::Inner> = narrow_samples(&self.raster.pixels);
        let mut image = encoder.new_image::<C>(width, height)?;
        self.write_geotiff_tags(image.encoder())?;
        image.write_data(&samples)?;
        Ok(())
    }

    /// Any other layout: one uncompressed chunky strip.
    fn write_multiband_image<T, W>(&self, encoder: &mut TiffEncoder<W>, width: u32, height: u32) -> Result<()>
    where
        T: Narrow,
        [T]: TiffValue,
        W: Write + Seek,
    {
        let bands = self.raster.bands;
        let sample_type = self.raster.sample_type;
        let samples_per_pixel = u16::try_from(bands)
            .map_err(|_| Error::InvalidData(format!("{bands} bands exceed the TIFF sample limit")))?;

        let mut dir = encoder.image_directory()?;

        dir.write_tag(Tag::ImageWidth, width)?;
        dir.write_tag(Tag::ImageLength, height)?;

        let bits_per_sample: Vec<u16> = vec![sample_type.bits(); bands];
        dir.write_tag(Tag::BitsPerSample, bits_per_sample.as_slice())?;
        dir.write_tag(Tag::Compression, 1u16)?;
        // BlackIsZero
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, samples_per_pixel)?;
        let sample_format: Vec<u16> = vec![sample_type.sample_format(); bands];
        dir.write_tag(Tag::SampleFormat, sample_format.as_slice())?;
        // Chunky (pixel-interleaved)
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::RowsPerStrip, height)?;

        // Bands past the first are unspecified extra samples
        if bands > 1 {
            let extra_samples: Vec<u16> = vec![0; bands - 1];
            dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
        }

        self.write_geotiff_tags(&mut dir)?;

        let samples: Vec<T> = narrow_samples(&self.raster.pixels);
        let byte_count = samples.len() * std::mem::size_of::<T>();

        let strip_offset = dir.write_data(samples.as_slice())?;
        let strip_offset = u32::try_from(strip_offset)
            .map_err(|_| Error::InvalidData("Strip offset exceeds classic TIFF range".to_string()))?;
        dir.write_tag(Tag::StripOffsets, strip_offset)?;
        dir.write_tag(Tag::StripByteCounts, usize_to_u32(byte_count)?)?;

        dir.finish()?;
        Ok(())
    }

    fn write_geotiff_tags<W: Write + Seek, K: tiff::encoder::TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> Result<()> {
        let raster = self.raster;
        let gt = &raster.transform;

        if gt.is_north_up() {
            // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
            let pixel_scale = [gt.pixel_width, -gt.pixel_height, 0.0];
            dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), pixel_scale.as_slice())?;

            // ModelTiepoint: [I, J, K, X, Y, Z], pixel (0, 0) to the upper-left corner
            let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
            dir.write_tag(Tag::Unknown(MODEL_TIEPOINT_TAG), tiepoint.as_slice())?;
        } else {
            let matrix = gt.to_model_transformation();
            dir.write_tag(Tag::Unknown(MODEL_TRANSFORMATION_TAG), matrix.as_slice())?;
        }

        let geokeys = build_geokey_directory(raster.crs)?;
        dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY_TAG), geokeys.as_slice())?;

        if let Some(nodata) = raster.nodata {
            let text = format_nodata(nodata);
            dir.write_tag(Tag::Unknown(GDAL_NODATA_TAG), text.as_str())?;
        }

        Ok(())
    }
}

/// Conversion from the in-memory `f32` samples to a stored sample type.
///
/// Integer targets round to nearest and saturate at the type's range, NaN
/// becomes 0.
trait Narrow: Copy {
    fn narrow(value: f32) -> Self;
}

macro_rules! impl_narrow_integer {
    ($($t:ty),*) => {
        $(
            impl Narrow for $t {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                fn narrow(value: f32) -> Self {
                    value.round() as $t
                }
            }
        )*
    };
}

impl_narrow_integer!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Narrow for f32 {
    fn narrow(value: f32) -> Self {
        value
    }
}

impl Narrow for f64 {
    fn narrow(value: f32) -> Self {
        f64::from(value)
    }
}

fn narrow_samples<T: Narrow>(pixels: &[f32]) -> Vec<T> {
    pixels.iter().map(|&v| T::narrow(v)).collect()
}

/// Build a GeoKeyDirectory naming `epsg` as the model CRS.
///
/// Layout: `[KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
/// KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]`.
fn build_geokey_directory(epsg: i32) -> Result<Vec<u16>> {
    let code = epsg_to_geokey(epsg)?;
    let is_geographic = is_geographic_crs(epsg);

    let mut keys = vec![1, 1, 0, 3];

    // TIFFTagLocation = 0 means the value is inline
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if is_geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);

    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
    }

    Ok(keys)
}

/// GDAL_NODATA text: integral values without a fraction, others round-trip.
fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else if nodata.is_infinite() {
        let text = if nodata > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        format!("{nodata}")
    }
}

impl Raster {
    /// Write an uncompressed GeoTIFF to `path`.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write`].
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        GeoTiffWriter::new(self).write(path)
    }

    /// Writer with configurable compression.
    #[must_use]
    pub fn geotiff_writer(&self) -> GeoTiffWriter<'_> {
        GeoTiffWriter::new(self)
    }

    /// Encode into an in-memory GeoTIFF.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write_to`].
    pub fn to_geotiff_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        GeoTiffWriter::new(self).write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoTransform;
    use crate::geotiff_reader::{read_geotiff, read_geotiff_from_bytes};

    fn create_test_raster(bands: usize, width: usize, height: usize) -> Raster {
        #[allow(clippy::cast_precision_loss)]
        let pixels: Vec<f32> = (0..width * height * bands)
            .map(|i| (i % 256) as f32)
            .collect();

        Raster::new(
            pixels,
            bands,
            width,
            height,
            32610, // UTM 10N
            GeoTransform::north_up(500_000.0, 4_010_000.0, 10.0, -10.0),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_write_grayscale_geotiff() {
        let raster = create_test_raster(1, 64, 64);
        let bytes = raster.to_geotiff_bytes().unwrap();

        // Check TIFF magic bytes
        assert!(bytes.len() > 8);
        assert!(bytes[0] == b'I' && bytes[1] == b'I' || bytes[0] == b'M' && bytes[1] == b'M');
    }

    #[test]
    fn test_roundtrip_preserves_georeferencing() {
        let mut raster = create_test_raster(1, 16, 8);
        raster.nodata = Some(-1.0);
        raster.pixels[0] = -1.0;

        let back = read_geotiff_from_bytes(&raster.to_geotiff_bytes().unwrap()).unwrap();
        assert_eq!((back.width, back.height, back.bands), (16, 8, 1));
        assert_eq!(back.crs, 32610);
        assert_eq!(back.transform, raster.transform);
        assert_eq!(back.nodata, Some(-1.0));
        assert_eq!(back.pixels, raster.pixels);
    }

    #[test]
    fn test_roundtrip_rotated_transform() {
        let mut raster = create_test_raster(1, 4, 4);
        raster.transform = GeoTransform::from_gdal([100.0, 2.0, 0.5, 200.0, 0.25, -2.0]);

        let back = read_geotiff_from_bytes(&raster.to_geotiff_bytes().unwrap()).unwrap();
        assert_eq!(back.transform, raster.transform);
    }

    #[test]
    fn test_roundtrip_rgb_band_counts() {
        for bands in [3, 4] {
            let raster = create_test_raster(bands, 6, 5);
            let back = read_geotiff_from_bytes(&raster.to_geotiff_bytes().unwrap()).unwrap();
            assert_eq!(back.bands, bands, "band count for {bands}-band raster");
            assert_eq!(back.pixels, raster.pixels, "pixels for {bands}-band raster");
        }
    }

    #[test]
    fn test_multiband_geotiff() {
        for bands in [2, 5, 16] {
            let mut raster = create_test_raster(bands, 10, 10);
            raster.nodata = Some(-1.0);
            raster.pixels[bands] = -1.0;

            let back = read_geotiff_from_bytes(&raster.to_geotiff_bytes().unwrap()).unwrap();
            assert_eq!((back.width, back.height, back.bands), (10, 10, bands), "{bands}-band raster");
            assert_eq!(back.crs, 32610, "{bands}-band raster");
            assert_eq!(back.transform, raster.transform, "{bands}-band raster");
            assert_eq!(back.nodata, Some(-1.0), "{bands}-band raster");
            assert_eq!(back.pixels, raster.pixels, "{bands}-band raster");
            assert_eq!(back.band(bands).unwrap(), raster.band(bands).unwrap());
        }
    }

    #[test]
    fn test_sample_type_survives_roundtrip() {
        let cases = [
            (1, SampleType::U8),
            (1, SampleType::I16),
            (1, SampleType::U32),
            (1, SampleType::F64),
            (3, SampleType::U8),
            (3, SampleType::I16),
            (4, SampleType::U16),
            (2, SampleType::U8),
            (5, SampleType::I32),
        ];
        for (bands, sample_type) in cases {
            let raster = create_test_raster(bands, 4, 3).with_sample_type(sample_type);
            let back = read_geotiff_from_bytes(&raster.to_geotiff_bytes().unwrap()).unwrap();
            assert_eq!(back.sample_type, sample_type, "{bands} x {sample_type:?}");
            assert_eq!(back.bands, bands, "{bands} x {sample_type:?}");
            assert_eq!(back.pixels, raster.pixels, "{bands} x {sample_type:?}");
        }
    }

    #[test]
    fn test_u8_is_written_as_gray8() {
        let raster = create_test_raster(1, 8, 8).with_sample_type(SampleType::U8);
        let bytes = raster.to_geotiff_bytes().unwrap();
        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(decoder.colortype().unwrap(), tiff::ColorType::Gray(8));

        // One byte per sample instead of four
        let float_bytes = create_test_raster(1, 8, 8).to_geotiff_bytes().unwrap();
        assert!(bytes.len() + 3 * 64 <= float_bytes.len(), "{} vs {}", bytes.len(), float_bytes.len());
    }

    #[test]
    fn test_narrowing_rounds_and_saturates() {
        assert_eq!(narrow_samples::<u8>(&[0.4, 0.6, 254.5, 300.0, -5.0, f32::NAN]), vec![0, 1, 255, 255, 0, 0]);
        assert_eq!(narrow_samples::<i16>(&[-9999.0, -1.5, 40_000.0]), vec![-9999, -2, i16::MAX]);
        assert_eq!(narrow_samples::<f64>(&[0.5]), vec![0.5]);
    }

    #[test]
    fn test_write_compressed() {
        let raster = create_test_raster(1, 128, 128);
        for compression in [GeoTiffCompression::Lzw, GeoTiffCompression::Deflate] {
            let mut buffer = std::io::Cursor::new(Vec::new());
            raster.geotiff_writer().compression(compression).write_to(&mut buffer).unwrap();
            let back = read_geotiff_from_bytes(buffer.get_ref()).unwrap();
            assert_eq!(back.pixels, raster.pixels, "{compression:?}");
        }
    }

    #[test]
    fn test_geokey_directory_projected() {
        let geokeys = build_geokey_directory(32610).unwrap();

        assert_eq!(&geokeys[..4], &[1, 1, 0, 3]);
        assert_eq!(geokeys[4], GT_MODEL_TYPE_GEO_KEY);
        assert_eq!(geokeys[7], MODEL_TYPE_PROJECTED);
        assert_eq!(geokeys[12], PROJECTED_CS_TYPE_GEO_KEY);
        assert_eq!(geokeys[15], 32610);
    }

    #[test]
    fn test_geokey_directory_geographic() {
        let geokeys = build_geokey_directory(4326).unwrap();

        assert_eq!(geokeys[7], MODEL_TYPE_GEOGRAPHIC);
        assert_eq!(geokeys[12], GEOGRAPHIC_TYPE_GEO_KEY);
        assert_eq!(geokeys[15], 4326);
    }

    #[test]
    fn test_empty_raster_error() {
        let raster = Raster {
            pixels: vec![],
            bands: 1,
            width: 0,
            height: 0,
            crs: 32610,
            transform: GeoTransform::north_up(0.0, 0.0, 1.0, -1.0),
            nodata: None,
            sample_type: SampleType::F32,
        };

        assert!(raster.to_geotiff_bytes().is_err());
    }

    #[test]
    fn test_format_nodata() {
        assert_eq!(format_nodata(-1.0), "-1");
        assert_eq!(format_nodata(255.0), "255");
        assert_eq!(format_nodata(-9999.5), "-9999.5");
        assert_eq!(format_nodata(f64::NAN), "nan");
    }

    #[test]
    fn test_write_to_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        std::fs::write(&path, b"stale").unwrap();

        let raster = create_test_raster(1, 8, 8);
        raster.write_geotiff(&path).unwrap();

        let back = read_geotiff(&path).unwrap();
        assert_eq!((back.width, back.height), (8, 8));
    }
}
