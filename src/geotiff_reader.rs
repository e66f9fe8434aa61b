//! GeoTIFF reader producing an in-memory [`Raster`].
//!
//! Pure Rust (the `tiff` crate, no GDAL). Understands the subset of GeoTIFF
//! needed to place a raster on the globe:
//!
//! - `ModelPixelScale` + `ModelTiepoint`, or `ModelTransformation`
//! - `ProjectedCSTypeGeoKey` / `GeographicTypeGeoKey` EPSG codes
//! - GDAL's `GDAL_NODATA` ASCII tag
//!
//! Samples of any integer or float type are widened to `f32` and the source
//! type is kept in [`Raster::sample_type`]. Multi-band files may be
//! pixel-interleaved or band-sequential (`PlanarConfiguration` 1 or 2).

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::casting::{u32_to_usize, usize_to_u32};
use crate::error::{Error, Result};
use crate::geometry::GeoTransform;
use crate::raster::{Raster, SampleType};

pub(crate) const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
pub(crate) const MODEL_TIEPOINT_TAG: u16 = 33922;
pub(crate) const MODEL_TRANSFORMATION_TAG: u16 = 34264;
pub(crate) const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
pub(crate) const GDAL_NODATA_TAG: u16 = 42113;

pub(crate) const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub(crate) const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// GeoKey value meaning "user-defined", i.e. no EPSG code
const USER_DEFINED: u16 = 32767;

/// Read a GeoTIFF file into a [`Raster`].
///
/// # Errors
/// Fails if the file cannot be opened or decoded, or if it lacks a CRS or
/// geotransform.
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let raster = decode_geotiff(BufReader::new(file), path)?;
    debug!(
        path = %path.display(),
        width = raster.width,
        height = raster.height,
        bands = raster.bands,
        sample_type = ?raster.sample_type,
        crs = raster.crs,
        nodata = ?raster.nodata,
        "Read GeoTIFF"
    );
    Ok(raster)
}

/// Decode a GeoTIFF from an in-memory buffer.
///
/// # Errors
/// Same conditions as [`read_geotiff`].
pub fn read_geotiff_from_bytes(data: &[u8]) -> Result<Raster> {
    decode_geotiff(std::io::Cursor::new(data), Path::new("<memory>"))
}

fn decode_geotiff<R: Read + Seek>(reader: R, origin: &Path) -> Result<Raster> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let width = u32_to_usize(width)?;
    let height = u32_to_usize(height)?;

    // Georeferencing tags live in the first IFD; read them before the pixels
    let transform = read_transform(&mut decoder).ok_or_else(|| Error::MissingTransform(origin.to_path_buf()))?;
    let crs = read_epsg(&mut decoder, origin)?;
    let nodata = read_nodata(&mut decoder);

    let planar = matches!(decoder.get_tag_u32(Tag::PlanarConfiguration), Ok(2));
    let (pixels, sample_type) = if planar {
        let bands = u32_to_usize(decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1))?;
        read_planar(&mut decoder, width, height, bands)?
    } else {
        widen_samples(decoder.read_image()?)?
    };

    let plane = width * height;
    if plane == 0 || pixels.len() % plane != 0 {
        return Err(Error::InvalidData(format!(
            "{} samples do not fill a {width}x{height} grid",
            pixels.len()
        )));
    }
    let bands = pixels.len() / plane;

    Ok(Raster::new(pixels, bands, width, height, crs, transform, nodata)?.with_sample_type(sample_type))
}

/// Read a band-sequential image chunk by chunk and interleave it by pixel.
///
/// `Decoder::read_image` only returns the first plane of such files. Chunks
/// are stored plane after plane, each plane split into the same strip or
/// tile grid.
fn read_planar<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
    bands: usize,
) -> Result<(Vec<f32>, SampleType)> {
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    let chunk_width = u32_to_usize(chunk_width)?;
    let chunk_height = u32_to_usize(chunk_height)?;
    if chunk_width == 0 || chunk_height == 0 {
        return Err(Error::InvalidData("Zero-sized TIFF chunk".to_string()));
    }
    let across = width.div_ceil(chunk_width);
    let per_plane = across * height.div_ceil(chunk_height);

    let mut pixels = vec![0.0f32; width * height * bands];
    let mut sample_type = SampleType::default();

    for band in 0..bands {
        for chunk in 0..per_plane {
            let index = usize_to_u32(band * per_plane + chunk)?;
            let stride = u32_to_usize(decoder.chunk_data_dimensions(index).0)?;
            let (values, kind) = widen_samples(decoder.read_chunk(index)?)?;
            sample_type = kind;

            let x0 = (chunk % across) * chunk_width;
            let y0 = (chunk / across) * chunk_height;
            for (dy, row) in values.chunks(stride.max(1)).enumerate() {
                let y = y0 + dy;
                if y >= height {
                    break;
                }
                for (dx, &value) in row.iter().enumerate().take(width.saturating_sub(x0)) {
                    pixels[(y * width + x0 + dx) * bands + band] = value;
                }
            }
        }
    }

    debug!(bands, chunks = per_plane * bands, "Interleaved planar GeoTIFF");
    Ok((pixels, sample_type))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE_TAG)).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT_TAG)).ok();
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if let Some(transform) = GeoTransform::from_tiepoint_and_scale(&tiepoint, &scale) {
            return Some(transform);
        }
    }

    decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION_TAG))
        .ok()
        .and_then(|matrix| GeoTransform::from_model_transformation(&matrix))
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>, origin: &Path) -> Result<i32> {
    let Ok(directory) = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY_TAG)) else {
        return Err(Error::MissingCrs(origin.to_path_buf()));
    };
    epsg_from_geokeys(&directory, origin)
}

/// Find the EPSG code in a GeoKeyDirectory.
///
/// The directory is a header `[version, revision, minor, count]` followed by
/// `count` entries of `[key_id, tag_location, value_count, value]`. Only
/// inline values (`tag_location == 0`) can carry an EPSG code.
fn epsg_from_geokeys(directory: &[u16], origin: &Path) -> Result<i32> {
    let missing = || Error::MissingCrs(PathBuf::from(origin));
    let count = usize::from(*directory.get(3).ok_or_else(missing)?);

    let lookup = |wanted: u16| {
        directory[4..]
            .chunks_exact(4)
            .take(count)
            .find(|entry| entry[0] == wanted && entry[1] == 0)
            .map(|entry| entry[3])
    };

    // A projected CRS wins over the geographic CRS it is based on
    let code = lookup(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
        .ok_or_else(missing)?;

    if code == USER_DEFINED {
        return Err(Error::UnsupportedCrs(format!(
            "{} uses a user-defined CRS without an EPSG code",
            origin.display()
        )));
    }
    Ok(i32::from(code))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::Unknown(GDAL_NODATA_TAG)).ok()?;
    parse_nodata(&text)
}

fn parse_nodata(text: &str) -> Option<f64> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match trimmed.to_ascii_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => trimmed.parse().ok(),
    }
}

/// Widen decoded samples to `f32`, reporting the type they were stored as.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn widen_samples(result: DecodingResult) -> Result<(Vec<f32>, SampleType)> {
    let widened = match result {
        DecodingResult::U8(buf) => (buf.into_iter().map(f32::from).collect(), SampleType::U8),
        DecodingResult::U16(buf) => (buf.into_iter().map(f32::from).collect(), SampleType::U16),
        DecodingResult::U32(buf) => (buf.into_iter().map(|v| v as f32).collect(), SampleType::U32),
        DecodingResult::U64(buf) => (buf.into_iter().map(|v| v as f32).collect(), SampleType::U64),
        DecodingResult::I8(buf) => (buf.into_iter().map(f32::from).collect(), SampleType::I8),
        DecodingResult::I16(buf) => (buf.into_iter().map(f32::from).collect(), SampleType::I16),
        DecodingResult::I32(buf) => (buf.into_iter().map(|v| v as f32).collect(), SampleType::I32),
        DecodingResult::I64(buf) => (buf.into_iter().map(|v| v as f32).collect(), SampleType::I64),
        DecodingResult::F32(buf) => (buf, SampleType::F32),
        DecodingResult::F64(buf) => (buf.into_iter().map(|v| v as f32).collect(), SampleType::F64),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedSampleFormat(
                "unsupported TIFF sample type".to_string(),
            ))
        }
    };
    Ok(widened)
}
