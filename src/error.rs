//! Error types for the reprojection and rendering pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, reprojecting, or rendering a raster.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// PNG encoding error
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Coordinate transformation failed
    #[error("Projection error: {0}")]
    Projection(String),

    /// The raster has no usable coordinate reference system
    #[error("Raster {} has no coordinate reference system", .0.display())]
    MissingCrs(PathBuf),

    /// The raster has no affine transform tags
    #[error("Raster {} has no geotransform", .0.display())]
    MissingTransform(PathBuf),

    /// EPSG code is unknown or cannot be encoded
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    /// Pixel layout or sample type the reader cannot decode
    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Requested band index (1-based) is not present
    #[error("Band {band} not found (raster has {count} band(s))")]
    BandNotFound { band: usize, count: usize },

    /// Raster contents are inconsistent with its declared shape
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;
