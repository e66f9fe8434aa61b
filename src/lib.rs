#![doc = include_str!("../README.md")]
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`geotiff_reader`]: Decode GeoTIFF files into a [`Raster`]
//! - [`reproject`]: Default-transform calculation and resampling with the [`Reprojector`] builder
//! - [`geotiff_writer`]: Write rasters to GeoTIFF files
//! - [`colormap`]: Turbo and grayscale lookup tables
//! - [`colorize`]: Render band 1 to RGBA with the [`Colorizer`] builder
//! - [`pipeline`]: The reproject-then-colorize run driven by a [`PipelineConfig`]
//! - [`geometry`]: Bounds, affine transforms ([`GeoTransform`]) and projections

// ============================================================================
// Public modules
// ============================================================================

pub mod casting;
pub mod colorize;
pub mod colormap;
pub mod config;
pub mod error;
pub mod geometry;
pub mod geotiff_reader;
pub mod geotiff_writer;
pub mod logger;
pub mod pipeline;
pub mod raster;
pub mod reproject;

// ============================================================================
// Errors
// ============================================================================

pub use error::{Error, Result};

// ============================================================================
// Raster Data
// ============================================================================

pub use raster::{Raster, SampleType};
pub use geotiff_reader::{read_geotiff, read_geotiff_from_bytes};

// ============================================================================
// Raster Reprojection
// ============================================================================
// Primary API: Reprojector::new(&raster).to_crs(...).reproject()

pub use reproject::{
    calculate_default_transform,
    DefaultTransform,
    Reprojector,
    ResamplingMethod,
};

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::{BoundingBox, GeoTransform, MapBounds};
pub use geometry::projection::{
    project_point,
    get_proj_string,
    is_geographic_crs,
    CoordTransformer,
    WGS84,
};

// ============================================================================
// Rendering
// ============================================================================

pub use colormap::Colormap;
pub use colorize::{colorize, save_png, value_range, Colorizer, ValueRange};

// ============================================================================
// Pipeline
// ============================================================================

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use pipeline::{Pipeline, PipelineReport};

// ============================================================================
// GeoTIFF Writing
// ============================================================================

pub use geotiff_writer::{
    GeoTiffCompression,
    GeoTiffWriter,
};
