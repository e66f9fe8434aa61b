//! Pipeline configuration.

use std::path::PathBuf;

use crate::colormap::Colormap;
use crate::geometry::projection::WGS84;
use crate::geotiff_writer::GeoTiffCompression;
use crate::reproject::ResamplingMethod;

/// Source raster read when no input path is configured.
pub const DEFAULT_INPUT: &str = "thz_class_ENSEMBLE_rcp8p5_2020s.tif";
/// Reprojected GeoTIFF written between the two stages.
pub const DEFAULT_INTERMEDIATE: &str = "thz_4326.tif";
/// Final PNG overlay.
pub const DEFAULT_OUTPUT: &str = "thz_4326.png";

/// Configuration for the reproject-then-colorize pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Source GeoTIFF
    pub input: PathBuf,
    /// Reprojected GeoTIFF, overwritten on every run
    pub intermediate: PathBuf,
    /// RGBA PNG, overwritten on every run
    pub output: PathBuf,
    /// EPSG code of the output CRS
    pub target_crs: i32,
    pub resampling: ResamplingMethod,
    pub colormap: Colormap,
    /// Compression of the intermediate GeoTIFF
    pub compression: GeoTiffCompression,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            intermediate: PathBuf::from(DEFAULT_INTERMEDIATE),
            output: PathBuf::from(DEFAULT_OUTPUT),
            target_crs: WGS84,
            resampling: ResamplingMethod::Nearest,
            colormap: Colormap::Turbo,
            compression: GeoTiffCompression::None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for [`PipelineConfig`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    input: Option<PathBuf>,
    intermediate: Option<PathBuf>,
    output: Option<PathBuf>,
    target_crs: Option<i32>,
    resampling: Option<ResamplingMethod>,
    colormap: Option<Colormap>,
    compression: Option<GeoTiffCompression>,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    #[must_use]
    pub fn intermediate(mut self, path: impl Into<PathBuf>) -> Self {
        self.intermediate = Some(path.into());
        self
    }

    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    #[must_use]
    pub fn target_crs(mut self, epsg: i32) -> Self {
        self.target_crs = Some(epsg);
        self
    }

    #[must_use]
    pub fn resampling(mut self, method: ResamplingMethod) -> Self {
        self.resampling = Some(method);
        self
    }

    #[must_use]
    pub fn colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = Some(colormap);
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    #[must_use]
    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::default();
        PipelineConfig {
            input: self.input.unwrap_or(default.input),
            intermediate: self.intermediate.unwrap_or(default.intermediate),
            output: self.output.unwrap_or(default.output),
            target_crs: self.target_crs.unwrap_or(default.target_crs),
            resampling: self.resampling.unwrap_or(default.resampling),
            colormap: self.colormap.unwrap_or(default.colormap),
            compression: self.compression.unwrap_or(default.compression),
        }
    }
}
