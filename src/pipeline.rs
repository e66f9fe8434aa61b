//! The two-stage conversion: reproject to a GeoTIFF, then render it as PNG.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::colorize::{save_png, Colorizer};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::geometry::MapBounds;
use crate::geotiff_reader::read_geotiff;
use crate::raster::Raster;
use crate::reproject::Reprojector;

/// What a pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Corners of the PNG in the target CRS
    pub bounds: MapBounds,
    /// PNG width in pixels
    pub width: u32,
    /// PNG height in pixels
    pub height: u32,
    pub intermediate: PathBuf,
    pub output: PathBuf,
}

impl PipelineReport {
    /// The `(width, height)` tuple printed on success.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Runs reprojection and colorization with one [`PipelineConfig`].
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run both stages, printing the bounds and success lines to stdout.
    ///
    /// # Errors
    /// Any read, projection, or write failure aborts the run.
    pub fn run(&self) -> Result<PipelineReport> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.run_with_output(&mut handle)
    }

    /// Run both stages, writing the two result lines to `out`.
    ///
    /// The bounds line is written before the PNG is encoded, so a failed
    /// encode still leaves it in `out`.
    ///
    /// # Errors
    /// Any read, projection, or write failure aborts the run.
    pub fn run_with_output<W: Write>(&self, out: &mut W) -> Result<PipelineReport> {
        let started = Instant::now();

        self.reproject()?;

        info!(input = %self.config.intermediate.display(), "Converting to PNG");
        let raster = read_geotiff(&self.config.intermediate)?;
        let bounds = MapBounds::from(raster.bounds());
        writeln!(out, "Use these bounds in your HTML: {bounds}")?;

        let image = Colorizer::new().colormap(self.config.colormap).render(&raster)?;
        save_png(&image, &self.config.output)?;

        let report = PipelineReport {
            bounds,
            width: image.width(),
            height: image.height(),
            intermediate: self.config.intermediate.clone(),
            output: self.config.output.clone(),
        };
        writeln!(
            out,
            "Successfully saved {} with dimensions ({}, {})",
            report.output.display(),
            report.width,
            report.height
        )?;
        out.flush()?;

        info!(elapsed = ?started.elapsed(), "Pipeline complete");
        Ok(report)
    }

    /// Stage one: read the input, reproject every band, write the intermediate GeoTIFF.
    ///
    /// # Errors
    /// Fails if the input cannot be read or reprojected, or the intermediate
    /// cannot be written.
    pub fn reproject(&self) -> Result<Raster> {
        let config = &self.config;
        info!(
            input = %config.input.display(),
            target_crs = config.target_crs,
            "Reprojecting"
        );

        let source = read_geotiff(&config.input)?;
        let reprojected = Reprojector::new(&source)
            .to_crs(config.target_crs)
            .resampling(config.resampling)
            .reproject()?;

        reprojected
            .geotiff_writer()
            .compression(config.compression)
            .write(&config.intermediate)?;
        info!(
            path = %config.intermediate.display(),
            width = reprojected.width,
            height = reprojected.height,
            sample_type = ?reprojected.sample_type,
            "Wrote reprojected GeoTIFF"
        );
        Ok(reprojected)
    }
}
