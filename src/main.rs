use anyhow::{Context, Result};
use thzmap::{logger, Pipeline, PipelineConfig};
use tracing::info;

fn main() -> Result<()> {
    logger::init();

    let config = PipelineConfig::default();
    info!(
        input = %config.input.display(),
        target_crs = config.target_crs,
        resampling = %config.resampling,
        colormap = %config.colormap,
        "Starting thzmap"
    );

    let input = config.input.clone();
    Pipeline::new(config)
        .run()
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    Ok(())
}
