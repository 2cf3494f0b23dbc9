//! image-factory - resolve build settings for unattended OS images.
//!
//! Reads the layered config, applies command-line overrides and prints the
//! settings each requested image would be built with.

use anyhow::{Context, Result};
use clap::Parser;

use image_factory::cli::Cli;
use image_factory::config::{BuildSettings, ConfigLoader};
use image_factory::logging;

fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "warn" })?;

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load()?;
    cli.overrides().apply(&mut config);

    let settings = cli
        .images
        .iter()
        .map(|image| BuildSettings::from_config(&config, image))
        .collect::<Result<Vec<_>, _>>()?;

    if cli.json {
        let json = serde_json::to_string_pretty(&settings).context("Failed to encode settings")?;
        println!("{json}");
    } else {
        for (i, image) in settings.iter().enumerate() {
            if i > 0 {
                println!();
            }
            image.print();
        }
    }

    Ok(())
}
