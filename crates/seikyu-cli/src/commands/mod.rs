//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod extract;

use std::path::Path;

use seikyu_core::{ExtractorConfig, InvoiceFieldExtractor};

/// Build the coordinator from an optional config file path.
pub fn build_extractor(config_path: Option<&str>) -> anyhow::Result<InvoiceFieldExtractor> {
    let config = match config_path {
        Some(path) => ExtractorConfig::from_file(Path::new(path))?,
        None => ExtractorConfig::default(),
    };
    Ok(InvoiceFieldExtractor::with_config(config)?)
}
