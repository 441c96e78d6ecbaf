use anyhow::{Context, Result};
use std::path::Path;

use chanmerge_core::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;

    println!("chanmerge configuration\n");
    println!("{}", toml::to_string_pretty(&config)?);

    if config.epg.urls.is_empty() {
        println!("# No EPG sources configured; using {}", chanmerge_core::config::DEFAULT_EPG_URL);
    }

    // Show config file locations
    println!("\nConfig sources (later entries override earlier ones):");
    println!("  1. Built-in defaults");
    match Config::default_config_path() {
        Some(p) => println!("  2. {}", p.display()),
        None => println!("  2. (no user config directory)"),
    }
    if let Some(p) = config_path {
        println!("  3. {} (specified)", p.display());
    }
    println!("  4. Environment variables (CHANMERGE_<SECTION>__<KEY>)");
    println!("  5. Command-line flags");

    Ok(())
}
