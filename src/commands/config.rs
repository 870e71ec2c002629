//! Config command handler.
//!
//! Prints the effective configuration: file sources, resolved storage
//! location, and the full TOML of every setting after env overrides.

use compound::config::{CompoundConfig, default_data_dir};

/// Config command.
pub fn cmd_config(config: &CompoundConfig) -> anyhow::Result<()> {
    println!("Current Configuration");
    println!("=====================");
    println!();

    println!("Config File:");
    match CompoundConfig::discover() {
        Some(path) => println!("  - {}", path.display()),
        None => println!("  (none - using defaults)"),
    }
    println!();

    println!("Storage Backend: {}", config.storage.backend);
    println!("Data Directory: {}", config.storage.resolved_data_dir().display());
    if config.storage.data_dir.is_none() {
        println!("  (default: {})", default_data_dir().display());
    }
    println!();

    println!("Settings:");
    let rendered = config.to_toml()?;
    for line in rendered.lines() {
        println!("  {line}");
    }

    Ok(())
}
