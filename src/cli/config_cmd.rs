//! `config` command.

use anyhow::Context;
use console::style;

use listacquire::{Config, Settings};

pub fn cmd_config(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    let text = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
    print!("{}", text);
    eprintln!("  {} Source: {}", style("→").dim(), source_label(config));
    Ok(())
}

/// Where the effective settings came from.
fn source_label(config: &Config) -> String {
    config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults (no config file found)".to_string())
}
