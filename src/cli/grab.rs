//! `grab` command.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use console::style;

use listacquire::{AcquisitionResult, ChromiumLauncher, GrabMode, ScrapeOrchestrator, Settings};

use super::OutputFormat;

/// Flag values that take precedence over config and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub first_batch_only: bool,
    pub timeout_ms: Option<u64>,
    pub headed: bool,
    pub remote_url: Option<String>,
}

pub fn apply_overrides(settings: &mut Settings, overrides: Overrides) {
    if overrides.first_batch_only {
        settings.grab_mode = GrabMode::FirstBatch;
    }
    if let Some(ms) = overrides.timeout_ms {
        settings.timeout = Duration::from_millis(ms);
    }
    if overrides.headed {
        settings.browser.headless = false;
    }
    if overrides.remote_url.is_some() {
        settings.browser.remote_url = overrides.remote_url;
    }
}

pub async fn cmd_grab(settings: Settings, user_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let launcher = ChromiumLauncher::new(settings.browser.clone());
    let orchestrator = ScrapeOrchestrator::new(launcher, settings);

    let result = orchestrator.grab(user_id).await?;

    let output = render(&result, format)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("Failed to write output")?;

    let owner = result.owner.as_deref().unwrap_or("unknown owner");
    eprintln!(
        "{} {} identifiers from {}",
        style("✓").green(),
        result.len(),
        owner
    );
    Ok(())
}

fn render(result: &AcquisitionResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Lines => {
            let mut out = String::new();
            for id in &result.identifiers {
                out.push_str(id.as_str());
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(result)?;
            out.push('\n');
            Ok(out)
        }
    }
}
