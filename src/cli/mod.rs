//! Command-line interface.

mod config_cmd;
mod grab;

use clap::{Parser, Subcommand, ValueEnum};

use listacquire::config::load_settings;

#[derive(Parser)]
#[command(name = "listacquire")]
#[command(about = "Acquire the full ordered ID list from a user's ratings page")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Collect every identifier from a user's ratings list
    Grab {
        /// User ID owning the list (non-alphanumeric characters are stripped)
        user_id: String,
        /// Only collect the first batch instead of scrolling to the end
        #[arg(long)]
        first_batch_only: bool,
        /// Overall deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Connect to an existing browser (e.g. ws://localhost:9222)
        #[arg(long)]
        remote_url: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "lines")]
        format: OutputFormat,
    },

    /// Print the effective settings
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One identifier per line
    Lines,
    /// JSON object with identifiers and owner
    Json,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (mut settings, config) = load_settings().await;

    match cli.command {
        Commands::Grab {
            user_id,
            first_batch_only,
            timeout_ms,
            headed,
            remote_url,
            format,
        } => {
            grab::apply_overrides(
                &mut settings,
                grab::Overrides {
                    first_batch_only,
                    timeout_ms,
                    headed,
                    remote_url,
                },
            );
            grab::cmd_grab(settings, &user_id, format).await
        }
        Commands::Config => config_cmd::cmd_config(&settings, &config),
    }
}
