//! quirk CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use quirk::{config::Settings, error::Result, progress::LogWriterFactory, shell};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "quirk")]
#[command(version, about = "Client for the quirk embedding pipeline", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Backend base URL (overrides the config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Authenticate with this email at startup
    #[arg(long)]
    email: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle completions (doesn't need config or a session)
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "quirk", &mut std::io::stdout());
        return Ok(());
    }

    let mut settings = Settings::load_or_default(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }
    if let Some(email) = cli.email {
        settings.email = Some(email);
    }

    shell::run(settings).await
}
