//! gobra-ide - LSP bridge for the Gobra verifier
//!
//! Speaks LSP on stdio and connects to a running Gobra server over TCP.

use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, WrapErr};
use gobra_ide::backend::BackendConnection;
use gobra_ide_config::Settings;
use gobra_ide_core::channel;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "gobra_ide=info,gobra_ide_core=info";

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "gobra-ide", version, about)]
struct Args {
    /// Address of the Gobra server
    #[arg(long, env = "GOBRA_SERVER", default_value = "127.0.0.1:8080")]
    backend: String,

    /// Settings file (default: <config dir>/gobra-ide/settings.json)
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the LSP stream
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let settings = load_settings(args.settings)?;

    let (events, queue) = channel();
    let backend = BackendConnection::connect(&args.backend, events.clone())
        .await
        .wrap_err_with(|| format!("Failed to connect to the Gobra server at {}", args.backend))?;

    gobra_ide::bridge::run(backend, settings, events, queue).await
}

/// An explicitly named file must exist; the default one is optional.
fn load_settings(explicit: Option<PathBuf>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Settings::load(&path)
            .wrap_err_with(|| format!("Failed to load settings from {}", path.display()));
    }

    match gobra_ide::default_settings_path() {
        Some(path) if path.exists() => {
            info!("Loading settings from {}", path.display());
            Settings::load(&path)
                .wrap_err_with(|| format!("Failed to load settings from {}", path.display()))
        }
        _ => Ok(Settings::default()),
    }
}
