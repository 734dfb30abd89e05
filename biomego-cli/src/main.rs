//! Biomego CLI
//!
//! Binds the module configuration from flags or environment and invokes one
//! module operation against the podman engine.
//!
//! Operation results go to stdout, logs to stderr.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "biomego")]
#[command(about = "Biome toolchain in a container", long_about = None)]
struct Cli {
    /// Source directory of the project
    #[arg(long, env = "BIOMEGO_SOURCE", default_value = ".")]
    source: PathBuf,

    /// Base image for the toolchain container
    #[arg(long, env = "BIOMEGO_BASE_IMAGE", default_value = biomego::DEFAULT_BASE_IMAGE)]
    base_image: String,

    /// Container CLI to drive (podman or docker)
    #[arg(long, env = "BIOMEGO_ENGINE", default_value = "podman")]
    engine: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biomego=info,biomego_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config {
        source: cli.source,
        base_image: cli.base_image,
        engine: cli.engine,
    };

    handle_command(cli.command, &config).await
}
