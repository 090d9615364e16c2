use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use culture_catalog::{build_from_file, save_events, scrape, CatalogConfig};

/// Culture Catalog - scrape venue listings and build the events site
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (overrides CULTURE_CATALOG_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch events from the venue sites
    Scrape {
        /// Where to write the raw events
        #[arg(short, long, default_value = "data/events.json")]
        out: PathBuf,

        /// Only scrape this source id
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Deduplicate scraped events and render the static site
    Build {
        /// Raw events written by `scrape`
        #[arg(short, long, default_value = "data/events.json")]
        input: PathBuf,

        /// Output directory for the site
        #[arg(short, long, default_value = "site")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    let config = CatalogConfig::load(args.config.as_deref())?;
    debug!(timezone = %config.timezone, "config loaded");

    match args.command {
        Command::Scrape { out, source } => {
            let events = scrape(&config, source.as_deref())?;
            save_events(&events, &out)?;
            info!("Saved {} events to {}", events.len(), out.display());
        }
        Command::Build { input, out } => {
            let count = build_from_file(&input, &out, &config)?;
            info!("Built site with {} events -> {}", count, out.display());
        }
    }
    Ok(())
}
