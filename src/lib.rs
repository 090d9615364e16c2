pub mod ages;
pub mod canonical;
pub mod categories;
pub mod config;
pub mod dates;
pub mod dedupe;
pub mod error;
pub mod merge;
pub mod models;
pub mod paths;
pub mod scraping;
pub mod site;
pub mod text;
pub mod utils;

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

pub use config::CatalogConfig;
pub use dedupe::Deduper;
pub use error::{CatalogError, Result};
pub use models::Event;

/// Raw scraped records from a JSON array file. A missing file reads as an
/// empty list; a top-level value that is not an array is logged and
/// ignored.
pub fn load_raw_events(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        warn!(path = %path.display(), "no scraped data found");
        return Ok(Vec::new());
    }
    let contents = utils::read_text(path)?;
    let value: Value =
        serde_json::from_str(&contents).map_err(|err| CatalogError::json(path, err))?;
    match value {
        Value::Array(records) => Ok(records),
        other => {
            warn!(path = %path.display(), "expected a json array, found {}", dedupe::value_kind(&other));
            Ok(Vec::new())
        }
    }
}

pub fn save_events(events: &[Event], path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(events).map_err(|err| CatalogError::json(path, err))?;
    utils::write_text(path, &json)?;
    info!(count = events.len(), path = %path.display(), "saved events");
    Ok(())
}

/// Runs the dedupe pipeline over raw records with the configured rules.
pub fn build_catalog(raw: &[Value], config: &CatalogConfig) -> Result<Vec<Event>> {
    Ok(Deduper::from_config(config)?.dedupe(raw))
}

/// Scrapes every built-in source (or just `source`) and returns the
/// probable events, not yet deduplicated.
pub fn scrape(config: &CatalogConfig, source: Option<&str>) -> anyhow::Result<Vec<Event>> {
    let extractors = scraping::Extractors::from_config(config)?;
    match source {
        Some(id) => {
            if !scraping::list_scrapers().iter().any(|info| info.id == id) {
                return Err(CatalogError::UnknownSource(id.to_string()).into());
            }
            scraping::run_single(id, &extractors)
        }
        None => scraping::run_all(&extractors),
    }
}

/// Loads raw records, deduplicates them and renders the site.
pub fn build_from_file(input: &Path, out_dir: &Path, config: &CatalogConfig) -> Result<usize> {
    let raw = load_raw_events(input)?;
    let events = build_catalog(&raw, config)?;
    site::build_site(&events, raw.len(), out_dir, config)?;
    Ok(events.len())
}
