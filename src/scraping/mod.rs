pub mod base;
pub mod jsonld;
pub mod venue;

use anyhow::Error;
use tracing::{info, warn};

use crate::ages::AgeRules;
use crate::categories::CategoryRules;
use crate::config::CatalogConfig;
use crate::dates::DateParser;
use crate::error::Result;
use crate::models::Event;

/// The configured date, age and category rules every adapter extracts with.
#[derive(Debug, Clone)]
pub struct Extractors {
    pub dates: DateParser,
    pub ages: AgeRules,
    pub categories: CategoryRules,
    pub blocked_titles: Vec<String>,
}

impl Extractors {
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let dates = DateParser::from_config(config)?;
        Ok(Self::with_dates(config, dates))
    }

    /// Same as [`Extractors::from_config`] but pinned to a reference year.
    pub fn for_year(config: &CatalogConfig, year: i32) -> Result<Self> {
        let dates = DateParser::new(
            config.tz()?,
            year,
            config.year_window_back,
            config.year_window_forward,
        );
        Ok(Self::with_dates(config, dates))
    }

    fn with_dates(config: &CatalogConfig, dates: DateParser) -> Self {
        Self {
            dates,
            ages: AgeRules::new(config.age_ceiling),
            categories: CategoryRules::from_config(config),
            blocked_titles: config
                .blocked_titles
                .iter()
                .map(|title| title.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn is_blocked_title(&self, title: &str) -> bool {
        let lowered = title.trim().to_lowercase();
        self.blocked_titles.iter().any(|blocked| *blocked == lowered)
    }
}

pub trait VenueScraper: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn source_name(&self) -> &'static str;
    fn source_url(&self) -> &'static str;
    fn fetch(&self, extractors: &Extractors) -> anyhow::Result<Vec<Event>>;
}

#[derive(Clone, serde::Serialize)]
pub struct ScraperInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

fn active_scrapers() -> Vec<Box<dyn VenueScraper>> {
    venue::VENUES
        .iter()
        .map(|config| Box::new(venue::ListingScraper::new(config)) as Box<dyn VenueScraper>)
        .collect()
}

pub fn list_scrapers() -> Vec<ScraperInfo> {
    active_scrapers()
        .into_iter()
        .map(|scraper| ScraperInfo {
            id: scraper.source_id().to_string(),
            name: scraper.source_name().to_string(),
            url: scraper.source_url().to_string(),
        })
        .collect()
}

fn find_scraper(id: &str) -> Option<Box<dyn VenueScraper>> {
    active_scrapers()
        .into_iter()
        .find(|scraper| scraper.source_id() == id)
}

/// A record worth keeping: it has a title and the title is not a
/// navigation heading.
pub fn is_probable_event(event: &Event, extractors: &Extractors) -> bool {
    let title = event.title.trim();
    !title.is_empty() && !extractors.is_blocked_title(title)
}

pub fn run_all(extractors: &Extractors) -> anyhow::Result<Vec<Event>> {
    let mut events = Vec::new();
    let mut errors: Vec<(String, Error)> = Vec::new();

    for scraper in active_scrapers() {
        let source_id = scraper.source_id().to_string();
        match scraper.fetch(extractors) {
            Ok(scraped) => {
                let before = scraped.len();
                events.extend(
                    scraped
                        .into_iter()
                        .filter(|event| is_probable_event(event, extractors)),
                );
                info!(source = %source_id, scraped = before, "source finished");
            }
            Err(err) => {
                warn!(source = %source_id, error = %err, "source failed");
                errors.push((source_id, err));
            }
        }
    }

    if events.is_empty() && !errors.is_empty() {
        let joined = errors
            .into_iter()
            .map(|(id, err)| format!("{id}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow::anyhow!("scrapers failed: {joined}"));
    }

    Ok(events)
}

pub fn run_single(id: &str, extractors: &Extractors) -> anyhow::Result<Vec<Event>> {
    let scraper = find_scraper(id).ok_or_else(|| anyhow::anyhow!("unknown source id: {id}"))?;
    let events = scraper.fetch(extractors)?;
    Ok(events
        .into_iter()
        .filter(|event| is_probable_event(event, extractors))
        .collect())
}
