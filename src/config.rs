use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categories::Category;
use crate::error::{CatalogError, Result};
use crate::utils;

pub const CONFIG_ENV: &str = "CULTURE_CATALOG_CONFIG";

const DEFAULT_TIMEZONE: &str = "Asia/Singapore";
const DEFAULT_AGE_CEILING: u32 = 17;
const DEFAULT_SLUG_MAX_LEN: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Singapore Social Events Weekly".to_string(),
            description: "Social and cultural events in Singapore across theatre, music, dance, museums, and more.".to_string(),
            base_url: "https://example.github.io/culture-catalog/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub timezone: String,
    pub year_window_back: i32,
    pub year_window_forward: i32,
    pub age_ceiling: u32,
    pub slug_max_len: usize,
    pub source_defaults: BTreeMap<String, Vec<Category>>,
    pub blocked_titles: Vec<String>,
    pub source_labels: BTreeMap<String, String>,
    pub merge_undated_across_urls: bool,
    pub site: SiteConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let mut source_defaults = BTreeMap::new();
        for source in ["sso", "sco"] {
            source_defaults.insert(
                source.to_string(),
                vec![Category::Orchestra, Category::Music],
            );
        }
        for source in [
            "gallery",
            "nhb",
            "acm",
            "sam",
            "artscience",
            "peranakan",
            "ihc",
            "childrensmuseum",
            "changi",
            "bukitchandu",
        ] {
            source_defaults.insert(source.to_string(), vec![Category::Exhibition]);
        }

        let blocked_titles = [
            "what's on",
            "whats on",
            "events",
            "event",
            "programmes",
            "programme",
            "experiences",
            "exhibitions",
            "get the latest from national heritage board",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let source_labels = [
            ("esplanade", "Esplanade"),
            ("sso", "SSO"),
            ("sco", "SCO"),
            ("artshouse", "Arts House Group"),
            ("gallery", "National Gallery"),
            ("nhb", "NHB Museums"),
            ("acm", "Asian Civilisations Museum"),
            ("sam", "Singapore Art Museum"),
            ("artscience", "ArtScience Museum"),
            ("peranakan", "Peranakan Museum"),
            ("ihc", "Indian Heritage Centre"),
            ("childrensmuseum", "Children's Museum Singapore"),
            ("changi", "Changi Chapel & Museum"),
            ("bukitchandu", "Reflections at Bukit Chandu"),
            ("sccc", "Singapore Chinese Cultural Centre"),
            ("gateway", "Gateway Theatre"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            year_window_back: 1,
            year_window_forward: 3,
            age_ceiling: DEFAULT_AGE_CEILING,
            slug_max_len: DEFAULT_SLUG_MAX_LEN,
            source_defaults,
            blocked_titles,
            source_labels,
            merge_undated_across_urls: false,
            site: SiteConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Resolves the config file (explicit path, then env var, then the
    /// per-user location) and falls back to defaults when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(utils::default_config_path);

        let config = match path {
            Some(path) => read_config(&path)?,
            None => CatalogConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.year_window_back < 0 || self.year_window_forward < 0 {
            return Err(CatalogError::Config(
                "year window bounds must not be negative".to_string(),
            ));
        }
        if self.slug_max_len == 0 {
            return Err(CatalogError::Config("slug_max_len must be positive".to_string()));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| CatalogError::UnknownTimezone(self.timezone.clone()))
    }

    pub fn source_label(&self, source: &str) -> String {
        self.source_labels
            .get(source)
            .cloned()
            .unwrap_or_else(|| title_case(source))
    }
}

fn read_config(path: &Path) -> Result<CatalogConfig> {
    if !path.exists() {
        debug!(?path, "config file missing, using defaults");
        return Ok(CatalogConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| CatalogError::io(path, err))?;
    serde_json::from_str(&contents).map_err(|err| CatalogError::json(path, err))
}

fn title_case(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Unknown source".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CatalogConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.tz().unwrap(), chrono_tz::Asia::Singapore);
        assert_eq!(
            config.source_defaults.get("sso"),
            Some(&vec![Category::Orchestra, Category::Music])
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: CatalogConfig =
            serde_json::from_str(r#"{"age_ceiling": 12, "site": {"title": "Kids"}}"#)
                .expect("parse partial config");
        assert_eq!(config.age_ceiling, 12);
        assert_eq!(config.site.title, "Kids");
        assert_eq!(config.slug_max_len, 80);
        assert!(!config.site.base_url.is_empty());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let config = CatalogConfig {
            timezone: "Mars/Olympus".to_string(),
            ..CatalogConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CatalogError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("culture-catalog-does-not-exist.json");
        let config = CatalogConfig::load(Some(path.as_path())).expect("load defaults");
        assert_eq!(config.timezone, "Asia/Singapore");
    }

    #[test]
    fn labels_fall_back_to_title_case() {
        let config = CatalogConfig::default();
        assert_eq!(config.source_label("sso"), "SSO");
        assert_eq!(config.source_label("wildrice"), "Wildrice");
    }
}
