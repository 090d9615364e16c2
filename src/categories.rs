use std::{collections::BTreeMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::CatalogConfig;

/// Controlled vocabulary. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Theatre,
    Opera,
    Orchestra,
    Cinema,
    Dance,
    Music,
    Workshop,
    Exhibition,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Theatre,
        Category::Opera,
        Category::Orchestra,
        Category::Cinema,
        Category::Dance,
        Category::Music,
        Category::Workshop,
        Category::Exhibition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Theatre => "Theatre",
            Category::Opera => "Opera",
            Category::Orchestra => "Orchestra",
            Category::Cinema => "Cinema",
            Category::Dance => "Dance",
            Category::Music => "Music",
            Category::Workshop => "Workshop",
            Category::Exhibition => "Exhibition",
        }
    }

    /// Case-insensitive lookup of a vocabulary label.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL
            .into_iter()
            .find(|cat| cat.as_str().eq_ignore_ascii_case(label))
    }

    fn keyword_pattern(&self) -> &'static str {
        match self {
            Category::Theatre => {
                r"(?i)\b(theatre|theater|theatrical|plays?|musicals?|drama|puppet(?:ry|s)?|storytelling|pantomime)\b"
            }
            Category::Opera => r"(?i)\b(opera|operas|operatic|operetta)\b",
            Category::Orchestra => {
                r"(?i)\b(orchestra|orchestral|symphon(?:y|ic|ies)|philharmonic|concerto|chamber\s+ensemble)\b"
            }
            Category::Cinema => r"(?i)\b(cinema|films?|movies?|screenings?|animation)\b",
            Category::Dance => r"(?i)\b(dance|dances|dancing|dancers?|ballet|choreograph\w*)\b",
            Category::Music => {
                r"(?i)\b(music|musical|concerts?|bands?|choir|choral|jazz|songs?|sing-?along|gig)\b"
            }
            Category::Workshop => {
                r"(?i)\b(workshops?|class|classes|masterclass|crafts?|hands-on|make\s+your\s+own|learning\s+journey)\b"
            }
            Category::Exhibition => {
                r"(?i)\b(exhibitions?|exhibits?|installations?|showcase|on\s+view|galler(?:y|ies)|museum)\b"
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static KEYWORD_PATTERNS: Lazy<Vec<(Category, Regex)>> = Lazy::new(|| {
    Category::ALL
        .into_iter()
        .map(|cat| {
            (
                cat,
                Regex::new(cat.keyword_pattern()).expect("valid category regex"),
            )
        })
        .collect()
});

/// Structured-data `@type` hints.
fn type_hint(kind: &str) -> Option<Category> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "musicevent" => Some(Category::Music),
        "theaterevent" | "theatreevent" => Some(Category::Theatre),
        "danceevent" => Some(Category::Dance),
        "screeningevent" => Some(Category::Cinema),
        "exhibitionevent" | "visualartsevent" => Some(Category::Exhibition),
        "educationevent" => Some(Category::Workshop),
        _ => None,
    }
}

/// Per-source defaults plus the fixed keyword sweep.
#[derive(Debug, Clone, Default)]
pub struct CategoryRules {
    source_defaults: BTreeMap<String, Vec<Category>>,
}

impl CategoryRules {
    pub fn new(source_defaults: BTreeMap<String, Vec<Category>>) -> Self {
        let source_defaults = source_defaults
            .into_iter()
            .map(|(source, cats)| (source.to_lowercase(), cats))
            .collect();
        Self { source_defaults }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.source_defaults.clone())
    }

    /// Source defaults, then `@type` hints, then keywords over title, url
    /// and text. The result is always in vocabulary order.
    pub fn infer_categories(
        &self,
        title: &str,
        url: &str,
        source: &str,
        text_blob: &str,
        jsonld_types: &[&str],
    ) -> Vec<Category> {
        let mut found = [false; Category::ALL.len()];
        let mut mark = |cat: Category| found[cat as usize] = true;

        if let Some(defaults) = self.source_defaults.get(&source.trim().to_lowercase()) {
            defaults.iter().copied().for_each(&mut mark);
        }
        jsonld_types
            .iter()
            .filter_map(|kind| type_hint(kind))
            .for_each(&mut mark);

        // url separators count as word breaks
        let haystack = format!("{title} {} {text_blob}", url.replace(['-', '_', '/'], " "));
        for (cat, pattern) in KEYWORD_PATTERNS.iter() {
            if pattern.is_match(&haystack) {
                mark(*cat);
            }
        }

        Category::ALL
            .into_iter()
            .filter(|cat| found[*cat as usize])
            .collect()
    }
}

/// Case-insensitive de-duplication of free-form labels, first-seen order.
pub fn dedupe_labels<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() {
            continue;
        }
        let key = label.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(label.to_string());
    }
    out
}
