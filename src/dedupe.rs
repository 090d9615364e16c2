use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::ages::{dedupe_ranges, summarize_age_ranges, AgeRange};
use crate::canonical::canonicalize;
use crate::categories::dedupe_labels;
use crate::config::CatalogConfig;
use crate::dates::DateParser;
use crate::error::Result;
use crate::merge::merge;
use crate::models::{Event, UNTITLED};
use crate::paths::PathAssigner;
use crate::text::title_key;

/// Fallback identity for records that cannot be matched by URL.
pub fn signature(event: &Event) -> String {
    format!(
        "{}|{}|{}|{}",
        event.source.trim().to_lowercase(),
        title_key(&event.title),
        event.start_rfc3339(),
        event.raw_date.as_deref().unwrap_or("").trim()
    )
}

fn is_undated(event: &Event) -> bool {
    event.start.is_none() && event.raw_date.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Trims and defaults the title, lower-cases the source, canonicalizes the
/// url, tidies categories and age ranges, and backfills the age summary.
pub fn normalize_record(mut event: Event) -> Event {
    event.title = event.title.trim().to_string();
    if event.title.is_empty() {
        event.title = UNTITLED.to_string();
    }
    event.source = event.source.trim().to_lowercase();
    event.url = canonicalize(&event.url);
    event.categories = dedupe_labels(&event.categories);
    event.age_ranges = dedupe_ranges(
        event
            .age_ranges
            .iter()
            .map(|range| AgeRange::new(range.low(), range.high())),
    );
    if !event.age_ranges.is_empty() {
        let (low, high) = summarize_age_ranges(&event.age_ranges);
        if event.age_min.is_none() {
            event.age_min = low;
        }
        if event.age_max.is_none() {
            event.age_max = high;
        }
    }
    if let (Some(lo), Some(hi)) = (event.age_min, event.age_max) {
        if lo > hi {
            event.age_min = Some(hi);
            event.age_max = Some(lo);
        }
    }
    event
}

/// The batch transform from raw scraped records to the final catalog.
#[derive(Debug, Clone)]
pub struct Deduper {
    dates: DateParser,
    paths: PathAssigner,
    merge_undated_across_urls: bool,
}

impl Deduper {
    pub fn new(dates: DateParser, paths: PathAssigner, merge_undated_across_urls: bool) -> Self {
        Self {
            dates,
            paths,
            merge_undated_across_urls,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let dates = DateParser::from_config(config)?;
        let paths = PathAssigner::new(dates.tz(), config.slug_max_len);
        Ok(Self::new(dates, paths, config.merge_undated_across_urls))
    }

    pub fn dates(&self) -> &DateParser {
        &self.dates
    }

    /// Decodes raw JSON records (skipping anything that is not an object)
    /// and runs the full pipeline.
    pub fn dedupe(&self, raw: &[Value]) -> Vec<Event> {
        let events: Vec<Event> = raw
            .iter()
            .filter_map(|value| {
                let decoded = Event::from_value(value, &self.dates);
                if decoded.is_none() {
                    debug!(kind = value_kind(value), "skipping malformed record");
                }
                decoded
            })
            .collect();
        self.dedupe_events(events)
    }

    pub fn dedupe_events(&self, events: Vec<Event>) -> Vec<Event> {
        let raw_count = events.len();
        let normalized: Vec<Event> = events.into_iter().map(normalize_record).collect();

        let primary = group_by(normalized, |event| {
            if event.url.is_empty() {
                signature(event)
            } else {
                event.url.clone()
            }
        });
        let primary_count = primary.len();

        let mut deduped = self.group_by_signature(primary);
        sort_events(&mut deduped);
        self.paths.assign(&mut deduped);

        info!(
            raw = raw_count,
            after_url_pass = primary_count,
            deduped = deduped.len(),
            "deduplicated events"
        );
        deduped
    }

    /// Second pass: same-signature records merge unless both are undated
    /// and point at different pages.
    fn group_by_signature(&self, events: Vec<Event>) -> Vec<Event> {
        let mut groups: Vec<Event> = Vec::with_capacity(events.len());
        let mut by_signature: HashMap<String, Vec<usize>> = HashMap::new();

        for event in events {
            let slots = by_signature.entry(signature(&event)).or_default();
            let target = slots
                .iter()
                .copied()
                .find(|idx| self.may_merge(&groups[*idx], &event));
            match target {
                Some(idx) => groups[idx] = merge(&groups[idx], &event),
                None => {
                    slots.push(groups.len());
                    groups.push(event);
                }
            }
        }
        groups
    }

    fn may_merge(&self, left: &Event, right: &Event) -> bool {
        if self.merge_undated_across_urls || !is_undated(left) || !is_undated(right) {
            return true;
        }
        let distinct_pages = !left.url.is_empty() && !right.url.is_empty() && left.url != right.url;
        if distinct_pages {
            debug!(left = %left.url, right = %right.url, "keeping undated events with distinct urls apart");
        }
        !distinct_pages
    }
}

/// Folds every record into the first record sharing its key, keeping the
/// order in which keys were first seen.
fn group_by<F>(events: Vec<Event>, key_of: F) -> Vec<Event>
where
    F: Fn(&Event) -> String,
{
    let mut groups: Vec<Event> = Vec::with_capacity(events.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    for event in events {
        let key = key_of(&event);
        match index.get(&key) {
            Some(&idx) => groups[idx] = merge(&groups[idx], &event),
            None => {
                index.insert(key, groups.len());
                groups.push(event);
            }
        }
    }
    groups
}

/// Dated events first in start order, undated ones last; ties by
/// case-insensitive title.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.start
            .is_none()
            .cmp(&b.start.is_none())
            .then_with(|| a.start.cmp(&b.start))
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
    });
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deduper() -> Deduper {
        let dates = DateParser::new(chrono_tz::Asia::Singapore, 2025, 1, 3);
        let paths = PathAssigner::new(chrono_tz::Asia::Singapore, 80);
        Deduper::new(dates, paths, false)
    }

    #[test]
    fn normalize_defaults_and_backfills() {
        let mut event = Event::new("   ", "https://Example.com/en/x/", " SSO ");
        event.age_ranges = vec![AgeRange(Some(9), Some(4)), AgeRange(Some(4), Some(9))];
        event.age_min = Some(2);
        let event = normalize_record(event);
        assert_eq!(event.title, UNTITLED);
        assert_eq!(event.source, "sso");
        assert_eq!(event.url, "https://example.com/x");
        assert_eq!(event.age_ranges, vec![AgeRange(Some(4), Some(9))]);
        assert_eq!((event.age_min, event.age_max), (Some(2), Some(9)));
    }

    #[test]
    fn normalize_swaps_reversed_summary() {
        let mut event = Event::new("Show", "", "sso");
        event.age_min = Some(10);
        event.age_max = Some(3);
        let event = normalize_record(event);
        assert_eq!((event.age_min, event.age_max), (Some(3), Some(10)));
    }

    #[test]
    fn signature_ignores_case_and_punctuation() {
        let a = Event::new("Family Day!", "", "NHB");
        let b = Event::new("family   day", "", "nhb");
        assert_eq!(signature(&a), signature(&b));
        assert_eq!(signature(&a), "nhb|family day||");
    }

    #[test]
    fn malformed_records_are_skipped() {
        let raw = vec![
            json!("not an event"),
            json!(42),
            json!(null),
            json!({"title": "Real", "source": "sso"}),
        ];
        let out = deduper().dedupe(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Real");
    }

    #[test]
    fn dated_listing_and_detail_page_merge_by_signature() {
        let raw = vec![
            json!({"title": "Little Stars", "source": "esplanade",
                   "url": "https://www.esplanade.com/api/listing/123",
                   "start": "2025-04-05T10:00:00+08:00"}),
            json!({"title": "Little Stars!", "source": "esplanade",
                   "url": "https://www.esplanade.com/whats-on/little-stars",
                   "start": "2025-04-05T02:00:00Z", "venue": "Recital Studio"}),
        ];
        let out = deduper().dedupe(&raw);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].venue.as_deref(), Some("Recital Studio"));
    }

    #[test]
    fn undated_events_on_distinct_pages_stay_apart() {
        let raw = vec![
            json!({"title": "Storytime", "source": "nhb", "url": "https://nhb.gov.sg/a"}),
            json!({"title": "Storytime", "source": "nhb", "url": "https://nhb.gov.sg/b"}),
            json!({"title": "Storytime", "source": "nhb", "venue": "Gallery 1"}),
        ];
        let out = deduper().dedupe(&raw);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|e| e.venue.as_deref() == Some("Gallery 1")));

        let merging = Deduper::new(deduper().dates.clone(), deduper().paths.clone(), true);
        assert_eq!(merging.dedupe(&raw).len(), 1);
    }

    #[test]
    fn sorts_dated_first_then_title() {
        let raw = vec![
            json!({"title": "zebra", "source": "a"}),
            json!({"title": "Apple", "source": "a"}),
            json!({"title": "Late", "source": "a", "start": "2025-06-02T10:00:00+08:00"}),
            json!({"title": "Early", "source": "a", "start": "2025-06-01T10:00:00+08:00"}),
        ];
        let titles: Vec<String> = deduper().dedupe(&raw).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["Early", "Late", "Apple", "zebra"]);
    }
}
