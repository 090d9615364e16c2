use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::base;
use super::Extractors;
use crate::ages::summarize_age_ranges;
use crate::models::Event;
use crate::text::{clean_text, normalize_space};

static JSONLD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("json-ld selector")
});

/// Event records from every `application/ld+json` block on a page. Ages
/// come from the item itself, or from `fallback_age_text` when the item
/// has none.
pub fn extract_jsonld_events(
    html: &str,
    source: &str,
    page_url: Option<&str>,
    fallback_age_text: Option<&str>,
    extractors: &Extractors,
) -> Vec<Event> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();

    for script in document.select(&JSONLD_SELECTOR) {
        let raw = script.text().collect::<String>();
        let data: Value = match serde_json::from_str(raw.trim()) {
            Ok(data) => data,
            Err(err) => {
                debug!(source, %err, "skipping unreadable json-ld block");
                continue;
            }
        };
        let mut items = Vec::new();
        collect_items(&data, &mut items);
        for item in items {
            if let Some(event) =
                event_from_item(item, source, page_url, fallback_age_text, extractors)
            {
                events.push(event);
            }
        }
    }
    events
}

fn collect_items<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_items(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_items(graph, out);
            }
            if !event_types(value).is_empty() {
                out.push(value);
            }
        }
        _ => {}
    }
}

/// `@type` values naming an event kind (`Event`, `MusicEvent`, ...).
fn event_types(item: &Value) -> Vec<&str> {
    let types: Vec<&str> = match item.get("@type") {
        Some(Value::String(kind)) => vec![kind.as_str()],
        Some(Value::Array(kinds)) => kinds.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    types
        .into_iter()
        .filter(|kind| kind.ends_with("Event"))
        .collect()
}

fn event_from_item(
    item: &Value,
    source: &str,
    page_url: Option<&str>,
    fallback_age_text: Option<&str>,
    extractors: &Extractors,
) -> Option<Event> {
    let types = event_types(item);
    let title = item
        .get("name")
        .and_then(Value::as_str)
        .map(clean_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let link = item
        .get("url")
        .or_else(|| item.get("@id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let url = match page_url {
        Some(page) => base::absolute_url(page, link).unwrap_or_else(|| page.to_string()),
        None => link.unwrap_or_default(),
    };

    let start_raw = item.get("startDate").and_then(Value::as_str);
    let start = start_raw.and_then(|s| extractors.dates.parse_date(s));
    let end = item
        .get("endDate")
        .and_then(Value::as_str)
        .and_then(|s| extractors.dates.parse_date(s));

    let description = item
        .get("description")
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default();

    let mut age_blob = format!("{title} {description}");
    if let Some(typical) = item.get("typicalAgeRange").and_then(Value::as_str) {
        age_blob.push_str(&format!(" ages {typical}"));
    }
    let mut age_ranges = extractors.ages.parse_age_ranges(&age_blob);
    if age_ranges.is_empty() {
        if let Some(text) = fallback_age_text {
            age_ranges = extractors.ages.parse_age_ranges(text);
        }
    }
    let (age_min, age_max) = summarize_age_ranges(&age_ranges);

    let categories = extractors
        .categories
        .infer_categories(&title, &url, source, &description, &types)
        .into_iter()
        .map(|cat| cat.as_str().to_string())
        .collect();

    Some(Event {
        title,
        url,
        source: source.to_string(),
        start,
        end,
        venue: location_name(item.get("location")),
        price: price_text(item.get("offers")),
        age_min,
        age_max,
        age_ranges,
        categories,
        image: image_url(item.get("image")),
        raw_date: if start.is_none() {
            start_raw.map(normalize_space).filter(|s| !s.is_empty())
        } else {
            None
        },
        detail_url: None,
    })
}

fn location_name(location: Option<&Value>) -> Option<String> {
    let name = match location? {
        Value::String(name) => Some(normalize_space(name)),
        Value::Object(map) => map
            .get("name")
            .and_then(Value::as_str)
            .map(normalize_space),
        Value::Array(items) => location_name(items.first()),
        _ => None,
    };
    name.filter(|name| !name.is_empty())
}

fn price_text(offers: Option<&Value>) -> Option<String> {
    match offers? {
        Value::Array(items) => price_text(items.first()),
        Value::Object(map) => {
            let price = match map.get("price") {
                Some(Value::String(p)) if !p.trim().is_empty() => Some(p.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match price {
                Some(price) => {
                    let currency = map
                        .get("priceCurrency")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    Some(normalize_space(&format!("{currency} {price}")))
                }
                None => map
                    .get("description")
                    .and_then(Value::as_str)
                    .map(normalize_space)
                    .filter(|d| !d.is_empty()),
            }
        }
        _ => None,
    }
}

fn image_url(image: Option<&Value>) -> Option<String> {
    match image? {
        Value::String(url) if !url.trim().is_empty() => Some(url.trim().to_string()),
        Value::Array(items) => image_url(items.first()),
        Value::Object(map) => image_url(map.get("url")),
        _ => None,
    }
}
