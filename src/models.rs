use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ages::{dedupe_ranges, AgeRange};
use crate::categories::dedupe_labels;
use crate::dates::DateParser;

pub const UNTITLED: &str = "Untitled Event";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Event {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub start: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub end: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub age_min: Option<i32>,
    #[serde(default)]
    pub age_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub age_ranges: Vec<AgeRange>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub raw_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_url: Option<String>,
}

impl Event {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Decodes one loosely-shaped raw record. Anything that is not a JSON
    /// object is rejected; fields of the wrong type read as absent.
    pub fn from_value(value: &Value, dates: &DateParser) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            title: text_field(obj, "title").unwrap_or_default(),
            url: text_field(obj, "url").unwrap_or_default(),
            source: text_field(obj, "source").unwrap_or_default(),
            start: text_field(obj, "start").and_then(|s| dates.parse_timestamp(&s)),
            end: text_field(obj, "end").and_then(|s| dates.parse_timestamp(&s)),
            venue: non_empty(text_field(obj, "venue")),
            price: non_empty(text_field(obj, "price")),
            age_min: obj.get("age_min").and_then(int_or_none),
            age_max: obj.get("age_max").and_then(int_or_none),
            age_ranges: obj.get("age_ranges").map(age_ranges_from).unwrap_or_default(),
            categories: obj.get("categories").map(labels_from).unwrap_or_default(),
            image: non_empty(text_field(obj, "image")),
            raw_date: non_empty(text_field(obj, "raw_date")),
            detail_url: non_empty(text_field(obj, "detail_url")),
        })
    }

    /// Whether the standalone `age_min`/`age_max` pair carries anything.
    pub fn has_age_summary(&self) -> bool {
        self.age_min.is_some() || self.age_max.is_some()
    }

    pub fn start_rfc3339(&self) -> String {
        self.start.map(|dt| dt.to_rfc3339()).unwrap_or_default()
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Integers, integral floats and integer strings; booleans never count.
pub(crate) fn int_or_none(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX))
                    .map(|f| f as i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn age_ranges_from(value: &Value) -> Vec<AgeRange> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    let ranges = items.iter().filter_map(|item| {
        let pair = item.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        Some(AgeRange::new(int_or_none(&pair[0]), int_or_none(&pair[1])))
    });
    dedupe_ranges(ranges)
}

fn labels_from(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    dedupe_labels(items.iter().filter_map(|item| match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
