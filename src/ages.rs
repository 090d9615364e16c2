use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::clean_text;

/// Inclusive age span; either bound may be open. Serializes as `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgeRange(pub Option<i32>, pub Option<i32>);

impl AgeRange {
    /// Builds a range with its bounds in order.
    pub fn new(low: Option<i32>, high: Option<i32>) -> Self {
        match (low, high) {
            (Some(lo), Some(hi)) if lo > hi => AgeRange(Some(hi), Some(lo)),
            _ => AgeRange(low, high),
        }
    }

    pub fn low(&self) -> Option<i32> {
        self.0
    }

    pub fn high(&self) -> Option<i32> {
        self.1
    }

    pub fn label(&self) -> String {
        match (self.0, self.1) {
            (Some(lo), Some(hi)) => format!("{lo}-{hi}"),
            (Some(lo), None) => format!("{lo}+"),
            (None, Some(hi)) => format!("Up to {hi}"),
            (None, None) => "All ages".to_string(),
        }
    }
}

const SPAN: &str = r"(\d{1,2})\s*(?:-|–|—|to)\s*(\d{1,2})";
const OPEN: &str = r"(\d{1,2})\s*(?:\+|and\s+above|and\s+up|and\s+older|years?\s+and\s+above)";
const RECOMMENDED: &str = r"\brecommended\s+(?:for\s+)?ages?\s*:?\s*";
const SUITABLE: &str = r"\b(?:suitable\s+for(?:\s+(?:children|kids))?|for\s+(?:children|kids)\s+aged?|ages?)\s*:?\s*(?:ages?\s*)?";

/// Pattern tiers, most explicit phrasing first.
static AGE_PATTERNS: Lazy<Vec<(u8, Regex)>> = Lazy::new(|| {
    let specs = [
        (3, format!("{RECOMMENDED}{SPAN}")),
        (3, format!("{RECOMMENDED}{OPEN}")),
        (2, format!("{SUITABLE}{SPAN}")),
        (2, format!("{SUITABLE}{OPEN}")),
        (1, format!(r"\b{SPAN}\s*(?:years?|yrs?)\b")),
        (1, r"\b(\d{1,2})\s*\+\s*(?:years?|yrs?)\b".to_string()),
        (
            1,
            r"\b(\d{1,2})\s*(?:years?|yrs?)(?:\s+old)?\s+and\s+(?:above|up|older)\b".to_string(),
        ),
    ];
    specs
        .into_iter()
        .map(|(tier, pattern)| (tier, Regex::new(&pattern).expect("valid age regex")))
        .collect()
});

#[derive(Debug, Clone)]
pub struct AgeRules {
    ceiling: i32,
}

impl Default for AgeRules {
    fn default() -> Self {
        Self::new(17)
    }
}

impl AgeRules {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: i32::try_from(ceiling).unwrap_or(i32::MAX),
        }
    }

    pub fn ceiling(&self) -> i32 {
        self.ceiling
    }

    /// Extracts age ranges from free text or markup. Only matches from the
    /// most explicit tier present are kept, in text order, without repeats.
    pub fn parse_age_ranges(&self, text: &str) -> Vec<AgeRange> {
        let lowered = clean_text(text).to_lowercase();
        if lowered.is_empty() {
            return Vec::new();
        }

        let mut found: Vec<(u8, usize, AgeRange)> = Vec::new();
        for (tier, pattern) in AGE_PATTERNS.iter() {
            for caps in pattern.captures_iter(&lowered) {
                let low = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
                let high = caps.get(2).and_then(|m| m.as_str().parse::<i32>().ok());
                let Some(range) = self.validate(AgeRange::new(low, high)) else {
                    continue;
                };
                let pos = caps.get(0).map_or(0, |m| m.start());
                found.push((*tier, pos, range));
            }
        }

        let Some(best) = found.iter().map(|(tier, _, _)| *tier).max() else {
            return Vec::new();
        };
        found.retain(|(tier, _, _)| *tier == best);
        found.sort_by_key(|(_, pos, _)| *pos);
        dedupe_ranges(found.into_iter().map(|(_, _, range)| range))
    }

    /// A bound above the ceiling means the text is not describing a child
    /// or teen audience, so the pair is dropped.
    fn validate(&self, range: AgeRange) -> Option<AgeRange> {
        // Dropped rather than clamped: `12 to 21` must not become `12-17`.
        let over = |bound: Option<i32>| bound.map_or(false, |value| value > self.ceiling);
        if over(range.low()) || over(range.high()) {
            return None;
        }
        if range.low().is_none() && range.high().is_none() {
            return None;
        }
        Some(range)
    }
}

/// Removes exact repeats, keeping first-seen order.
pub fn dedupe_ranges(ranges: impl IntoIterator<Item = AgeRange>) -> Vec<AgeRange> {
    let mut out: Vec<AgeRange> = Vec::new();
    for range in ranges {
        if !out.contains(&range) {
            out.push(range);
        }
    }
    out
}

/// Reduces ranges to one `(age_min, age_max)` pair. An open upper bound
/// anywhere makes the summary open-ended.
pub fn summarize_age_ranges(ranges: &[AgeRange]) -> (Option<i32>, Option<i32>) {
    if ranges.is_empty() {
        return (None, None);
    }
    let low = ranges.iter().filter_map(AgeRange::low).min();
    let high = if ranges.iter().any(|range| range.high().is_none()) {
        None
    } else {
        ranges.iter().filter_map(AgeRange::high).max()
    };
    match (low, high) {
        (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
        other => other,
    }
}
