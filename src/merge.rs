use crate::ages::{dedupe_ranges, summarize_age_ranges, AgeRange};
use crate::canonical::canonicalize;
use crate::categories::dedupe_labels;
use crate::models::Event;

/// Completeness score used to pick which side of a merge wins scalars.
pub fn quality(event: &Event) -> usize {
    let filled = [
        event.start.is_some(),
        event.end.is_some(),
        event.venue.is_some(),
        event.price.is_some(),
        event.raw_date.is_some(),
        !event.url.is_empty(),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    filled * 2
        + usize::from(event.age_min.is_some())
        + usize::from(event.age_max.is_some())
        + event.categories.len()
        + event.age_ranges.len()
}

/// Combines two records of the same real-world event into a new one that
/// is at least as complete as either input. The higher-quality side
/// (first argument on ties) keeps its scalar fields; the other only fills
/// gaps. Start takes the earlier value, end the later one, and ages and
/// categories are unioned.
pub fn merge(a: &Event, b: &Event) -> Event {
    let (base, donor) = if quality(a) >= quality(b) { (a, b) } else { (b, a) };
    let mut merged = base.clone();

    fill_text(&mut merged.title, &donor.title);
    fill_text(&mut merged.url, &donor.url);
    fill_text(&mut merged.source, &donor.source);
    fill(&mut merged.venue, &donor.venue);
    fill(&mut merged.price, &donor.price);
    fill(&mut merged.image, &donor.image);
    fill(&mut merged.raw_date, &donor.raw_date);
    fill(&mut merged.detail_url, &donor.detail_url);
    fill(&mut merged.age_min, &donor.age_min);
    fill(&mut merged.age_max, &donor.age_max);

    merged.start = match (a.start, b.start) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    };
    merged.end = match (a.end, b.end) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    };

    let ranges = dedupe_ranges([base, donor].into_iter().flat_map(age_entries));
    if !ranges.is_empty() {
        let (age_min, age_max) = summarize_age_ranges(&ranges);
        merged.age_min = age_min;
        merged.age_max = age_max;
        merged.age_ranges = ranges;
    }

    merged.categories = dedupe_labels(base.categories.iter().chain(donor.categories.iter()));

    if !merged.url.is_empty() {
        merged.url = canonicalize(&merged.url);
    }
    merged
}

/// The record's age ranges, or its standalone summary pair when it has no
/// range list.
fn age_entries(event: &Event) -> Vec<AgeRange> {
    if !event.age_ranges.is_empty() {
        event.age_ranges.clone()
    } else if event.has_age_summary() {
        vec![AgeRange::new(event.age_min, event.age_max)]
    } else {
        Vec::new()
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, donor: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(donor);
    }
}

fn fill_text(slot: &mut String, donor: &str) {
    if slot.trim().is_empty() && !donor.trim().is_empty() {
        *slot = donor.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateParser;
    use std::collections::HashSet;

    fn dates() -> DateParser {
        DateParser::new(chrono_tz::Asia::Singapore, 2025, 1, 3)
    }

    fn event(title: &str, url: &str) -> Event {
        Event::new(title, url, "esplanade")
    }

    #[test]
    fn fills_gaps_from_the_other_record() {
        let mut a = event("Little Stars", "https://www.esplanade.com/whats-on/little-stars");
        a.start = dates().parse_timestamp("2025-03-01T10:00:00+08:00");
        let mut b = event("Little Stars", "https://www.esplanade.com/whats-on/little-stars");
        b.venue = Some("Esplanade Concert Hall".to_string());

        let merged = merge(&a, &b);
        assert_eq!(merged.start_rfc3339(), "2025-03-01T10:00:00+08:00");
        assert_eq!(merged.venue.as_deref(), Some("Esplanade Concert Hall"));
    }

    #[test]
    fn higher_quality_record_keeps_its_scalars() {
        let mut a = event("A", "");
        a.price = Some("$10".to_string());
        let mut b = event("B", "https://example.com/b");
        b.price = Some("Free".to_string());
        b.venue = Some("Hall".to_string());

        let merged = merge(&a, &b);
        assert_eq!(merged.title, "B");
        assert_eq!(merged.price.as_deref(), Some("Free"));
    }

    #[test]
    fn ties_favour_the_first_argument() {
        let mut a = event("First", "");
        a.price = Some("$10".to_string());
        let mut b = event("Second", "");
        b.price = Some("$20".to_string());
        assert_eq!(merge(&a, &b).price.as_deref(), Some("$10"));
        assert_eq!(merge(&b, &a).price.as_deref(), Some("$20"));
    }

    #[test]
    fn keeps_earliest_start_and_latest_end() {
        let p = dates();
        let mut a = event("Show", "");
        a.start = p.parse_timestamp("2025-05-02T10:00:00+08:00");
        a.end = p.parse_timestamp("2025-05-03T10:00:00+08:00");
        let mut b = event("Show", "");
        b.start = p.parse_timestamp("2025-05-01T02:00:00Z");
        b.end = p.parse_timestamp("2025-05-09T10:00:00+08:00");
        b.venue = Some("Hall".to_string());

        let merged = merge(&a, &b);
        assert_eq!(merged.start_rfc3339(), "2025-05-01T10:00:00+08:00");
        assert_eq!(
            merged.end.map(|dt| dt.to_rfc3339()).as_deref(),
            Some("2025-05-09T10:00:00+08:00")
        );
    }

    #[test]
    fn open_age_range_dominates_summary() {
        let mut a = event("Show", "");
        a.age_ranges = vec![AgeRange(Some(5), None)];
        a.age_min = Some(5);
        let mut b = event("Show", "");
        b.age_ranges = vec![AgeRange(Some(3), Some(10))];
        b.age_min = Some(3);
        b.age_max = Some(10);

        let merged = merge(&a, &b);
        assert_eq!(merged.age_min, Some(3));
        assert_eq!(merged.age_max, None);
        assert_eq!(merged.age_ranges.len(), 2);
    }

    #[test]
    fn standalone_age_pair_counts_as_a_range() {
        let mut a = event("Show", "");
        a.age_min = Some(2);
        a.age_max = Some(4);
        let mut b = event("Show", "");
        b.age_ranges = vec![AgeRange(Some(6), Some(9))];

        let merged = merge(&a, &b);
        assert_eq!(
            merged.age_ranges,
            vec![AgeRange(Some(2), Some(4)), AgeRange(Some(6), Some(9))]
        );
        assert_eq!((merged.age_min, merged.age_max), (Some(2), Some(9)));
    }

    #[test]
    fn categories_union_case_insensitively() {
        let mut a = event("Show", "");
        a.categories = vec!["Music".to_string(), "Dance".to_string()];
        let mut b = event("Show", "");
        b.categories = vec!["dance".to_string(), "Theatre".to_string()];

        let merged = merge(&a, &b);
        assert_eq!(merged.categories, vec!["Music", "Dance", "Theatre"]);
    }

    #[test]
    fn unioned_fields_do_not_depend_on_order() {
        let mut a = event("Show", "https://example.com/en/show/");
        a.categories = vec!["Music".to_string()];
        a.age_ranges = vec![AgeRange(Some(3), Some(6))];
        let mut b = event("Show", "");
        b.categories = vec!["Dance".to_string(), "music".to_string()];
        b.age_ranges = vec![AgeRange(Some(7), None), AgeRange(Some(3), Some(6))];

        let ab = merge(&a, &b);
        let ba = merge(&b, &a);
        let cats = |e: &Event| -> HashSet<String> {
            e.categories.iter().map(|c| c.to_lowercase()).collect()
        };
        let ranges = |e: &Event| -> HashSet<AgeRange> { e.age_ranges.iter().copied().collect() };
        assert_eq!(cats(&ab), cats(&ba));
        assert_eq!(ranges(&ab), ranges(&ba));
        assert_eq!(ab.url, "https://example.com/show");
    }

    #[test]
    fn merge_never_loses_optional_fields() {
        let p = dates();
        let mut full = event("Full", "https://example.com/full");
        full.start = p.parse_timestamp("2025-06-01T10:00:00+08:00");
        full.venue = Some("Hall".to_string());
        full.image = Some("https://example.com/i.png".to_string());
        let mut sparse = event("Sparse", "");
        sparse.end = p.parse_timestamp("2025-06-02T10:00:00+08:00");
        sparse.price = Some("Free".to_string());
        sparse.raw_date = Some("1 - 2 June".to_string());
        sparse.age_max = Some(12);

        for (x, y) in [(&full, &sparse), (&sparse, &full)] {
            let merged = merge(x, y);
            assert!(merged.start.is_some());
            assert!(merged.end.is_some());
            assert!(merged.venue.is_some());
            assert!(merged.price.is_some());
            assert!(merged.image.is_some());
            assert!(merged.raw_date.is_some());
            assert!(merged.age_max.is_some());
            assert!(!merged.url.is_empty());
        }
    }
}
