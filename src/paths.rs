use std::collections::HashSet;

use chrono_tz::Tz;
use sha2::{Digest, Sha256};

use crate::models::Event;
use crate::text::slugify;

const DIGEST_LEN: usize = 8;

/// Gives every event a relative `events/{slug}-{date}-{digest}.html` path,
/// unique within one call.
#[derive(Debug, Clone)]
pub struct PathAssigner {
    tz: Tz,
    slug_max_len: usize,
}

impl PathAssigner {
    pub fn new(tz: Tz, slug_max_len: usize) -> Self {
        Self { tz, slug_max_len }
    }

    pub fn assign(&self, events: &mut [Event]) {
        let mut used: HashSet<String> = HashSet::with_capacity(events.len());
        for event in events.iter_mut() {
            let stem = format!(
                "events/{}-{}-{}",
                self.slug(&event.title),
                self.date_tag(event),
                digest(event)
            );
            let mut path = format!("{stem}.html");
            let mut suffix = 2;
            while used.contains(&path) {
                path = format!("{stem}-{suffix}.html");
                suffix += 1;
            }
            used.insert(path.clone());
            event.detail_url = Some(path);
        }
    }

    pub fn slug(&self, title: &str) -> String {
        let mut slug = slugify(title);
        if slug.is_empty() {
            slug.push_str("event");
        }
        slug.truncate(self.slug_max_len);
        slug
    }

    fn date_tag(&self, event: &Event) -> String {
        event
            .start
            .map(|dt| dt.with_timezone(&self.tz).format("%Y%m%d").to_string())
            .unwrap_or_else(|| "tbc".to_string())
    }
}

fn digest(event: &Event) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.url.as_bytes());
    hasher.update(b"|");
    hasher.update(event.source.as_bytes());
    hasher.update(b"|");
    hasher.update(event.title.as_bytes());
    hasher.update(b"|");
    hasher.update(event.start_rfc3339().as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(DIGEST_LEN);
    hex
}
