use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::base;
use super::jsonld::extract_jsonld_events;
use super::{Extractors, VenueScraper};
use crate::ages::summarize_age_ranges;
use crate::models::Event;

/// One venue site: where its listings live and which links on them lead
/// to event pages.
#[derive(Debug)]
pub struct VenueConfig {
    pub source: &'static str,
    pub name: &'static str,
    pub base: &'static str,
    pub listings: &'static [&'static str],
    pub allow_terms: &'static [&'static str],
    pub blocked_terms: &'static [&'static str],
    pub max_links: usize,
}

pub static VENUES: &[VenueConfig] = &[
    VenueConfig {
        source: "esplanade",
        name: "Esplanade",
        base: "https://www.esplanade.com",
        listings: &["https://www.esplanade.com/whats-on?type=Family%20%26%20Children"],
        allow_terms: &["/whats-on/"],
        blocked_terms: &[],
        max_links: 40,
    },
    VenueConfig {
        source: "sso",
        name: "Singapore Symphony Orchestra",
        base: "https://www.sso.org.sg",
        listings: &["https://www.sso.org.sg/family-concerts"],
        allow_terms: &["/whats-on/"],
        blocked_terms: &[],
        max_links: 20,
    },
    VenueConfig {
        source: "sco",
        name: "Singapore Chinese Orchestra",
        base: "https://sco.com.sg",
        listings: &["https://sco.com.sg/concerts-events"],
        allow_terms: &["/concerts/", "/events/", "/programme/"],
        blocked_terms: &[],
        max_links: 15,
    },
    VenueConfig {
        source: "gallery",
        name: "National Gallery Singapore",
        base: "https://www.nationalgallery.sg",
        listings: &["https://www.nationalgallery.sg/whats-on"],
        allow_terms: &["whats-on", "exhibitions", "programmes", "families"],
        blocked_terms: &[],
        max_links: 20,
    },
    VenueConfig {
        source: "nhb",
        name: "NHB Museums",
        base: "https://www.nhb.gov.sg",
        listings: &[
            "https://www.nhb.gov.sg/nationalmuseum/whats-on",
            "https://www.nhb.gov.sg/acm/whats-on/programmes",
        ],
        allow_terms: &["/nationalmuseum/whats-on/", "/acm/whats-on/"],
        blocked_terms: &[
            "/whats-on/exhibition/exhibitions",
            "/whats-on/programme/programmes",
            "/whats-on/plan-your-itinerary",
            "/whats-on/view-all",
        ],
        max_links: 25,
    },
    VenueConfig {
        source: "sam",
        name: "Singapore Art Museum",
        base: "https://www.singaporeartmuseum.sg",
        listings: &["https://www.singaporeartmuseum.sg/art-events"],
        allow_terms: &["/art-events/", "/events/", "/event/", "/exhibition"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "artscience",
        name: "ArtScience Museum",
        base: "https://www.marinabaysands.com",
        listings: &["https://www.marinabaysands.com/museum/exhibitions.html"],
        allow_terms: &["/museum/", "/events/", "/event/", "/exhibition", "/programmes"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "peranakan",
        name: "Peranakan Museum",
        base: "https://www.nhb.gov.sg/peranakanmuseum",
        listings: &[
            "https://www.nhb.gov.sg/peranakanmuseum/whatson/exhibitions",
            "https://www.nhb.gov.sg/peranakanmuseum/whatson/programmes",
        ],
        allow_terms: &["/whatson/", "/events/", "/event/", "/exhibition", "/programme"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "ihc",
        name: "Indian Heritage Centre",
        base: "https://www.indianheritage.gov.sg",
        listings: &[
            "https://www.indianheritage.gov.sg/en/whats-on/programmes",
            "https://www.indianheritage.gov.sg/en/whats-on/exhibitions",
        ],
        allow_terms: &["/whats-on/", "/events/", "/event/", "/programmes", "/exhibition"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "childrensmuseum",
        name: "Children's Museum Singapore",
        base: "https://www.heritage.sg/childrensmuseum",
        listings: &[
            "https://www.heritage.sg/childrensmuseum/whatson/activities",
            "https://www.heritage.sg/childrensmuseum/whatson/exhibitions",
        ],
        allow_terms: &["/whatson/", "/events/", "/event/", "/programmes", "/exhibition"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "changi",
        name: "Changi Chapel and Museum",
        base: "https://www.changichapelmuseum.gov.sg",
        listings: &["https://www.changichapelmuseum.gov.sg/"],
        allow_terms: &["/whats-on/", "/events/", "/event/", "/programme", "/exhibition"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "bukitchandu",
        name: "Reflections at Bukit Chandu",
        base: "https://www.heritage.sg/reflectionsatbukitchandu",
        listings: &[
            "https://www.heritage.sg/reflectionsatbukitchandu/whats-on/exhibitions",
            "https://www.heritage.sg/reflectionsatbukitchandu/whats-on/programmes",
        ],
        allow_terms: &["/whats-on/", "/events/", "/event/", "/programmes", "/exhibition"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "sccc",
        name: "Singapore Chinese Cultural Centre",
        base: "https://singaporeccc.org.sg",
        listings: &[
            "https://singaporeccc.org.sg/events/",
            "https://singaporeccc.org.sg/whats-on/",
        ],
        allow_terms: &["/events/", "/event/", "/whats-on/", "/programme", "/programmes"],
        blocked_terms: &[],
        max_links: 24,
    },
    VenueConfig {
        source: "gateway",
        name: "Gateway Theatre",
        base: "https://gatewaytheatre.sg",
        listings: &[
            "https://gatewaytheatre.sg/whats-on/",
            "https://gatewaytheatre.sg/gateway-kids-club/",
        ],
        allow_terms: &["/events/", "/event/", "/whats-on/", "/gateway-kids-club"],
        blocked_terms: &[],
        max_links: 24,
    },
];

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("h1 selector"));
static SUBHEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2").expect("h2 selector"));
static DATE_CANDIDATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("time, p, div, span, li, h2, h3, h4").expect("date candidate selector")
});
static DATE_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{1,2}\s+[a-z]{3,9}\s+\d{2,4}\b|\b(?:mon|tue|wed|thu|fri|sat|sun)\s*(?:/|,|\s+\d)")
        .expect("valid date hint regex")
});

const MAX_DATE_TEXT_CHARS: usize = 140;
const BOILERPLATE: &[&str] = &[
    "last updated",
    "copyright",
    "cookie",
    "government of singapore",
];

/// Crawls a venue's listing pages and the event pages they link to.
pub struct ListingScraper {
    config: &'static VenueConfig,
}

impl ListingScraper {
    pub fn new(config: &'static VenueConfig) -> Self {
        Self { config }
    }
}

impl VenueScraper for ListingScraper {
    fn source_id(&self) -> &'static str {
        self.config.source
    }

    fn source_name(&self) -> &'static str {
        self.config.name
    }

    fn source_url(&self) -> &'static str {
        self.config.listings.first().copied().unwrap_or(self.config.base)
    }

    fn fetch(&self, extractors: &Extractors) -> Result<Vec<Event>> {
        let cfg = self.config;
        let mut events = Vec::new();
        let mut failed_listings = 0;

        for listing in cfg.listings {
            let html = match base::fetch_html(listing) {
                Ok(html) => html,
                Err(err) => {
                    warn!(source = cfg.source, %listing, error = %err, "listing unavailable");
                    failed_listings += 1;
                    continue;
                }
            };
            events.extend(self.parse_listing(&html, listing, extractors));

            for url in collect_links(&html, cfg) {
                match base::fetch_html(&url) {
                    Ok(page) => events.extend(self.parse_detail_page(&page, &url, extractors)),
                    Err(err) => warn!(source = cfg.source, %url, error = %err, "event page unavailable"),
                }
            }
        }

        if !cfg.listings.is_empty() && failed_listings == cfg.listings.len() {
            bail!("no listing page of {} could be fetched", cfg.source);
        }
        info!(source = cfg.source, events = events.len(), "venue scraped");
        Ok(events)
    }
}

impl ListingScraper {
    /// JSON-LD events embedded in a listing page.
    pub(crate) fn parse_listing(
        &self,
        html: &str,
        page_url: &str,
        extractors: &Extractors,
    ) -> Vec<Event> {
        let text = base::visible_text(&Html::parse_document(html));
        extract_jsonld_events(
            html,
            self.config.source,
            Some(page_url),
            Some(text.as_str()),
            extractors,
        )
    }

    /// JSON-LD events of an event page, or one event read off the page
    /// itself when it has none.
    pub(crate) fn parse_detail_page(
        &self,
        html: &str,
        url: &str,
        extractors: &Extractors,
    ) -> Vec<Event> {
        let events = self.parse_listing(html, url, extractors);
        if !events.is_empty() {
            return events;
        }
        match fallback_event(html, url, self.config.source, extractors) {
            Some(event) => vec![event],
            None => {
                debug!(source = self.config.source, %url, "no event found on page");
                Vec::new()
            }
        }
    }
}

/// Same-domain links on a listing that look like event pages, in page
/// order, without repeats and capped at `max_links`.
pub(crate) fn collect_links(html: &str, cfg: &VenueConfig) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links: Vec<String> = Vec::new();

    for anchor in document.select(&LINK_SELECTOR) {
        let href = anchor.value().attr("href").map(str::to_string);
        let Some(href) = base::absolute_url(cfg.base, href) else {
            continue;
        };
        if !href.starts_with("http") || !base::same_domain(&href, cfg.base) {
            continue;
        }
        let lowered = href.to_lowercase();
        if !cfg.allow_terms.iter().any(|term| lowered.contains(term)) {
            continue;
        }
        if cfg.blocked_terms.iter().any(|term| lowered.contains(term)) {
            continue;
        }
        if !links.contains(&href) {
            links.push(href);
        }
        if links.len() >= cfg.max_links {
            break;
        }
    }
    links
}

/// A short element whose text reads like a date, skipping page chrome.
/// An explicit range anywhere on the page wins.
pub(crate) fn find_date_text(document: &Html, extractors: &Extractors) -> Option<String> {
    let visible = base::visible_text(document);
    if let Some(range) = extractors.dates.parse_date_range(&visible) {
        return Some(range.raw);
    }

    document
        .select(&DATE_CANDIDATE_SELECTOR)
        .map(base::inner_text)
        .filter(|text| !text.is_empty() && text.chars().count() <= MAX_DATE_TEXT_CHARS)
        .filter(|text| {
            let lowered = text.to_lowercase();
            !BOILERPLATE.iter().any(|noise| lowered.contains(noise))
        })
        .find(|text| DATE_HINT_RE.is_match(text))
}

/// Builds an event from a page without structured data: heading as title,
/// then whatever date, ages and categories the visible text gives away.
pub(crate) fn fallback_event(
    html: &str,
    url: &str,
    source: &str,
    extractors: &Extractors,
) -> Option<Event> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let title = base::first_text(&root, &HEADING_SELECTOR)
        .or_else(|| base::first_text(&root, &SUBHEADING_SELECTOR))?;
    if extractors.is_blocked_title(&title) {
        debug!(%title, %url, "skipping navigation heading");
        return None;
    }

    let visible = base::visible_text(&document);
    let (mut start, end, mut raw_date) = match extractors.dates.parse_date_range(&visible) {
        Some(range) => (Some(range.start), Some(range.end), Some(range.raw)),
        None => (None, None, None),
    };
    if start.is_none() {
        if let Some(candidate) = find_date_text(&document, extractors) {
            start = extractors.dates.parse_date(&candidate);
            raw_date.get_or_insert(candidate);
        }
    }

    let age_ranges = extractors.ages.parse_age_ranges(&visible);
    let (age_min, age_max) = summarize_age_ranges(&age_ranges);
    let categories = extractors
        .categories
        .infer_categories(&title, url, source, raw_date.as_deref().unwrap_or(""), &[])
        .into_iter()
        .map(|cat| cat.as_str().to_string())
        .collect();

    Some(Event {
        title,
        url: url.to_string(),
        source: source.to_string(),
        start,
        end,
        age_min,
        age_max,
        age_ranges,
        categories,
        raw_date,
        ..Event::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ages::AgeRange;
    use crate::config::CatalogConfig;

    fn extractors() -> Extractors {
        Extractors::for_year(&CatalogConfig::default(), 2025).expect("extractors")
    }

    fn venue(source: &str) -> &'static VenueConfig {
        VENUES
            .iter()
            .find(|cfg| cfg.source == source)
            .expect("builtin venue")
    }

    const NHB_LISTING: &str = r##"
    <html><body>
      <a href="/nationalmuseum/whats-on/programmes/little-explorers">Little Explorers</a>
      <a href="/nationalmuseum/whats-on/programmes/little-explorers">Little Explorers (again)</a>
      <a href="/nationalmuseum/whats-on/view-all">View all</a>
      <a href="https://www.nhb.gov.sg/acm/whats-on/batik">Batik</a>
      <a href="https://www.facebook.com/nationalmuseum/whats-on/x">Share</a>
      <a href="/nationalmuseum/visit">Visit</a>
      <a href="#top">Top</a>
    </body></html>
    "##;

    #[test]
    fn collects_same_domain_event_links() {
        let links = collect_links(NHB_LISTING, venue("nhb"));
        assert_eq!(
            links,
            vec![
                "https://www.nhb.gov.sg/nationalmuseum/whats-on/programmes/little-explorers",
                "https://www.nhb.gov.sg/acm/whats-on/batik",
            ]
        );
    }

    #[test]
    fn link_collection_respects_cap() {
        let cfg = VenueConfig {
            source: "test",
            name: "Test",
            base: "https://example.com",
            listings: &[],
            allow_terms: &["/events/"],
            blocked_terms: &[],
            max_links: 2,
        };
        let html: String = (0..5)
            .map(|i| format!(r#"<a href="/events/{i}">{i}</a>"#))
            .collect();
        assert_eq!(collect_links(&html, &cfg).len(), 2);
    }

    const WORKSHOP_PAGE: &str = r#"
    <html><head><title>Batik</title></head><body>
      <nav><a href="/">Home</a></nav>
      <h1>Batik Painting for Families</h1>
      <p>12 Jul 2025 - 13 Jul 2025</p>
      <p>Suitable for children aged 7 to 12.</p>
      <script>var note = "Recommended for ages 18+";</script>
    </body></html>
    "#;

    #[test]
    fn fallback_reads_heading_range_and_ages() {
        let url = "https://www.nhb.gov.sg/peranakanmuseum/whatson/programmes/batik";
        let event =
            fallback_event(WORKSHOP_PAGE, url, "peranakan", &extractors()).expect("event");
        assert_eq!(event.title, "Batik Painting for Families");
        assert_eq!(event.start_rfc3339(), "2025-07-12T00:00:00+08:00");
        assert!(event.end.is_some());
        assert_eq!(event.raw_date.as_deref(), Some("12 Jul 2025 - 13 Jul 2025"));
        assert_eq!(event.age_ranges, vec![AgeRange(Some(7), Some(12))]);
        assert_eq!((event.age_min, event.age_max), (Some(7), Some(12)));
        assert_eq!(event.categories, vec!["Exhibition"]);
    }

    #[test]
    fn fallback_uses_short_date_like_text() {
        let page = r#"
        <html><body>
          <h2>Lion Dance Spectacular</h2>
          <footer><p>Copyright 2025 Sat, 1 Jan</p></footer>
          <span>Sat, 8 Feb 2025, 2pm</span>
        </body></html>
        "#;
        let url = "https://gatewaytheatre.sg/whats-on/lion";
        let event = fallback_event(page, url, "gateway", &extractors()).expect("event");
        assert_eq!(event.title, "Lion Dance Spectacular");
        assert_eq!(event.raw_date.as_deref(), Some("Sat, 8 Feb 2025, 2pm"));
        assert_eq!(event.start_rfc3339(), "2025-02-08T14:00:00+08:00");
        assert_eq!(event.categories, vec!["Dance"]);
    }

    #[test]
    fn fallback_keeps_start_when_time_follows_a_yearless_date() {
        let page = r#"
        <html><body>
          <h1>Shadow Puppet Playtime</h1>
          <p class="date">Sat, 14 March, 10:30am</p>
        </body></html>
        "#;
        let url = "https://gatewaytheatre.sg/whats-on/shadow-puppets";
        let event = fallback_event(page, url, "gateway", &extractors()).expect("event");
        assert_eq!(event.raw_date.as_deref(), Some("Sat, 14 March, 10:30am"));
        assert_eq!(event.start_rfc3339(), "2025-03-14T10:30:00+08:00");
    }

    #[test]
    fn navigation_headings_are_not_events() {
        let page = "<html><body><h1>Exhibitions</h1><p>1 Mar 2025</p></body></html>";
        assert!(fallback_event(page, "https://x.sg/exhibitions", "sam", &extractors()).is_none());

        let headless = "<html><body><p>1 Mar 2025</p></body></html>";
        assert!(fallback_event(headless, "https://x.sg", "sam", &extractors()).is_none());
    }

    #[test]
    fn detail_pages_prefer_structured_data() {
        let page = r#"
        <html><head><script type="application/ld+json">
        {"@type": "TheaterEvent", "name": "The Little Prince", "startDate": "2025-09-06T15:00:00+08:00"}
        </script></head>
        <body><h1>Ignored Heading</h1><p>Recommended for ages 5 and above</p></body></html>
        "#;
        let scraper = ListingScraper::new(venue("gateway"));
        let url = "https://gatewaytheatre.sg/whats-on/little-prince";
        let events = scraper.parse_detail_page(page, url, &extractors());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "The Little Prince");
        assert_eq!(events[0].url, url);
        assert_eq!(events[0].age_ranges, vec![AgeRange(Some(5), None)]);
        assert_eq!(events[0].categories, vec!["Theatre"]);
    }
}
