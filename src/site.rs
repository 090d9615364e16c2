use std::path::Path;

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::ages::AgeRange;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::models::{Event, UNTITLED};
use crate::scraping;
use crate::utils;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 960px; padding: 1.5rem; color: #1d2230; }
header p, footer { color: #5b6275; }
ul.events { list-style: none; padding: 0; }
ul.events li { border-bottom: 1px solid #e3e6ee; padding: 0.8rem 0; }
.meta { color: #5b6275; font-size: 0.9rem; }
.pill { display: inline-block; background: #eef1f8; border-radius: 999px; padding: 0.1rem 0.6rem; margin-right: 0.3rem; font-size: 0.8rem; }
dl.facts dt { font-weight: 600; }
dl.facts dd { margin: 0 0 0.6rem 0; }
.filters { display: flex; flex-wrap: wrap; gap: 0.8rem; margin: 1rem 0; }
.filters label { display: flex; flex-direction: column; font-size: 0.85rem; color: #5b6275; }
"#;

const FILTER_SCRIPT: &str = r#"
(function () {
  var source = document.getElementById('source-filter');
  var category = document.getElementById('category-filter');
  function apply() {
    var wantSource = source.value;
    var wantCategory = category.value;
    document.querySelectorAll('ul.events li').forEach(function (item) {
      var cats = (item.dataset.categories || '').split(',');
      var show = (!wantSource || item.dataset.source === wantSource)
        && (!wantCategory || cats.indexOf(wantCategory) !== -1);
      item.hidden = !show;
    });
  }
  source.addEventListener('change', apply);
  category.addEventListener('change', apply);
})();
"#;

/// Escapes text for HTML bodies and attribute values alike.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// "On 12 Apr 2025", "Runs ... to ...", "From ...", "Dates: raw" or
/// "Date TBC". Midnight starts are shown without a time.
pub fn date_label(event: &Event, tz: Tz) -> String {
    let fmt = |dt: &DateTime<FixedOffset>| {
        let local = dt.with_timezone(&tz);
        if local.hour() == 0 && local.minute() == 0 {
            local.format("%d %b %Y").to_string()
        } else {
            local.format("%d %b %Y %I:%M %p").to_string()
        }
    };

    match (event.start, event.end) {
        (Some(start), Some(end)) => {
            if start.with_timezone(&tz).date_naive() == end.with_timezone(&tz).date_naive() {
                format!("On {}", fmt(&start))
            } else {
                format!("Runs {} to {}", fmt(&start), fmt(&end))
            }
        }
        (Some(start), None) => format!("From {}", fmt(&start)),
        _ => match event.raw_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => format!("Dates: {raw}"),
            _ => "Date TBC".to_string(),
        },
    }
}

/// Comma-joined range labels, falling back to the summary pair.
pub fn age_label(event: &Event) -> String {
    let ranges = if event.age_ranges.is_empty() && event.has_age_summary() {
        vec![AgeRange(event.age_min, event.age_max)]
    } else {
        event.age_ranges.clone()
    };
    if ranges.is_empty() {
        return "Age not specified".to_string();
    }
    ranges
        .iter()
        .map(AgeRange::label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders the whole static site into `out_dir`.
pub struct SiteBuilder<'a> {
    config: &'a CatalogConfig,
    tz: Tz,
}

impl<'a> SiteBuilder<'a> {
    pub fn new(config: &'a CatalogConfig) -> Result<Self> {
        Ok(Self {
            config,
            tz: config.tz()?,
        })
    }

    pub fn build(&self, events: &[Event], raw_count: usize, out_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(events)
            .map_err(|err| CatalogError::json(out_dir.join("events.json"), err))?;
        utils::write_text(&out_dir.join("events.json"), &json)?;
        utils::write_text(&out_dir.join("rss.xml"), &self.render_rss(events))?;
        utils::write_text(&out_dir.join("index.html"), &self.render_index(events))?;
        utils::write_text(
            &out_dir.join("about.html"),
            &self.render_about(events, raw_count),
        )?;

        let mut pages = 0;
        for event in events {
            let Some(detail_url) = event.detail_url.as_deref().filter(|u| !u.trim().is_empty())
            else {
                continue;
            };
            utils::write_text(&out_dir.join(detail_url), &self.render_event_page(event))?;
            pages += 1;
        }

        info!(
            events = events.len(),
            raw = raw_count,
            pages,
            out = %out_dir.display(),
            "site built"
        );
        Ok(())
    }

    fn link_for(&self, event: &Event) -> String {
        match event.detail_url.as_deref().map(str::trim) {
            Some(detail) if !detail.is_empty() => {
                format!("{}/{detail}", self.config.site.base_url.trim_end_matches('/'))
            }
            _ => event.url.clone(),
        }
    }

    /// Labels of the sources present in `events`, first-seen order.
    fn source_summary(&self, events: &[Event]) -> String {
        let mut seen: Vec<&str> = Vec::new();
        for event in events {
            let source = event.source.trim();
            if !source.is_empty() && !seen.contains(&source) {
                seen.push(source);
            }
        }
        if seen.is_empty() {
            return "No sources".to_string();
        }
        seen.iter()
            .map(|source| self.config.source_label(source))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn scraped_places(&self) -> String {
        scraping::list_scrapers()
            .iter()
            .map(|info| self.config.source_label(&info.id))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn summary_line(&self, event: &Event) -> String {
        [
            event.venue.clone().unwrap_or_default(),
            event.price.clone().unwrap_or_default(),
            age_label(event),
            event.categories.join(", "),
        ]
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
    }

    fn page(&self, title: &str, head_extra: &str, body: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{head_extra}<link rel="alternate" type="application/rss+xml" title="{site}" href="{base}/rss.xml">
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>
"#,
            site = html_escape(&self.config.site.title),
            base = html_escape(self.config.site.base_url.trim_end_matches('/')),
        )
    }

    pub fn render_index(&self, events: &[Event]) -> String {
        let updated = Utc::now().with_timezone(&self.tz).format("%d %b %Y, %H:%M %Z");
        let items: String = events
            .iter()
            .map(|event| {
                let href = event
                    .detail_url
                    .clone()
                    .unwrap_or_else(|| event.url.clone());
                let pills: String = event
                    .categories
                    .iter()
                    .map(|cat| format!(r#"<span class="pill">{}</span>"#, html_escape(cat)))
                    .collect();
                format!(
                    r#"<li data-source="{source}" data-categories="{cats}">
<a href="{href}">{title}</a>
<div class="meta">{date} &middot; {age} &middot; {label}</div>
<div>{pills}</div>
</li>
"#,
                    source = html_escape(&event.source),
                    cats = html_escape(&event.categories.join(",").to_lowercase()),
                    href = html_escape(&href),
                    title = html_escape(&event.title),
                    date = html_escape(&date_label(event, self.tz)),
                    age = html_escape(&age_label(event)),
                    label = html_escape(&self.config.source_label(&event.source)),
                )
            })
            .collect();

        let body = format!(
            r#"<header>
<h1>{title}</h1>
<p>{description}</p>
<p>Sources in this build: {sources}. Updated {updated}. <a href="about.html">About</a></p>
</header>
<main>
{filters}
<ul class="events">
{items}</ul>
</main>
<script>{FILTER_SCRIPT}</script>"#,
            title = html_escape(&self.config.site.title),
            description = html_escape(&self.config.site.description),
            sources = html_escape(&self.source_summary(events)),
            filters = self.render_filters(events),
        );
        self.page(&html_escape(&self.config.site.title), "", &body)
    }

    /// Source and category pickers over the `data-*` attributes of the
    /// index items. Option values match those attributes exactly.
    fn render_filters(&self, events: &[Event]) -> String {
        let mut sources: Vec<&str> = Vec::new();
        let mut categories: Vec<String> = Vec::new();
        for event in events {
            if !event.source.is_empty() && !sources.contains(&event.source.as_str()) {
                sources.push(&event.source);
            }
            for cat in &event.categories {
                if !categories.iter().any(|seen| seen.eq_ignore_ascii_case(cat)) {
                    categories.push(cat.clone());
                }
            }
        }
        categories.sort();

        let source_options: String = sources
            .iter()
            .map(|source| {
                format!(
                    r#"<option value="{}">{}</option>"#,
                    html_escape(source),
                    html_escape(&self.config.source_label(source))
                )
            })
            .collect();
        let category_options: String = categories
            .iter()
            .map(|cat| {
                format!(
                    r#"<option value="{}">{}</option>"#,
                    html_escape(&cat.to_lowercase()),
                    html_escape(cat)
                )
            })
            .collect();

        format!(
            r#"<form class="filters" id="filters">
<label>Source <select id="source-filter"><option value="">All sources</option>{source_options}</select></label>
<label>Category <select id="category-filter"><option value="">All categories</option>{category_options}</select></label>
</form>"#
        )
    }

    pub fn render_about(&self, events: &[Event], raw_count: usize) -> String {
        let body = format!(
            r#"<header><h1>About {title}</h1><p><a href="index.html">Back to events</a></p></header>
<main>
<p>Places scraped: {places}.</p>
<p>Sources with events in this build: {sources}.</p>
<p>{raw_count} raw records were collected and {deduped} events remain after de-duplication.</p>
<h2>Date labels</h2>
<ul>
<li><code>On ...</code> for single-day events.</li>
<li><code>Runs ... to ...</code> when a clear start and end date are found.</li>
<li><code>From ...</code> when only a start date is available.</li>
<li><code>Date TBC</code> when source pages do not provide parseable dates.</li>
</ul>
</main>"#,
            title = html_escape(&self.config.site.title),
            places = html_escape(&self.scraped_places()),
            sources = html_escape(&self.source_summary(events)),
            deduped = events.len(),
        );
        let title = format!("About | {}", html_escape(&self.config.site.title));
        self.page(&title, "", &body)
    }

    pub fn render_event_page(&self, event: &Event) -> String {
        let title = if event.title.trim().is_empty() {
            UNTITLED
        } else {
            event.title.as_str()
        };
        let categories = if event.categories.is_empty() {
            "Uncategorized".to_string()
        } else {
            event.categories.join(", ")
        };
        let source_label = self.config.source_label(&event.source);
        let source_url = if event.url.is_empty() { "#" } else { event.url.as_str() };
        let date = date_label(event, self.tz);

        let mut description = self.summary_line(event);
        if description.is_empty() {
            description = date.clone();
        } else {
            description = format!("{description} | {date}");
        }
        let head = format!(
            "<meta name=\"description\" content=\"{}\">\n<link rel=\"canonical\" href=\"{}\">\n",
            html_escape(&description),
            html_escape(&self.link_for(event)),
        );

        let pills: String = event
            .categories
            .iter()
            .chain(std::iter::once(&source_label))
            .map(|label| format!(r#"<span class="pill">{}</span>"#, html_escape(label)))
            .collect();

        let body = format!(
            r#"<header><p><a href="../index.html">{site}</a></p><h1>{title}</h1><div>{pills}</div></header>
<main>
<dl class="facts">
<dt>When</dt><dd>{date}</dd>
<dt>Venue</dt><dd>{venue}</dd>
<dt>Price</dt><dd>{price}</dd>
<dt>Ages</dt><dd>{age}</dd>
<dt>Categories</dt><dd>{categories}</dd>
<dt>Source</dt><dd>{source}</dd>
</dl>
<p><a href="{source_url}" rel="noopener">View on the venue site</a></p>
</main>"#,
            site = html_escape(&self.config.site.title),
            title = html_escape(title),
            date = html_escape(&date),
            venue = html_escape(event.venue.as_deref().unwrap_or("Not specified")),
            price = html_escape(event.price.as_deref().unwrap_or("Not specified")),
            age = html_escape(&age_label(event)),
            categories = html_escape(&categories),
            source = html_escape(&source_label),
            source_url = html_escape(source_url),
        );
        let page_title = format!(
            "{} | {}",
            html_escape(title),
            html_escape(&self.config.site.title)
        );
        self.page(&page_title, &head, &body)
    }

    pub fn render_rss(&self, events: &[Event]) -> String {
        let items: String = events
            .iter()
            .map(|event| {
                let link = html_escape(&self.link_for(event));
                let pub_date = event
                    .start
                    .map(|start| format!("\n      <pubDate>{}</pubDate>", start.to_rfc2822()))
                    .unwrap_or_default();
                format!(
                    r#"
    <item>
      <title>{title}</title>
      <link>{link}</link>
      <guid>{link}</guid>{pub_date}
      <description>{description}</description>
    </item>"#,
                    title = html_escape(&event.title),
                    description = html_escape(&self.summary_line(event)),
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>{link}</link>
    <description>{description}</description>
    <lastBuildDate>{built}</lastBuildDate>{items}
  </channel>
</rss>
"#,
            title = html_escape(&self.config.site.title),
            link = html_escape(&self.config.site.base_url),
            description = html_escape(&self.config.site.description),
            built = Utc::now().with_timezone(&self.tz).to_rfc2822(),
        )
    }
}

/// Writes events.json, rss.xml, index.html, about.html and one page per
/// event into `out_dir`.
pub fn build_site(
    events: &[Event],
    raw_count: usize,
    out_dir: &Path,
    config: &CatalogConfig,
) -> Result<()> {
    SiteBuilder::new(config)?.build(events, raw_count, out_dir)
}
