use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::text::{clean_text, normalize_space};

static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector"));
static HIDDEN_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script, style, noscript, template").expect("hidden selector"));

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(inner_text)
        .filter(|text| !text.is_empty())
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    normalize_space(&element.text().collect::<Vec<_>>().join(" "))
}

/// Visible text of a whole page, script and style bodies excluded.
pub fn visible_text(document: &Html) -> String {
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return clean_text(&document.root_element().html());
    };
    let hidden: Vec<_> = body.select(&HIDDEN_SELECTOR).map(|el| el.id()).collect();
    let mut parts = Vec::new();
    for node in body.descendants() {
        if let Some(text) = node.value().as_text() {
            if node.ancestors().any(|a| hidden.contains(&a.id())) {
                continue;
            }
            parts.push(&**text);
        }
    }
    normalize_space(&parts.join(" "))
}

pub fn absolute_url(base: &str, href: Option<String>) -> Option<String> {
    let href = href?;
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// True when `url` is on `base`'s host or one of its subdomains.
pub fn same_domain(url: &str, base: &str) -> bool {
    let host = |value: &str| {
        Url::parse(value)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
    };
    match (host(url), host(base)) {
        (Some(host), Some(root)) => host == root || host.ends_with(&format!(".{root}")),
        _ => false,
    }
}

pub fn fetch_html(url: &str) -> Result<String> {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; CultureCatalogBot/0.1)")
            .build()
            .expect("http client")
    });

    debug!(%url, "fetching");
    let response = CLIENT
        .get(url)
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .with_context(|| format!("unable to read response body for {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            absolute_url("https://www.sso.org.sg/family", Some("/whats-on/a".to_string())),
            Some("https://www.sso.org.sg/whats-on/a".to_string())
        );
        assert_eq!(absolute_url("https://www.sso.org.sg/", Some("#top".to_string())), None);
        assert_eq!(absolute_url("https://www.sso.org.sg/", None), None);
    }

    #[test]
    fn subdomains_count_as_same_domain() {
        assert!(same_domain("https://tickets.sso.org.sg/x", "https://sso.org.sg"));
        assert!(same_domain("https://SSO.org.sg/x", "https://sso.org.sg/base"));
        assert!(!same_domain("https://notsso.org.sg/x", "https://sso.org.sg"));
        assert!(!same_domain("/relative", "https://sso.org.sg"));
    }

    #[test]
    fn visible_text_skips_scripts() {
        let doc = Html::parse_document(
            "<html><head><title>T</title></head><body><h1>Hello</h1><script>var a;</script><p>World</p></body></html>",
        );
        assert_eq!(visible_text(&doc), "Hello World");
    }
}
