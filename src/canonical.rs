use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static LOCALE_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z]{2}(?:-[a-z]{2})?$").expect("valid locale regex"));

/// Stable identity form of an event page URL: lower-case scheme and host,
/// locale prefixes (`/en/`, `/en-sg/`) removed, no trailing slash, no query
/// or fragment. Relative or malformed input is returned trimmed.
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return trimmed.to_string(),
    };

    let mut segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
    // strip every leading locale so a second pass finds nothing left to strip
    while segments
        .first()
        .map_or(false, |first| LOCALE_SEGMENT_RE.is_match(first))
    {
        segments.remove(0);
    }

    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!(
        "{}://{}{}/{}",
        parsed.scheme().to_lowercase(),
        host,
        port,
        segments.join("/")
    )
}
