use scraper::{Html, Node};

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_space(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips markup by parsing `input` as a fragment and keeping only the
/// visible text nodes (script and style bodies are dropped).
pub fn clean_text(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(input);
    let mut parts: Vec<&str> = Vec::new();
    for node in fragment.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
                .unwrap_or(false)
        });
        if !hidden {
            parts.push(text);
        }
    }
    normalize_space(&parts.join(" "))
}

/// Matching key for titles: lower-cased, whitespace collapsed, anything
/// other than ascii letters, digits and spaces removed.
pub fn title_key(title: &str) -> String {
    let lowered = normalize_space(&title.to_lowercase());
    let kept: String = lowered
        .chars()
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == ' ')
        .collect();
    normalize_space(&kept)
}

/// Lower-case slug with non-alphanumeric runs collapsed to one hyphen.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
