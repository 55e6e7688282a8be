//! HTML parser for extracting page content and links
//!
//! This module handles parsing HTML content to extract:
//! - Page title and meta description
//! - Visible text with scripts and styles removed
//! - Same-origin links to follow, canonicalized and deduplicated

use crate::url::{canonicalize, same_origin};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text content is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Trimmed text of the `<title>` element, empty if absent
    pub title: String,

    /// Trimmed `content` of `<meta name="description">`, empty if absent
    pub description: String,

    /// Visible text, whitespace collapsed, truncated to the configured length
    pub text: String,

    /// Canonical same-origin links in discovery order
    pub links: Vec<Url>,
}

/// Parses HTML content and extracts title, description, text and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document, resolved against `base_url`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Fragment-only references (same-page anchors)
/// - `javascript:`, `mailto:`, `tel:` and `data:` references
/// - Links to a different origin (scheme or host differs)
/// - Repeats of a link already seen on the page, after canonicalization
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The URL the page was fetched from
/// * `max_text_length` - Maximum number of characters of visible text kept
///
/// # Example
///
/// ```
/// use sumi_harvest::crawler::parse_page;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_page(html, &base_url, 5000);
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_page(html: &str, base_url: &Url, max_text_length: usize) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        text: extract_visible_text(&document, max_text_length),
        links: extract_links(&document, base_url),
    }
}

fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_description(document: &Html) -> String {
    let Ok(meta_selector) = Selector::parse("meta[name][content]") else {
        return String::new();
    };

    document
        .select(&meta_selector)
        .find(|meta| {
            meta.value()
                .attr("name")
                .map_or(false, |name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// Collects the text of `<body>` (or the whole document when there is no
/// body), skipping hidden elements, collapsing whitespace and truncating
fn extract_visible_text(document: &Html, max_chars: usize) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor)
                .map_or(false, |el| HIDDEN_ELEMENTS.contains(&el.value().name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    truncate_chars(&words.join(" "), max_chars)
}

/// Text of an element with runs of whitespace collapsed to single spaces
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        if let Ok(url) = canonicalize(href, base_url) {
            if same_origin(&url, base_url) && seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}
