//! Field extraction helpers for rendered channel pages and API payloads.

use regex::Regex;
use std::sync::LazyLock;

pub const NAME_SELECTOR: &str = "h1.dynamic-text-view-model-wiz__h1 span";
pub const ABOUT_TEXT_SELECTOR: &str = "div#description-container, yt-formatted-string#description";
pub const LOCATION_SELECTOR: &str = "ytd-channel-about-metadata-renderer div#description-container";
pub const FOLLOWING_SELECTOR: &str = "ytd-grid-channel-renderer, ytd-channel-renderer";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z0-9.\-]+").expect("valid email regex")
});
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Location[:\s]+[^\n]+|Lives in\s+[^\n]+)").expect("valid location regex")
});

/// Parse page text such as `"12.3K subscribers"` into a count.
pub fn parse_subscriber_text(text: &str) -> Option<u64> {
    let cleaned: String = text
        .to_lowercase()
        .replace("subscribers", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(n) = cleaned.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = cleaned.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        (cleaned.as_str(), 1.0)
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // Small bias so "4.35K" lands on 4350 rather than 4349.
    Some((value * multiplier + 1e-6).trunc() as u64)
}

pub fn first_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

/// `Location: ...` or `Lives in ...`, first line only.
pub fn location_phrase(text: &str) -> Option<String> {
    LOCATION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// A display name of exactly two words is taken to be a personal name.
pub fn guess_personal_name(display_name: &str) -> String {
    if display_name.split_whitespace().count() == 2 {
        display_name.trim().to_string()
    } else {
        String::new()
    }
}

/// Reduce Wikipedia topic URLs to their labels and join them with ", ".
pub fn normalize_topics(categories: &[String]) -> String {
    categories
        .iter()
        .map(|category| match category.rsplit_once("wikipedia.org/wiki/") {
            Some((_, label)) => label.replace('_', " "),
            None => category.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
