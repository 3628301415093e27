use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Fully rendered HTML for one URL. The markup is parsed on demand so the
/// value stays `Send` and can be held across awaits.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    url: String,
    html: String,
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Invalid CSS selector '{}': {:?}", selector, e);
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &str {
        &self.html
    }

    pub fn has_match(&self, selector: &str) -> bool {
        self.count(selector) > 0
    }

    /// Trimmed text of the first element matching `selector` that has any text.
    pub fn first_text(&self, selector: &str) -> Option<String> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        let text = document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty());
        text
    }

    /// Text of every matching element, in document order, empties included.
    pub fn all_text(&self, selector: &str) -> Vec<String> {
        let Some(selector) = parse_selector(selector) else {
            return Vec::new();
        };
        let document = Html::parse_document(&self.html);
        let texts = document.select(&selector).map(element_text).collect();
        texts
    }

    pub fn count(&self, selector: &str) -> usize {
        let Some(selector) = parse_selector(selector) else {
            return 0;
        };
        let document = Html::parse_document(&self.html);
        let count = document.select(&selector).count();
        count
    }

    /// First `tag` element whose own text nodes contain `needle`; returns the
    /// element's full trimmed text.
    pub fn text_containing(&self, tag: &str, needle: &str) -> Option<String> {
        let selector = parse_selector(tag)?;
        let document = Html::parse_document(&self.html);
        let text = document
            .select(&selector)
            .find(|element| {
                element
                    .children()
                    .filter_map(|child| child.value().as_text())
                    .any(|text| text.contains(needle))
            })
            .map(element_text);
        text
    }

    /// First capture group of `pattern` over the raw markup.
    pub fn capture(&self, pattern: &Regex) -> Option<String> {
        pattern
            .captures(&self.html)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }
}
