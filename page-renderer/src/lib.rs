pub mod browserless;
pub mod page;

pub use browserless::{BrowserlessRenderer, BrowserlessSession, ConsentCookie};
pub use page::RenderedPage;

use regex::Regex;
use std::time::Duration;
use tubescout_core::CoreError;

/// Typed outcome of querying a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    RenderFailed(String),
}

impl<T> Lookup<T> {
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::RenderFailed(reason) => Lookup::RenderFailed(reason),
        }
    }
}

/// Something that can hand out rendering sessions.
pub trait PageRenderer {
    type Session: RenderSession;

    async fn open(&self) -> Result<Self::Session, CoreError>;
}

/// One logical browsing task. Dropping the session releases it; `close` does
/// the same with a log line.
pub trait RenderSession {
    /// Render `url`, waiting `settle` for client-side content. On failure the
    /// session holds no current page.
    async fn navigate(&mut self, url: &str, settle: Duration) -> Result<(), CoreError>;

    /// Accept the consent interstitial if the current page shows one.
    /// Returns whether anything was dismissed.
    async fn dismiss_consent(&mut self, wait: Duration) -> Result<bool, CoreError>;

    async fn close(self) -> Result<(), CoreError>;

    fn current(&self) -> Option<&RenderedPage>;

    fn last_error(&self) -> Option<&str>;

    fn query_text(&self, selector: &str) -> Lookup<String> {
        self.query(|page| page.first_text(selector))
    }

    fn query_text_containing(&self, tag: &str, needle: &str) -> Lookup<String> {
        self.query(|page| page.text_containing(tag, needle))
    }

    /// Texts of all matches; no match is `NotFound`.
    fn query_all_text(&self, selector: &str) -> Lookup<Vec<String>> {
        self.query(|page| Some(page.all_text(selector)).filter(|texts| !texts.is_empty()))
    }

    /// Number of matches; zero is still `Found`.
    fn query_count(&self, selector: &str) -> Lookup<usize> {
        self.query(|page| Some(page.count(selector)))
    }

    fn query_pattern(&self, pattern: &Regex) -> Lookup<String> {
        self.query(|page| page.capture(pattern))
    }

    fn query<T>(&self, extract: impl FnOnce(&RenderedPage) -> Option<T>) -> Lookup<T> {
        match self.current() {
            Some(page) => Lookup::from_option(extract(page)),
            None => Lookup::RenderFailed(
                self.last_error()
                    .unwrap_or("no page has been rendered")
                    .to_string(),
            ),
        }
    }
}
