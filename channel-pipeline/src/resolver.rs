use page_renderer::{Lookup, PageRenderer, RenderSession, RenderedPage};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use tubescout_core::{CoreError, RetryExecutor};

pub const YOUTUBE_BASE: &str = "https://www.youtube.com";

/// Handle link in the channel header's inline metadata row.
pub const HEADER_HANDLE_SELECTOR: &str = "div.yt-content-metadata-view-model-wiz__metadata-row.yt-content-metadata-view-model-wiz__metadata-row--metadata-row-inline span.yt-core-attributed-string--link-inherit-color";

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link\s+rel="canonical"\s+href="https://www\.youtube\.com/channel/(UC[0-9A-Za-z_\-]+)""#)
        .expect("valid canonical regex")
});
static EMBEDDED_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""channelId":"(UC[0-9A-Za-z_\-]+)""#).expect("valid channelId regex")
});
static CANONICAL_BASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""canonicalBaseUrl":"/(@[^"]+)""#).expect("valid canonicalBaseUrl regex")
});

/// Build a full channel URL from a handle or partial path and pin the locale.
/// The locale is appended only when neither parameter is present already.
pub fn normalize_channel_url(raw: &str, hl: &str, gl: &str) -> String {
    let raw = raw.trim();
    let url = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("{}/{}", YOUTUBE_BASE, raw.trim_start_matches('/'))
    };

    let hl_param = format!("hl={}", hl);
    let gl_param = format!("gl={}", gl);
    if url.contains(&hl_param) || url.contains(&gl_param) {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}&{}", url, separator, hl_param, gl_param)
}

/// Sub-page of a channel URL, e.g. `about` or `channels`.
pub fn channel_subpage_url(channel_url: &str, subpage: &str, hl: &str, gl: &str) -> String {
    let base = channel_url.split('?').next().unwrap_or(channel_url);
    format!("{}/{}?hl={}&gl={}", base.trim_end_matches('/'), subpage, hl, gl)
}

/// Canonical link first, then the embedded `channelId` field.
pub fn channel_id_from_page(page: &RenderedPage) -> Option<String> {
    if let Some(id) = page.capture(&CANONICAL_RE) {
        debug!("Found channelId via canonical: {}", id);
        return Some(id);
    }
    let id = page.capture(&EMBEDDED_ID_RE);
    if let Some(ref id) = id {
        debug!("Found channelId in script: {}", id);
    }
    id
}

fn handle_from_session<S: RenderSession>(session: &S) -> Lookup<String> {
    match session.query_text(HEADER_HANDLE_SELECTOR) {
        Lookup::NotFound => session.query_pattern(&CANONICAL_BASE_RE),
        other => other,
    }
}

/// Resolves canonical channel ids from handles and handles from channel ids
/// by rendering channel pages.
pub struct HandleResolver<'a, R> {
    renderer: &'a R,
    retry: RetryExecutor,
    settle: Duration,
    consent_wait: Duration,
    hl: String,
    gl: String,
}

impl<'a, R: PageRenderer> HandleResolver<'a, R> {
    pub fn new(
        renderer: &'a R,
        retry: RetryExecutor,
        settle: Duration,
        hl: impl Into<String>,
        gl: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            retry,
            settle,
            consent_wait: Duration::ZERO,
            hl: hl.into(),
            gl: gl.into(),
        }
    }

    pub fn with_consent_wait(mut self, wait: Duration) -> Self {
        self.consent_wait = wait;
        self
    }

    pub fn channel_url(&self, handle: &str) -> String {
        normalize_channel_url(handle, &self.hl, &self.gl)
    }

    /// Canonical `UC...` id for `handle`, or an empty string when it cannot be
    /// determined.
    pub async fn resolve_channel_id(&self, handle: &str) -> String {
        let url = self.channel_url(handle);
        info!("Opening for channelId lookup: {}", url);

        let mut session = match self.renderer.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not open render session for {}: {}", handle, e);
                return String::new();
            }
        };
        let id = match session.navigate(&url, self.settle).await {
            Ok(()) => {
                if let Err(e) = session.dismiss_consent(self.consent_wait).await {
                    debug!("Consent dismissal failed for {}: {}", handle, e);
                }
                session.current().and_then(channel_id_from_page)
            }
            Err(e) => {
                warn!("Error extracting channelId for {}: {}", handle, e);
                None
            }
        };
        close_session(session).await;

        id.unwrap_or_else(|| {
            info!("Could not find channelId for {}", handle);
            String::new()
        })
    }

    /// Handle (e.g. `@name`) shown on the channel page of `channel_id`.
    /// Render failures are retried; a page without a handle is not.
    pub async fn handle_for_channel(&self, channel_id: &str) -> Option<String> {
        let url = format!("{}/channel/{}", YOUTUBE_BASE, channel_id);
        let url = url.as_str();
        let renderer = self.renderer;
        let settle = self.settle;

        let outcome = self
            .retry
            .execute("channel handle lookup", move || async move {
                let mut session = renderer.open().await?;
                let navigated = session.navigate(url, settle).await;
                let lookup = handle_from_session(&session);
                close_session(session).await;
                navigated?;
                match lookup {
                    Lookup::RenderFailed(reason) => Err(CoreError::Internal { message: reason }),
                    other => Ok(other.found()),
                }
            })
            .await;

        match outcome {
            Ok(Some(Some(handle))) if !handle.trim().is_empty() => {
                info!("Found handle: {}", handle.trim());
                Some(handle.trim().to_string())
            }
            Ok(Some(_)) => {
                warn!("No handle on channel page {}", channel_id);
                None
            }
            Ok(None) => {
                warn!("Handle lookup retry limit exceeded for {}", channel_id);
                None
            }
            Err(halt) => {
                warn!("Handle lookup stopped: {}", halt);
                None
            }
        }
    }
}

pub(crate) async fn close_session<S: RenderSession>(session: S) {
    if let Err(e) = session.close().await {
        debug!("Closing render session failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRenderer;
    use tubescout_core::RetryConfig;

    fn resolver(renderer: &FakeRenderer) -> HandleResolver<'_, FakeRenderer> {
        HandleResolver::new(
            renderer,
            RetryExecutor::new(RetryConfig::new(3, Duration::from_millis(1))),
            Duration::ZERO,
            "en",
            "US",
        )
    }

    #[test]
    fn test_normalize_channel_url() {
        assert_eq!(
            normalize_channel_url("@marie", "en", "US"),
            "https://www.youtube.com/@marie?hl=en&gl=US"
        );
        assert_eq!(
            normalize_channel_url("/c/Marie ", "en", "US"),
            "https://www.youtube.com/c/Marie?hl=en&gl=US"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@marie?si=x", "en", "US"),
            "https://www.youtube.com/@marie?si=x&hl=en&gl=US"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/@marie?hl=en", "en", "US"),
            "https://www.youtube.com/@marie?hl=en"
        );
    }

    #[test]
    fn test_channel_subpage_url() {
        assert_eq!(
            channel_subpage_url("https://www.youtube.com/@marie/?hl=en&gl=US", "about", "en", "US"),
            "https://www.youtube.com/@marie/about?hl=en&gl=US"
        );
    }

    #[test]
    fn test_canonical_link_wins_over_embedded_id() {
        let page = RenderedPage::new(
            "u",
            r#"<script>{"channelId":"UCembedded"}</script><link rel="canonical" href="https://www.youtube.com/channel/UCcanonical">"#,
        );
        assert_eq!(channel_id_from_page(&page), Some("UCcanonical".to_string()));

        let page = RenderedPage::new("u", r#"var x = {"channelId":"UCembedded_1-2"};"#);
        assert_eq!(channel_id_from_page(&page), Some("UCembedded_1-2".to_string()));

        let page = RenderedPage::new("u", "<html></html>");
        assert_eq!(channel_id_from_page(&page), None);
    }

    #[tokio::test]
    async fn test_resolve_channel_id() {
        let renderer = FakeRenderer::new().with_page(
            "https://www.youtube.com/@marie?hl=en&gl=US",
            r#"<link rel="canonical" href="https://www.youtube.com/channel/UCmarie">"#,
        );
        let resolver = resolver(&renderer);

        assert_eq!(resolver.resolve_channel_id("@marie").await, "UCmarie");
        assert_eq!(resolver.resolve_channel_id("@missing").await, "");
        assert_eq!(renderer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_handle_for_channel_uses_header_then_fallback() {
        let header = r#"<div class="yt-content-metadata-view-model-wiz__metadata-row yt-content-metadata-view-model-wiz__metadata-row--metadata-row-inline"><span class="yt-core-attributed-string--link-inherit-color"> @Evel-901 </span></div>"#;
        let fallback = r#"<script>{"canonicalBaseUrl":"/@chezmarie"}</script>"#;
        let renderer = FakeRenderer::new()
            .with_page("https://www.youtube.com/channel/UC1", header)
            .with_page("https://www.youtube.com/channel/UC2", fallback)
            .with_page("https://www.youtube.com/channel/UC3", "<html></html>");
        let resolver = resolver(&renderer);

        assert_eq!(resolver.handle_for_channel("UC1").await, Some("@Evel-901".to_string()));
        assert_eq!(resolver.handle_for_channel("UC2").await, Some("@chezmarie".to_string()));
        assert_eq!(resolver.handle_for_channel("UC3").await, None);
        assert_eq!(renderer.navigations("https://www.youtube.com/channel/UC3"), 1);
        assert_eq!(renderer.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_handle_lookup_retries_render_failures() {
        let renderer = FakeRenderer::new().with_failing_page("https://www.youtube.com/channel/UCdown");
        let resolver = resolver(&renderer);

        assert_eq!(resolver.handle_for_channel("UCdown").await, None);
        assert_eq!(renderer.navigations("https://www.youtube.com/channel/UCdown"), 3);
        assert_eq!(renderer.open_sessions(), 0);
    }
}
