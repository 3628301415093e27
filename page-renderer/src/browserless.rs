use crate::page::RenderedPage;
use crate::{PageRenderer, RenderSession};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tubescout_core::{CoreError, RenderError, RenderSettings};

/// Selectors that identify the cookie consent interstitial.
pub const CONSENT_SELECTORS: &str =
    "button[aria-label^='Accept the use of cookies'], form[action*='consent.youtube.com']";

/// Cookie sent once consent has been accepted in a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsentCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl Default for ConsentCookie {
    fn default() -> Self {
        Self {
            name: "SOCS".to_string(),
            value: "CAESEwgDEgk0ODE3Nzk3MjQaAmVuIAEaBgiA_LyaBg".to_string(),
            domain: ".youtube.com".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_timeout: Option<u64>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    cookies: &'a [ConsentCookie],
}

/// Renders pages through a Browserless `/content` endpoint.
#[derive(Debug, Clone)]
pub struct BrowserlessRenderer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    open_sessions: Arc<AtomicUsize>,
}

impl BrowserlessRenderer {
    pub fn new(settings: &RenderSettings) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.browserless_url.trim_end_matches('/').to_string(),
            token: settings.browserless_token.clone().filter(|t| !t.is_empty()),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Sessions opened and not yet closed or dropped.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Fetch fully rendered HTML for `url`.
    pub async fn content(
        &self,
        url: &str,
        settle: Duration,
        cookies: &[ConsentCookie],
    ) -> Result<String, RenderError> {
        validate_url(url)?;

        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let wait_ms = settle.as_millis() as u64;
        let body = ContentRequest {
            url,
            wait_for_timeout: (wait_ms > 0).then_some(wait_ms),
            cookies,
        };

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    RenderError::Transport {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(|e| RenderError::Transport {
            reason: e.to_string(),
        })
    }
}

fn validate_url(url: &str) -> Result<(), RenderError> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(RenderError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

impl PageRenderer for BrowserlessRenderer {
    type Session = BrowserlessSession;

    async fn open(&self) -> Result<BrowserlessSession, CoreError> {
        let active = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Opened render session ({} active)", active);
        Ok(BrowserlessSession {
            renderer: self.clone(),
            cookies: Vec::new(),
            current: None,
            last_error: None,
        })
    }
}

/// Browserless is stateless per request; the session carries the cookies and
/// the last rendered page between calls.
#[derive(Debug)]
pub struct BrowserlessSession {
    renderer: BrowserlessRenderer,
    cookies: Vec<ConsentCookie>,
    current: Option<RenderedPage>,
    last_error: Option<String>,
}

impl RenderSession for BrowserlessSession {
    async fn navigate(&mut self, url: &str, settle: Duration) -> Result<(), CoreError> {
        self.current = None;
        debug!("Rendering {}", url);
        match self.renderer.content(url, settle, &self.cookies).await {
            Ok(html) => {
                self.last_error = None;
                self.current = Some(RenderedPage::new(url, html));
                Ok(())
            }
            Err(e) => {
                warn!("Failed to render {}: {}", url, e);
                self.last_error = Some(e.to_string());
                Err(CoreError::Render(e))
            }
        }
    }

    async fn dismiss_consent(&mut self, wait: Duration) -> Result<bool, CoreError> {
        let Some(url) = self
            .current
            .as_ref()
            .filter(|page| page.has_match(CONSENT_SELECTORS))
            .map(|page| page.url().to_string())
        else {
            info!("Cookies banner not found");
            return Ok(false);
        };

        if self.cookies.is_empty() {
            self.cookies.push(ConsentCookie::default());
        }
        self.navigate(&url, wait).await?;
        info!("Cookies banner found and closed");
        Ok(true)
    }

    async fn close(self) -> Result<(), CoreError> {
        debug!("Closing render session");
        drop(self);
        Ok(())
    }

    fn current(&self) -> Option<&RenderedPage> {
        self.current.as_ref()
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for BrowserlessSession {
    fn drop(&mut self) {
        self.renderer.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
