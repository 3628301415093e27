//! In-memory stand-ins for the YouTube API and the page renderer.

use page_renderer::browserless::CONSENT_SELECTORS;
use page_renderer::{PageRenderer, RenderSession, RenderedPage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tubescout_core::{CoreError, RenderError, YouTubeApiError};
use youtube_client::*;

pub const CONSENT_HTML: &str =
    r#"<form action="https://consent.youtube.com/save"><button>Accept all</button></form>"#;

/// Scripted outcome of one fake API call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Transient,
    Quota,
    /// HTTP 429 with the `quotaExceeded` reason, decoded like a live response.
    RateLimited,
}

const RATE_LIMITED_BODY: &str = r#"{"error":{"code":429,"message":"Quota exceeded for quota metric 'Queries'","errors":[{"reason":"quotaExceeded"}]}}"#;

impl<T> Reply<T> {
    fn into_result(self, endpoint: &str) -> Result<T, CoreError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Transient => Err(YouTubeApiError::ServerError { status_code: 503 }.into()),
            Reply::Quota => Err(YouTubeApiError::QuotaExceeded {
                status: 403,
                reason: format!("{} quotaExceeded", endpoint),
            }
            .into()),
            Reply::RateLimited => Err(map_status_error(429, RATE_LIMITED_BODY, endpoint).into()),
        }
    }
}

pub fn search_page(prefix: &str, count: usize, next: Option<&str>) -> SearchListResponse {
    let items = (0..count)
        .map(|i| search_item(&format!("{}{}", prefix, i), &format!("UC{}{}", prefix, i), "Bonjour à tous"))
        .collect();
    SearchListResponse {
        next_page_token: next.map(str::to_string),
        items,
    }
}

pub fn search_item(video_id: &str, channel_id: &str, title: &str) -> SearchItem {
    SearchItem {
        id: SearchItemId {
            kind: "youtube#video".to_string(),
            video_id: Some(video_id.to_string()),
        },
        snippet: SearchSnippet {
            channel_id: channel_id.to_string(),
            title: title.to_string(),
            description: String::new(),
            published_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

pub fn channel_item(id: &str, subscribers: u64, uploads: Option<&str>) -> ChannelItem {
    ChannelItem {
        id: id.to_string(),
        snippet: Some(ChannelSnippet {
            title: format!("Channel {}", id),
            published_at: "2019-05-04T10:20:30Z".to_string(),
            country: Some("FR".to_string()),
            custom_url: None,
        }),
        statistics: Some(ChannelStatistics {
            view_count: Some("1000".to_string()),
            subscriber_count: Some(subscribers.to_string()),
            hidden_subscriber_count: false,
            video_count: None,
        }),
        content_details: uploads.map(|playlist| ChannelContentDetails {
            related_playlists: RelatedPlaylists {
                uploads: Some(playlist.to_string()),
            },
        }),
        topic_details: Some(TopicDetails {
            topic_categories: vec!["https://en.wikipedia.org/wiki/Food".to_string()],
        }),
    }
}

pub fn playlist_page(entries: &[(&str, &str)]) -> PlaylistItemListResponse {
    PlaylistItemListResponse {
        next_page_token: None,
        items: entries
            .iter()
            .map(|(video_id, published)| PlaylistItem {
                content_details: PlaylistItemContentDetails {
                    video_id: video_id.to_string(),
                    video_published_at: Some(published.to_string()),
                },
            })
            .collect(),
    }
}

#[derive(Default)]
struct ApiScript {
    search_pages: VecDeque<Reply<SearchListResponse>>,
    search_tokens: Vec<Option<String>>,
    statistics: HashMap<String, Reply<ChannelItem>>,
    full: HashMap<String, ChannelItem>,
    quota_on_full_call: Option<usize>,
    playlists: HashMap<String, Vec<PlaylistItemListResponse>>,
    failing_playlist_pages: HashSet<usize>,
    durations: HashMap<String, String>,
    engagement: HashMap<String, (u64, u64)>,
    fail_statistics: bool,
    calls: HashMap<&'static str, usize>,
}

/// Scripted [`YouTubeApi`] that counts every call per endpoint.
#[derive(Default)]
pub struct FakeApi {
    script: Mutex<ApiScript>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut ApiScript)) -> Self {
        f(&mut *self.script.lock().unwrap());
        self
    }

    pub fn with_search_pages(self, pages: Vec<Reply<SearchListResponse>>) -> Self {
        self.edit(|s| s.search_pages.extend(pages))
    }

    pub fn with_statistics(self, channel_id: &str, reply: Reply<ChannelItem>) -> Self {
        self.edit(|s| {
            s.statistics.insert(channel_id.to_string(), reply);
        })
    }

    pub fn with_channel(self, item: ChannelItem) -> Self {
        self.edit(|s| {
            s.full.insert(item.id.clone(), item);
        })
    }

    /// The `n`th (1-based) `channel_full` call is rejected with a 429 quota error.
    pub fn with_quota_on_full_call(self, n: usize) -> Self {
        self.edit(|s| s.quota_on_full_call = Some(n))
    }

    /// Pages are chained with tokens `page-1`, `page-2`, ...
    pub fn with_playlist(self, playlist_id: &str, pages: Vec<PlaylistItemListResponse>) -> Self {
        self.edit(|s| {
            s.playlists.insert(playlist_id.to_string(), pages);
        })
    }

    /// Every request for page `index` (0-based) of any playlist is a 503.
    pub fn with_failing_playlist_page(self, index: usize) -> Self {
        self.edit(|s| {
            s.failing_playlist_pages.insert(index);
        })
    }

    pub fn with_video(self, video_id: &str, duration: &str, likes: u64, comments: u64) -> Self {
        self.edit(|s| {
            if !duration.is_empty() {
                s.durations.insert(video_id.to_string(), duration.to_string());
            }
            s.engagement.insert(video_id.to_string(), (likes, comments));
        })
    }

    pub fn with_failing_statistics(self) -> Self {
        self.edit(|s| s.fail_statistics = true)
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn search_tokens(&self) -> Vec<Option<String>> {
        self.script.lock().unwrap().search_tokens.clone()
    }

    fn count(script: &mut ApiScript, endpoint: &'static str) -> usize {
        let calls = script.calls.entry(endpoint).or_insert(0);
        *calls += 1;
        *calls
    }
}

impl YouTubeApi for FakeApi {
    async fn search(&self, request: &SearchRequest) -> Result<SearchListResponse, CoreError> {
        let mut script = self.script.lock().unwrap();
        Self::count(&mut script, "search");
        script.search_tokens.push(request.page_token.clone());
        script
            .search_pages
            .pop_front()
            .unwrap_or(Reply::Ok(SearchListResponse::default()))
            .into_result("search")
    }

    async fn channel_statistics(&self, channel_id: &str) -> Result<ChannelListResponse, CoreError> {
        let mut script = self.script.lock().unwrap();
        Self::count(&mut script, "channel_statistics");
        match script.statistics.get(channel_id).cloned() {
            Some(reply) => reply
                .into_result("channels")
                .map(|item| ChannelListResponse { items: vec![item] }),
            None => Ok(ChannelListResponse::default()),
        }
    }

    async fn channel_full(&self, channel_id: &str) -> Result<ChannelListResponse, CoreError> {
        let mut script = self.script.lock().unwrap();
        let call = Self::count(&mut script, "channel_full");
        if script.quota_on_full_call == Some(call) {
            return Reply::<ChannelListResponse>::RateLimited.into_result("channels");
        }
        Ok(ChannelListResponse {
            items: script.full.get(channel_id).cloned().into_iter().collect(),
        })
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemListResponse, CoreError> {
        let mut script = self.script.lock().unwrap();
        Self::count(&mut script, "playlist_items");
        let index = page_token
            .and_then(|token| token.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        if script.failing_playlist_pages.contains(&index) {
            return Reply::<PlaylistItemListResponse>::Transient.into_result("playlistItems");
        }
        let pages = script.playlists.get(playlist_id).cloned().unwrap_or_default();
        let mut page = pages.get(index).cloned().unwrap_or_default();
        if index + 1 < pages.len() {
            page.next_page_token = Some(format!("page-{}", index + 1));
        }
        Ok(page)
    }

    async fn video_details(
        &self,
        ids: &[String],
        part: VideoPart,
    ) -> Result<VideoListResponse, CoreError> {
        let mut script = self.script.lock().unwrap();
        let endpoint = match part {
            VideoPart::ContentDetails => "video_durations",
            VideoPart::Statistics => "video_statistics",
        };
        Self::count(&mut script, endpoint);
        if part == VideoPart::Statistics && script.fail_statistics {
            return Reply::<VideoListResponse>::Transient.into_result("videos");
        }
        let items = ids
            .iter()
            .map(|id| VideoItem {
                id: id.clone(),
                content_details: Some(VideoContentDetails {
                    duration: script.durations.get(id).cloned(),
                }),
                statistics: script.engagement.get(id).map(|(likes, comments)| VideoStatistics {
                    view_count: None,
                    like_count: Some(likes.to_string()),
                    comment_count: Some(comments.to_string()),
                }),
            })
            .collect();
        Ok(VideoListResponse { items })
    }
}

#[derive(Default)]
struct RenderScript {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    consent: HashSet<String>,
    navigations: HashMap<String, usize>,
}

/// Renders canned HTML by exact URL. Unknown URLs render an empty document.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    script: Arc<Mutex<RenderScript>>,
    open: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_failing_page(self, url: &str) -> Self {
        self.script.lock().unwrap().failing.insert(url.to_string());
        self
    }

    /// `url` shows the consent interstitial until the session accepts it.
    pub fn with_consent_wall(self, url: &str) -> Self {
        self.script.lock().unwrap().consent.insert(url.to_string());
        self
    }

    pub fn navigations(&self, url: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .navigations
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl PageRenderer for FakeRenderer {
    type Session = FakeSession;

    async fn open(&self) -> Result<FakeSession, CoreError> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            script: Arc::clone(&self.script),
            open: Arc::clone(&self.open),
            consented: false,
            current: None,
            last_error: None,
        })
    }
}

pub struct FakeSession {
    script: Arc<Mutex<RenderScript>>,
    open: Arc<AtomicUsize>,
    consented: bool,
    current: Option<RenderedPage>,
    last_error: Option<String>,
}

impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str, _settle: Duration) -> Result<(), CoreError> {
        let mut script = self.script.lock().unwrap();
        *script.navigations.entry(url.to_string()).or_insert(0) += 1;
        self.current = None;

        if script.failing.contains(url) {
            let error = RenderError::Transport {
                reason: format!("connection reset rendering {}", url),
            };
            self.last_error = Some(error.to_string());
            return Err(error.into());
        }

        let html = if script.consent.contains(url) && !self.consented {
            CONSENT_HTML.to_string()
        } else {
            script
                .pages
                .get(url)
                .cloned()
                .unwrap_or_else(|| "<html></html>".to_string())
        };
        self.last_error = None;
        self.current = Some(RenderedPage::new(url, html));
        Ok(())
    }

    async fn dismiss_consent(&mut self, _wait: Duration) -> Result<bool, CoreError> {
        let Some(url) = self
            .current
            .as_ref()
            .filter(|page| page.has_match(CONSENT_SELECTORS))
            .map(|page| page.url().to_string())
        else {
            return Ok(false);
        };
        self.consented = true;
        self.navigate(&url, Duration::ZERO).await?;
        Ok(true)
    }

    async fn close(self) -> Result<(), CoreError> {
        Ok(())
    }

    fn current(&self) -> Option<&RenderedPage> {
        self.current.as_ref()
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
