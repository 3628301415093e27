//! Enrichment stage: build one [`ChannelProfile`] per roster seed from the
//! Data API and the rendered channel pages, append it, then mark the handle.

use crate::extract::{
    first_email, guess_personal_name, location_phrase, normalize_topics, parse_subscriber_text,
    ABOUT_TEXT_SELECTOR, FOLLOWING_SELECTOR, LOCATION_SELECTOR, NAME_SELECTOR,
};
use crate::resolver::{channel_subpage_url, close_session, normalize_channel_url, HandleResolver};
use chrono::{DateTime, FixedOffset};
use database::{KeyStore, MemoryKeyStore, ProfileSink, SeedRoster};
use page_renderer::{Lookup, PageRenderer, RenderSession};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tubescout_core::{
    format_timestamp, AppConfig, ChannelProfile, CoreError, QuotaExceeded, RenderSettings,
    RetryExecutor, RetryMetrics,
};
use youtube_client::{parse_count, FormatCounts, VideoPart, YouTubeApi, MAX_PAGE_SIZE};

/// Uploads listing walked by the API stage.
#[derive(Debug, Default)]
struct Uploads {
    video_ids: Vec<String>,
    earliest: Option<(DateTime<FixedOffset>, String)>,
    latest: Option<(DateTime<FixedOffset>, String)>,
}

impl Uploads {
    fn record(&mut self, video_id: String, published_at: Option<&str>) {
        self.video_ids.push(video_id);
        let Some(raw) = published_at.filter(|raw| !raw.is_empty()) else {
            return;
        };
        let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
            debug!("Unparsable publication time: {}", raw);
            return;
        };
        if self.earliest.as_ref().map_or(true, |(t, _)| parsed < *t) {
            self.earliest = Some((parsed, raw.to_string()));
        }
        if self.latest.as_ref().map_or(true, |(t, _)| parsed > *t) {
            self.latest = Some((parsed, raw.to_string()));
        }
    }
}

/// Builds a single profile. API failures other than quota leave the affected
/// fields at their defaults; page misses do the same.
pub struct ChannelEnricher<'a, A, R> {
    api: &'a A,
    renderer: &'a R,
    resolver: HandleResolver<'a, R>,
    retry: RetryExecutor,
    render: RenderSettings,
}

impl<'a, A: YouTubeApi, R: PageRenderer> ChannelEnricher<'a, A, R> {
    pub fn new(config: &AppConfig, api: &'a A, renderer: &'a R) -> Self {
        let retry = RetryExecutor::new(config.retry.to_retry_config());
        let render = config.render.clone();
        Self {
            api,
            renderer,
            resolver: HandleResolver::new(
                renderer,
                retry.clone(),
                Duration::from_millis(render.main_settle_ms),
                render.hl.clone(),
                render.gl.clone(),
            )
            .with_consent_wait(Duration::from_millis(render.consent_wait_ms)),
            retry,
            render,
        }
    }

    /// Retry counters for every API and render call made so far.
    pub fn retry_metrics(&self) -> RetryMetrics {
        self.retry.get_metrics()
    }

    pub async fn enrich(&self, handle: &str) -> Result<ChannelProfile, QuotaExceeded> {
        let mut profile = ChannelProfile::new(handle);

        let channel_id = self.resolver.resolve_channel_id(handle).await;
        if channel_id.is_empty() {
            warn!("No channelId for {}, skipping API data", handle);
        } else {
            info!("channelId for {}: {}", handle, channel_id);
            self.fill_from_api(&channel_id, &mut profile).await?;
            profile.channel_id = channel_id;
        }

        self.fill_from_pages(handle, &mut profile).await;
        Ok(profile)
    }

    async fn fill_from_api(
        &self,
        channel_id: &str,
        profile: &mut ChannelProfile,
    ) -> Result<(), QuotaExceeded> {
        let api = self.api;
        let response = self
            .retry
            .execute("channels.list full", move || api.channel_full(channel_id))
            .await?;
        let Some(channel) = response.as_ref().and_then(|r| r.first()) else {
            warn!("channels.list returned nothing for {}", channel_id);
            return Ok(());
        };

        if let Some(snippet) = &channel.snippet {
            profile.creation_date = format_timestamp(&snippet.published_at);
            profile.country = snippet.country.clone().unwrap_or_default();
        }
        profile.topics = normalize_topics(channel.topic_categories());
        profile.total_views = channel.view_count();

        let Some(playlist_id) = channel.uploads_playlist() else {
            info!("No uploads playlist for {}", channel_id);
            return Ok(());
        };
        let uploads = self.collect_uploads(playlist_id).await?;
        profile.total_videos = uploads.video_ids.len() as u64;
        if let Some((_, raw)) = &uploads.earliest {
            profile.first_video_date = format_timestamp(raw);
        }
        if let Some((_, raw)) = &uploads.latest {
            profile.last_video_date = format_timestamp(raw);
        }

        let formats = self.count_formats(&uploads.video_ids).await?;
        profile.short_form_count = formats.short_form;
        profile.long_form_count = formats.long_form();

        let (likes, comments) = self.sum_engagement(&uploads.video_ids).await?;
        profile.estimated_likes = likes;
        profile.estimated_comments = comments;

        info!(
            total = profile.total_videos,
            long_form = profile.long_form_count,
            short_form = profile.short_form_count,
            "Videos counted for {}",
            channel_id
        );
        Ok(())
    }

    /// A page that cannot be fetched, or comes back empty, ends the listing
    /// with what was collected.
    async fn collect_uploads(&self, playlist_id: &str) -> Result<Uploads, QuotaExceeded> {
        let api = self.api;
        let mut uploads = Uploads::default();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.as_deref();
            let outcome = self
                .retry
                .execute("playlistItems.list", move || {
                    api.playlist_items(playlist_id, MAX_PAGE_SIZE, token)
                })
                .await?;
            let Some(page) = outcome else {
                warn!(
                    "Uploads listing for {} cut short after {} videos",
                    playlist_id,
                    uploads.video_ids.len()
                );
                break;
            };
            if page.items.is_empty() {
                info!("Empty uploads page for {}, stopping", playlist_id);
                break;
            }

            for item in page.items {
                let details = item.content_details;
                if details.video_id.is_empty() {
                    continue;
                }
                uploads.record(details.video_id, details.video_published_at.as_deref());
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(uploads)
    }

    async fn count_formats(&self, video_ids: &[String]) -> Result<FormatCounts, QuotaExceeded> {
        let api = self.api;
        let mut counts = FormatCounts::new(video_ids.len() as u64);

        for batch in video_ids.chunks(MAX_PAGE_SIZE as usize) {
            let outcome = self
                .retry
                .execute("videos.list contentDetails", move || {
                    api.video_details(batch, VideoPart::ContentDetails)
                })
                .await?;
            let Some(response) = outcome else {
                warn!("Skipping duration batch of {} videos", batch.len());
                continue;
            };
            for video in &response.items {
                if let Some(duration) = video
                    .content_details
                    .as_ref()
                    .and_then(|c| c.duration.as_deref())
                {
                    counts.record(duration);
                }
            }
        }
        Ok(counts)
    }

    async fn sum_engagement(&self, video_ids: &[String]) -> Result<(u64, u64), QuotaExceeded> {
        let api = self.api;
        let (mut likes, mut comments) = (0u64, 0u64);

        for batch in video_ids.chunks(MAX_PAGE_SIZE as usize) {
            let outcome = self
                .retry
                .execute("videos.list statistics", move || {
                    api.video_details(batch, VideoPart::Statistics)
                })
                .await?;
            let Some(response) = outcome else {
                warn!("Skipping statistics batch of {} videos", batch.len());
                continue;
            };
            for statistics in response.items.iter().filter_map(|v| v.statistics.as_ref()) {
                likes += parse_count(statistics.like_count.as_deref());
                comments += parse_count(statistics.comment_count.as_deref());
            }
        }
        Ok((likes, comments))
    }

    /// One session for the main, About and Channels pages; closed on every path.
    async fn fill_from_pages(&self, handle: &str, profile: &mut ChannelProfile) {
        let mut session = match self.renderer.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not open render session for {}: {}", handle, e);
                return;
            }
        };

        let channel_url = normalize_channel_url(handle, &self.render.hl, &self.render.gl);
        info!("Constructed channel URL: {}", channel_url);
        self.read_main_page(&mut session, &channel_url, profile).await;
        self.read_about_page(&mut session, &channel_url, profile).await;
        self.read_channels_page(&mut session, &channel_url, profile).await;

        close_session(session).await;
    }

    async fn read_main_page(
        &self,
        session: &mut R::Session,
        url: &str,
        profile: &mut ChannelProfile,
    ) {
        let settle = Duration::from_millis(self.render.main_settle_ms);
        if let Err(e) = session.navigate(url, settle).await {
            warn!("Main page render failed for {}: {}", url, e);
            return;
        }
        let consent_wait = Duration::from_millis(self.render.consent_wait_ms);
        match session.dismiss_consent(consent_wait).await {
            Ok(true) => info!("Cookies banner found and closed"),
            Ok(false) => {}
            Err(e) => warn!("Cookies banner could not be closed: {}", e),
        }

        match session.query_text(NAME_SELECTOR) {
            Lookup::Found(name) => {
                info!("Channel name: {}", name);
                profile.guessed_name = guess_personal_name(&name);
                profile.display_name = name;
            }
            Lookup::NotFound => info!("Channel name not found on {}", url),
            Lookup::RenderFailed(reason) => warn!("Channel name unavailable: {}", reason),
        }

        match session.query_text_containing("span", "subscriber") {
            Lookup::Found(text) => {
                profile.subscriber_count = parse_subscriber_text(&text);
                info!("Subscribers: {} -> {:?}", text, profile.subscriber_count);
            }
            Lookup::NotFound => info!("Subscriber count not found on {}", url),
            Lookup::RenderFailed(reason) => warn!("Subscriber count unavailable: {}", reason),
        }
    }

    async fn read_about_page(
        &self,
        session: &mut R::Session,
        channel_url: &str,
        profile: &mut ChannelProfile,
    ) {
        let url = channel_subpage_url(channel_url, "about", &self.render.hl, &self.render.gl);
        info!("Going to ABOUT tab: {}", url);
        let settle = Duration::from_millis(self.render.subpage_settle_ms);
        if let Err(e) = session.navigate(&url, settle).await {
            warn!("About page render failed for {}: {}", url, e);
            return;
        }

        match session.query_all_text(ABOUT_TEXT_SELECTOR) {
            Lookup::Found(texts) => match first_email(&texts.join("\n")) {
                Some(email) => {
                    info!("Found email: {}", email);
                    profile.email = email;
                }
                None => info!("No email in About text"),
            },
            Lookup::NotFound => info!("No About text on {}", url),
            Lookup::RenderFailed(reason) => warn!("About text unavailable: {}", reason),
        }

        match session
            .query_text(LOCATION_SELECTOR)
            .map(|text| location_phrase(&text))
        {
            Lookup::Found(Some(location)) => {
                info!("Found location: {}", location);
                profile.city_country = location;
            }
            Lookup::Found(None) | Lookup::NotFound => info!("No location on {}", url),
            Lookup::RenderFailed(reason) => warn!("Location unavailable: {}", reason),
        }
    }

    async fn read_channels_page(
        &self,
        session: &mut R::Session,
        channel_url: &str,
        profile: &mut ChannelProfile,
    ) {
        let url = channel_subpage_url(channel_url, "channels", &self.render.hl, &self.render.gl);
        let settle = Duration::from_millis(self.render.subpage_settle_ms);
        if let Err(e) = session.navigate(&url, settle).await {
            warn!("Channels page render failed for {}: {}", url, e);
            return;
        }
        if let Lookup::Found(count) = session.query_count(FOLLOWING_SELECTOR) {
            profile.following_count = count as u64;
            info!("Following channels: {}", count);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentSummary {
    pub channels_enriched: u64,
    pub already_enriched: u64,
    /// Profiles that failed to persist; their handles stay unmarked.
    pub unsaved: Vec<ChannelProfile>,
    pub halted: Option<QuotaExceeded>,
    pub retry: RetryMetrics,
}

pub struct EnrichmentStage<'a, A, R, S, P> {
    enricher: ChannelEnricher<'a, A, R>,
    roster: &'a S,
    sink: &'a P,
    max_channels: Option<usize>,
}

impl<'a, A, R, S, P> EnrichmentStage<'a, A, R, S, P>
where
    A: YouTubeApi,
    R: PageRenderer,
    S: SeedRoster,
    P: ProfileSink,
{
    pub fn new(config: &AppConfig, api: &'a A, renderer: &'a R, roster: &'a S, sink: &'a P) -> Self {
        Self {
            enricher: ChannelEnricher::new(config, api, renderer),
            roster,
            sink,
            max_channels: config.max_channels,
        }
    }

    /// Enrich every roster seed not yet in the output, in roster order.
    pub async fn run(&self) -> Result<EnrichmentSummary, CoreError> {
        let enriched = MemoryKeyStore::with_keys(self.sink.enriched_handles().await?);
        let seeds = self.roster.seeds().await?;
        let mut summary = EnrichmentSummary::default();
        let mut attempted = 0usize;

        for (position, seed) in seeds.iter().enumerate() {
            if self.max_channels.is_some_and(|limit| attempted >= limit) {
                info!("Limit reached: {} channels processed", attempted);
                break;
            }
            let handle = seed.channel_handle.as_str();
            if handle.trim().is_empty() {
                continue;
            }
            if enriched.contains(handle).await? {
                debug!("Channel {} is already enriched, skipping", handle);
                summary.already_enriched += 1;
                continue;
            }

            attempted += 1;
            info!("=== [{}] Processing channel: {} ===", position + 1, handle);
            let profile = match self.enricher.enrich(handle).await {
                Ok(profile) => profile,
                Err(halt) => {
                    error!("Quota exceeded, stopping enrichment: {}", halt);
                    summary.halted = Some(halt);
                    break;
                }
            };

            match self.sink.append_profile(&profile).await {
                Ok(()) => {
                    enriched.add(handle).await?;
                    summary.channels_enriched += 1;
                }
                Err(e) => {
                    let record = serde_json::to_string(&profile).unwrap_or_default();
                    error!(record = %record, "Failed to save profile for {}: {}", handle, e);
                    summary.unsaved.push(profile);
                }
            }
        }

        summary.retry = self.enricher.retry_metrics();

        info!(
            enriched = summary.channels_enriched,
            already_enriched = summary.already_enriched,
            unsaved = summary.unsaved.len(),
            retries = summary.retry.total_retries,
            "Enrichment finished"
        );
        Ok(summary)
    }
}
