//! Discovery stage: search → filter → resolve handle → append seed → mark video.

use crate::filter::CandidateFilter;
use crate::language::LanguageClassifier;
use crate::resolver::HandleResolver;
use crate::search::SearchPager;
use chrono::Utc;
use database::{KeyStore, SeedRoster};
use page_renderer::PageRenderer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, warn};
use tubescout_core::{
    AppConfig, Candidate, ChannelSeed, CoreError, ErrorExt, QuotaExceeded, RetryExecutor,
    RetryMetrics, SkipReason,
};
use youtube_client::YouTubeApi;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoverySummary {
    /// Every candidate listed by search, including ones seen in earlier runs.
    pub videos_seen: u64,
    /// Candidates handled in this run.
    pub videos_processed: u64,
    pub new_channels: u64,
    pub skipped: BTreeMap<SkipReason, u64>,
    /// Seeds that failed to persist; their videos stay unmarked.
    pub unsaved: Vec<ChannelSeed>,
    /// Videos whose processed key could not be written; the next run sees
    /// them again.
    pub unmarked: u64,
    pub halted: Option<QuotaExceeded>,
    pub retry: RetryMetrics,
}

impl DiscoverySummary {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }
}

enum Disposition {
    Skip(SkipReason),
    Seed(ChannelSeed),
}

pub struct DiscoveryStage<'a, A, R, C, K, S> {
    api: &'a A,
    resolver: HandleResolver<'a, R>,
    filter: CandidateFilter<C>,
    processed: &'a K,
    roster: &'a S,
    retry: RetryExecutor,
    queries: Vec<String>,
    days_back: i64,
    region_code: String,
    page_size: u32,
}

impl<'a, A, R, C, K, S> DiscoveryStage<'a, A, R, C, K, S>
where
    A: YouTubeApi,
    R: PageRenderer,
    C: LanguageClassifier,
    K: KeyStore,
    S: SeedRoster,
{
    pub fn new(
        config: &AppConfig,
        api: &'a A,
        renderer: &'a R,
        classifier: C,
        processed: &'a K,
        roster: &'a S,
    ) -> Self {
        let retry = RetryExecutor::new(config.retry.to_retry_config());
        Self {
            api,
            resolver: HandleResolver::new(
                renderer,
                retry.clone(),
                Duration::from_millis(config.render.main_settle_ms),
                config.render.hl.clone(),
                config.render.gl.clone(),
            ),
            filter: CandidateFilter::new(
                classifier,
                config.target_language.clone(),
                config.subscriber_ceiling,
            ),
            processed,
            roster,
            retry,
            queries: config.queries.clone(),
            days_back: config.days_back,
            region_code: config.region_code.clone(),
            page_size: config.page_size,
        }
    }

    /// Walk every configured query. A quota halt ends the run cleanly with
    /// `halted` set; storage failures on the processed-key gate are errors.
    pub async fn run(&self) -> Result<DiscoverySummary, CoreError> {
        let mut summary = DiscoverySummary::default();
        match self.scan(&mut summary).await {
            Ok(()) => {}
            Err(CoreError::Quota(halt)) => {
                error!("Quota exceeded, stopping discovery: {}", halt);
                summary.halted = Some(halt);
            }
            Err(e) => return Err(e),
        }
        summary.retry = self.retry.get_metrics();

        info!(
            videos_seen = summary.videos_seen,
            videos_processed = summary.videos_processed,
            new_channels = summary.new_channels,
            skipped = summary.skipped_total(),
            unsaved = summary.unsaved.len(),
            unmarked = summary.unmarked,
            retries = summary.retry.total_retries,
            "Discovery finished"
        );
        Ok(summary)
    }

    async fn scan(&self, summary: &mut DiscoverySummary) -> Result<(), CoreError> {
        let published_after = Utc::now() - chrono::Duration::days(self.days_back);

        for query in &self.queries {
            info!("=== Query: {} ===", query);
            let mut pager = SearchPager::new(
                self.api,
                &self.retry,
                query,
                published_after,
                &self.region_code,
                self.page_size,
            );
            while let Some(batch) = pager.next_page().await? {
                for candidate in &batch {
                    summary.videos_seen += 1;
                    self.process(candidate, summary).await?;
                }
            }
            info!("[{}] Done after {} pages", query, pager.pages_fetched());
        }
        Ok(())
    }

    async fn process(
        &self,
        candidate: &Candidate,
        summary: &mut DiscoverySummary,
    ) -> Result<(), CoreError> {
        if self.processed.contains(&candidate.video_id).await? {
            summary.skip(SkipReason::AlreadyProcessed);
            return Ok(());
        }
        summary.videos_processed += 1;

        match self.evaluate(candidate).await? {
            Disposition::Skip(reason) => {
                info!(video_id = %candidate.video_id, "Skipped: {}", reason);
                summary.skip(reason);
            }
            Disposition::Seed(seed) => match self.roster.append_seed(&seed).await {
                Ok(true) => {
                    info!(
                        "New channel: {} ({} subscribers)",
                        seed.channel_handle, seed.subscriber_count
                    );
                    summary.new_channels += 1;
                }
                Ok(false) => summary.skip(SkipReason::DuplicateSeed),
                Err(e) => {
                    let record = serde_json::to_string(&seed).unwrap_or_default();
                    error!(record = %record, "Failed to save channel seed: {}", e);
                    summary.unsaved.push(seed);
                    return Ok(());
                }
            },
        }

        self.mark(&candidate.video_id, summary).await;
        Ok(())
    }

    async fn evaluate(&self, candidate: &Candidate) -> Result<Disposition, CoreError> {
        if !self.filter.passes_language(candidate) {
            return Ok(Disposition::Skip(SkipReason::Language));
        }

        let api = self.api;
        let channel_id = candidate.channel_id.as_str();
        let response = self
            .retry
            .execute("channels.list statistics", move || {
                api.channel_statistics(channel_id)
            })
            .await?;
        let Some(channel) = response.as_ref().and_then(|r| r.first()) else {
            warn!("No statistics for channel {}", channel_id);
            return Ok(Disposition::Skip(SkipReason::StatisticsUnavailable));
        };

        let subscriber_count = channel.subscriber_count();
        if !self.filter.passes_audience(subscriber_count) {
            info!(
                "Channel {} has {} subscribers (ceiling {})",
                channel_id,
                subscriber_count,
                self.filter.subscriber_ceiling()
            );
            return Ok(Disposition::Skip(SkipReason::Audience));
        }

        let Some(handle) = self.resolver.handle_for_channel(channel_id).await else {
            return Ok(Disposition::Skip(SkipReason::HandleUnresolved));
        };
        if self.roster.contains_handle(&handle).await? {
            return Ok(Disposition::Skip(SkipReason::DuplicateSeed));
        }

        Ok(Disposition::Seed(ChannelSeed {
            channel_handle: handle,
            subscriber_count,
        }))
    }

    async fn mark(&self, video_id: &str, summary: &mut DiscoverySummary) {
        if let Err(e) = self.processed.add(video_id).await {
            e.log_warn();
            warn!("Video {} was not marked processed", video_id);
            summary.unmarked += 1;
        }
    }
}
