use chrono::{DateTime, Utc};
use tracing::{info, warn};
use tubescout_core::{Candidate, QuotaExceeded, RetryExecutor};
use youtube_client::{SearchItem, SearchRequest, YouTubeApi};

/// Walks the search pages of one query. The continuation cursor lives only
/// in this value; nothing about pagination is persisted.
pub struct SearchPager<'a, A> {
    api: &'a A,
    retry: &'a RetryExecutor,
    request: SearchRequest,
    pages_fetched: u32,
    finished: bool,
}

impl<'a, A: YouTubeApi> SearchPager<'a, A> {
    pub fn new(
        api: &'a A,
        retry: &'a RetryExecutor,
        query: &str,
        published_after: DateTime<Utc>,
        region_code: &str,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            retry,
            request: SearchRequest {
                query: query.to_string(),
                published_after,
                region_code: region_code.to_string(),
                page_size,
                page_token: None,
            },
            pages_fetched: 0,
            finished: false,
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Next batch of candidates, or `None` once the query is exhausted: no
    /// continuation cursor, an empty page, or a call that gave up.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Candidate>>, QuotaExceeded> {
        if self.finished {
            return Ok(None);
        }
        self.pages_fetched += 1;
        let query = self.request.query.clone();
        info!(
            "[{}] Page #{}, pageToken={:?}",
            query, self.pages_fetched, self.request.page_token
        );

        let api = self.api;
        let request = &self.request;
        let outcome = self
            .retry
            .execute("search.list", move || api.search(request))
            .await?;

        let Some(page) = outcome else {
            warn!("[{}] Error calling search.list, skipping the rest", query);
            self.finished = true;
            return Ok(None);
        };

        if page.items.is_empty() {
            info!("[{}] Empty result, finishing", query);
            self.finished = true;
            return Ok(None);
        }

        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => self.request.page_token = Some(token),
            None => {
                info!("[{}] No more pages", query);
                self.finished = true;
            }
        }

        let candidates: Vec<Candidate> = page
            .items
            .into_iter()
            .filter_map(SearchItem::into_candidate)
            .collect();
        info!(
            "[{}] Page #{} returned {} videos",
            query,
            self.pages_fetched,
            candidates.len()
        );
        Ok(Some(candidates))
    }
}
