//! Wire types for the YouTube Data API v3 responses we consume.
//!
//! Counts arrive as decimal strings; everything is optional because the API
//! omits parts it was not asked for and hides some statistics.

use serde::{Deserialize, Serialize};
use tubescout_core::Candidate;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchListResponse {
    pub next_page_token: Option<String>,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchItem {
    pub id: SearchItemId,
    pub snippet: SearchSnippet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchItemId {
    pub kind: String,
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSnippet {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
}

impl SearchItem {
    /// Items without a video id (channels, playlists) are not candidates.
    pub fn into_candidate(self) -> Option<Candidate> {
        let video_id = self.id.video_id.filter(|id| !id.is_empty())?;
        Some(Candidate {
            video_id,
            channel_id: self.snippet.channel_id,
            title: self.snippet.title,
            description: self.snippet.description,
            published_at: self.snippet.published_at,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelListResponse {
    pub items: Vec<ChannelItem>,
}

impl ChannelListResponse {
    pub fn first(&self) -> Option<&ChannelItem> {
        self.items.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelItem {
    pub id: String,
    pub snippet: Option<ChannelSnippet>,
    pub statistics: Option<ChannelStatistics>,
    pub content_details: Option<ChannelContentDetails>,
    pub topic_details: Option<TopicDetails>,
}

impl ChannelItem {
    /// Subscriber count, with a missing or unparsable value read as 0.
    pub fn subscriber_count(&self) -> u64 {
        self.statistics
            .as_ref()
            .map(|s| parse_count(s.subscriber_count.as_deref()))
            .unwrap_or(0)
    }

    pub fn view_count(&self) -> u64 {
        self.statistics
            .as_ref()
            .map(|s| parse_count(s.view_count.as_deref()))
            .unwrap_or(0)
    }

    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .and_then(|c| c.related_playlists.uploads.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn topic_categories(&self) -> &[String] {
        self.topic_details
            .as_ref()
            .map(|t| t.topic_categories.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSnippet {
    pub title: String,
    pub published_at: String,
    pub country: Option<String>,
    pub custom_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelStatistics {
    pub view_count: Option<String>,
    pub subscriber_count: Option<String>,
    pub hidden_subscriber_count: bool,
    pub video_count: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelContentDetails {
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedPlaylists {
    pub uploads: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicDetails {
    pub topic_categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItemListResponse {
    pub next_page_token: Option<String>,
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItem {
    pub content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItemContentDetails {
    pub video_id: String,
    pub video_published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoListResponse {
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoItem {
    pub id: String,
    pub content_details: Option<VideoContentDetails>,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

/// Which part of `videos.list` to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPart {
    ContentDetails,
    Statistics,
}

impl VideoPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoPart::ContentDetails => "contentDetails",
            VideoPart::Statistics => "statistics",
        }
    }
}

/// Parse an API count string, defaulting to 0.
pub fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(0)
}
