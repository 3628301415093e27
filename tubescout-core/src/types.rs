use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One search result item considered for channel discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub video_id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
}

impl Candidate {
    /// Text handed to the language classifier.
    pub fn language_sample(&self) -> String {
        format!("{}\n{}", self.title, self.description)
    }
}

/// A channel that passed the filters during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub channel_handle: String,
    pub subscriber_count: u64,
}

/// One enriched output row. Every field has a default so a profile whose
/// sub-fetches failed is still written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub handle: String,
    pub channel_id: String,
    pub display_name: String,
    pub guessed_name: String,
    pub city_country: String,
    pub email: String,
    pub subscriber_count: Option<u64>,
    pub total_videos: u64,
    pub long_form_count: u64,
    pub short_form_count: u64,
    pub total_views: u64,
    pub creation_date: String,
    pub country: String,
    pub topics: String,
    pub first_video_date: String,
    pub last_video_date: String,
    pub following_count: u64,
    pub estimated_likes: u64,
    pub estimated_comments: u64,
}

impl ChannelProfile {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }
}

/// Why a candidate left the discovery stage without producing a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadyProcessed,
    Language,
    Audience,
    StatisticsUnavailable,
    HandleUnresolved,
    DuplicateSeed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::AlreadyProcessed => "already processed",
            SkipReason::Language => "language mismatch",
            SkipReason::Audience => "audience above ceiling",
            SkipReason::StatisticsUnavailable => "channel statistics unavailable",
            SkipReason::HandleUnresolved => "handle unresolved",
            SkipReason::DuplicateSeed => "channel already in roster",
        };
        f.write_str(label)
    }
}

/// Render an RFC 3339 API timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
/// Input that does not parse is returned unchanged.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp("2021-03-04T05:06:07Z"), "2021-03-04 05:06:07");
        assert_eq!(
            format_timestamp("2021-03-04T07:06:07+02:00"),
            "2021-03-04 05:06:07"
        );
        assert_eq!(format_timestamp(""), "");
        assert_eq!(format_timestamp("last tuesday"), "last tuesday");
    }

    #[test]
    fn test_language_sample_joins_with_newline() {
        let candidate = Candidate {
            video_id: "v1".to_string(),
            channel_id: "UC1".to_string(),
            title: "Bonjour".to_string(),
            description: "à tous".to_string(),
            published_at: String::new(),
        };
        assert_eq!(candidate.language_sample(), "Bonjour\nà tous");
    }

    #[test]
    fn test_profile_defaults() {
        let profile = ChannelProfile::new("@someone");
        assert_eq!(profile.handle, "@someone");
        assert_eq!(profile.subscriber_count, None);
        assert_eq!(profile.total_videos, 0);
        assert!(profile.email.is_empty());
    }
}
