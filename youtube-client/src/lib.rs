pub mod api;
pub mod duration;
pub mod metrics;
pub mod types;

mod tests;

pub use api::{map_status_error, SearchRequest, YouTubeApi, YouTubeApiClient, MAX_PAGE_SIZE};
pub use duration::{is_short_form, parse_duration_seconds, FormatCounts, SHORT_FORM_MAX_SECONDS};
pub use metrics::{ApiMetrics, EndpointMetrics, MetricsCollector};
pub use types::*;
