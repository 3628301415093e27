//! Quota guard: the one failure that is never retried and never swallowed.
//!
//! Every remote boundary funnels its failure through [`classify`]. A
//! [`FailureClass::Quota`] outcome is turned into a [`QuotaExceeded`] value that
//! callers propagate with `?` all the way up to the run loop, which stops the run
//! after whatever rows were already persisted.

use crate::error::{CoreError, RenderError, YouTubeApiError};
use serde::Serialize;
use thiserror::Error;

/// Marker the YouTube Data API puts in the error payload when the daily
/// allowance is spent.
pub const QUOTA_MARKER: &str = "quotaExceeded";

/// HTTP statuses treated as quota exhaustion regardless of payload.
pub const QUOTA_STATUSES: [u16; 2] = [403, 429];

/// Fatal halt signal raised when the remote quota is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("quota exceeded during {operation}: {detail}")]
pub struct QuotaExceeded {
    pub operation: String,
    pub detail: String,
}

/// Tagged outcome of inspecting a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Connection reset, protocol or transport error, timeout, 5xx.
    Transient,
    /// Quota exhausted; halt the run.
    Quota,
    /// Anything else; do not retry.
    Other,
}

/// Decide whether a raw HTTP failure means the quota is gone.
pub fn is_quota_failure(status: u16, body: &str) -> bool {
    QUOTA_STATUSES.contains(&status) || body.contains(QUOTA_MARKER)
}

pub fn classify(error: &CoreError) -> FailureClass {
    match error {
        CoreError::Quota(_) => FailureClass::Quota,
        CoreError::YouTubeApi(api_error) => match api_error {
            YouTubeApiError::QuotaExceeded { .. } => FailureClass::Quota,
            YouTubeApiError::RequestTimeout
            | YouTubeApiError::ConnectionFailed { .. }
            | YouTubeApiError::ServerError { .. } => FailureClass::Transient,
            YouTubeApiError::Rejected { .. }
            | YouTubeApiError::NotFound { .. }
            | YouTubeApiError::InvalidResponse { .. } => FailureClass::Other,
        },
        CoreError::Render(render_error) => match render_error {
            RenderError::Transport { .. } | RenderError::Timeout { .. } => {
                FailureClass::Transient
            }
            RenderError::Api { status, .. } if *status >= 500 => FailureClass::Transient,
            _ => FailureClass::Other,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout()
                || reqwest_error.is_connect()
                || reqwest_error.is_request()
                || reqwest_error.is_body()
            {
                FailureClass::Transient
            } else {
                FailureClass::Other
            }
        }
        CoreError::Io(_) => FailureClass::Transient,
        _ => FailureClass::Other,
    }
}
