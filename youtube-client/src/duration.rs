use regex::Regex;
use std::sync::LazyLock;

/// Videos at or below this many seconds count as short-form.
pub const SHORT_FORM_MAX_SECONDS: u64 = 60;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("valid duration regex")
});

/// Parse an ISO 8601 `PT#H#M#S` duration into seconds. Unparsable or
/// overflowing input is 0.
pub fn parse_duration_seconds(duration: &str) -> u64 {
    let Some(captures) = DURATION_RE.captures(duration) else {
        return 0;
    };
    let component = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    component(1)
        .checked_mul(3600)
        .zip(component(2).checked_mul(60))
        .and_then(|(hours, minutes)| hours.checked_add(minutes))
        .and_then(|total| total.checked_add(component(3)))
        .unwrap_or(0)
}

pub fn is_short_form(seconds: u64) -> bool {
    seconds <= SHORT_FORM_MAX_SECONDS
}

/// Running tally of classified uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatCounts {
    pub total: u64,
    pub short_form: u64,
}

impl FormatCounts {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            short_form: 0,
        }
    }

    /// Count one duration string. Empty durations are not classified.
    pub fn record(&mut self, duration: &str) {
        if duration.is_empty() {
            return;
        }
        if is_short_form(parse_duration_seconds(duration)) {
            self.short_form += 1;
        }
    }

    pub fn long_form(&self) -> u64 {
        self.total.saturating_sub(self.short_form)
    }
}
