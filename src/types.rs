use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound on items returned by a single fetcher invocation.
pub const MAX_FETCH_ITEMS: usize = 20;

/// One published item as issued by the upstream source. Immutable after fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Opaque, totally ordered identifier. Higher = newer. Never parsed as a
    /// number; some upstreams issue ids beyond safe-integer range.
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub permalink: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// A single media or external-link reference carried by an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentKind {
    Video,
    ExternalLink,
}

/// A source tracked by the supervisor. The watermark is the id of the last
/// item successfully relayed; `None` means never synchronized.
#[derive(Debug, Clone)]
pub struct TrackedSource {
    pub identifier: String,
    pub watermark: Option<String>,
}

impl TrackedSource {
    pub fn new(identifier: String, watermark: Option<String>) -> Self {
        Self { identifier, watermark }
    }
}

/// Compare two item ids using the upstream's native ordering.
///
/// Ids stay opaque strings, but numeric ids must sort numerically even past
/// u64 range, so all-digit ids compare by length first and then byte-wise.
/// Anything else falls back to plain lexicographic order.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("fetch failed for {source_id}: {reason}")]
    Fetch { source_id: String, reason: String },

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("watermark persistence failed: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Structural check used by the scheduler for process-wide cooldown.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RelayError::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
