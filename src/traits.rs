use crate::types::{Item, Result};
use async_trait::async_trait;

/// Trait for retrieving the most recent items for one source per call.
///
/// Implementations return items newest-first, bounded to `MAX_FETCH_ITEMS`,
/// with no two items sharing an id. There is no contiguity guarantee with the
/// previous call; the diff engine filters against the watermark by id order.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the latest items for `identifier`.
    ///
    /// Fails with `RelayError::Fetch` when the upstream is unreachable or
    /// malformed, or `RelayError::RateLimited` when the provider throttles us.
    async fn fetch(&self, identifier: &str) -> Result<Vec<Item>>;
}

/// Trait for delivering one formatted item to the downstream channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a single item. Failures are retried next cycle; `RateLimited`
    /// additionally triggers the scheduler's process-wide cooldown.
    async fn deliver(&self, item: &Item, source: &str) -> Result<()>;
}
