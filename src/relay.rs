use crate::traits::NotificationSink;
use crate::types::{Item, RelayError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of driving one source's new items through the sink.
#[derive(Debug)]
pub struct RelayOutcome {
    /// Number of items actually delivered.
    pub delivered: usize,
    /// Highest id that was successfully delivered, if any. This is what the
    /// watermark advances to; `None` leaves it untouched so the same items
    /// are retried next cycle.
    pub last_delivered: Option<String>,
    /// The failure that aborted the remainder of the sequence, if any.
    pub error: Option<RelayError>,
}

/// Drives in-order delivery of new items for one source.
///
/// Items are delivered strictly in sequence with a fixed pacing delay between
/// deliveries. The first failure aborts the rest of the sequence for this
/// cycle so chronological order is preserved; already-confirmed progress is
/// still reported through `last_delivered`.
pub struct Relay {
    sink: Arc<dyn NotificationSink>,
    pacing: Duration,
}

impl Relay {
    pub fn new(sink: Arc<dyn NotificationSink>, pacing: Duration) -> Self {
        Self { sink, pacing }
    }

    /// Deliver `items` (oldest-first) for `source`.
    pub async fn deliver_all(&self, source: &str, items: &[Item]) -> RelayOutcome {
        let mut outcome = RelayOutcome {
            delivered: 0,
            last_delivered: None,
            error: None,
        };

        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            match self.sink.deliver(item, source).await {
                Ok(()) => {
                    info!("delivered item {} for {}", item.id, source);
                    outcome.delivered += 1;
                    outcome.last_delivered = Some(item.id.clone());
                }
                Err(e) => {
                    warn!(
                        "delivery of item {} for {} failed, skipping {} remaining: {}",
                        item.id,
                        source,
                        items.len() - i - 1,
                        e
                    );
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            text: String::new(),
            timestamp: Utc::now(),
            permalink: String::new(),
            attachment: None,
        }
    }

    /// Sink that records delivered ids and fails on a chosen id.
    struct FailingSink {
        delivered: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, item: &Item, _source: &str) -> Result<()> {
            if self.fail_on.as_deref() == Some(item.id.as_str()) {
                return Err(RelayError::Delivery("sink rejected".to_string()));
            }
            self.delivered.lock().unwrap().push(item.id.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn partial_failure_keeps_confirmed_progress() {
        let sink = Arc::new(FailingSink {
            delivered: Mutex::new(Vec::new()),
            fail_on: Some("2".to_string()),
        });
        let relay = Relay::new(sink.clone(), Duration::from_millis(0));

        let items = vec![item("1"), item("2"), item("3")];
        let outcome = relay.deliver_all("src", &items).await;

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.last_delivered.as_deref(), Some("1"));
        assert!(outcome.error.is_some());
        assert_eq!(*sink.delivered.lock().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn all_failures_leave_watermark_untouched() {
        let sink = Arc::new(FailingSink {
            delivered: Mutex::new(Vec::new()),
            fail_on: Some("1".to_string()),
        });
        let relay = Relay::new(sink, Duration::from_millis(0));

        let outcome = relay.deliver_all("src", &[item("1"), item("2")]).await;
        assert_eq!(outcome.delivered, 0);
        assert!(outcome.last_delivered.is_none());
    }
}
