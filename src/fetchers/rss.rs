use crate::traits::FeedFetcher;
use crate::types::{Attachment, AttachmentKind, Item, RelayError, Result, MAX_FETCH_ITEMS};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_RSS_BASE: &str = "https://nitter.net";

/// Feed fetcher backed by a Nitter-style RSS mirror.
///
/// Pulls `{base}/{identifier}/rss` and parses it with feed-rs. The item id is
/// the status id embedded in the entry permalink, which keeps both fetcher
/// variants interchangeable: the diff engine sees the same id space either
/// way.
pub struct RssFetcher {
    client: Client,
    base_url: String,
}

impl RssFetcher {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("feedrelay/0.1")
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_RSS_BASE.to_string()),
        })
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Vec<Item>> {
        let feed_url = format!("{}/{}/rss", self.base_url, identifier);
        debug!("fetching RSS feed {}", feed_url);

        let response = self.client.get(&feed_url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::RateLimited);
        }
        if !status.is_success() {
            return Err(RelayError::Fetch {
                source_id: identifier.to_string(),
                reason: format!("HTTP {status} from {feed_url}"),
            });
        }

        let body = response.bytes().await?;
        let feed = feed_rs::parser::parse(&body[..]).map_err(|e| RelayError::Fetch {
            source_id: identifier.to_string(),
            reason: format!("parsing feed: {e}"),
        })?;

        let mut items = Vec::new();
        for entry in feed.entries.into_iter().take(MAX_FETCH_ITEMS) {
            let permalink = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_else(|| entry.id.clone());

            let Some(id) = status_id_from_link(&permalink).or_else(|| status_id_from_link(&entry.id))
            else {
                debug!("skipping entry with no status id in {}", permalink);
                continue;
            };

            let text = entry
                .title
                .map(|t| t.content)
                .unwrap_or_default();

            let attachment = entry.media.iter().find_map(|media| {
                media.content.iter().find_map(|content| {
                    content.url.as_ref().map(|url| Attachment {
                        url: url.to_string(),
                        kind: match content.content_type.as_ref().map(|m| m.type_().as_str()) {
                            Some("video") => AttachmentKind::Video,
                            _ => AttachmentKind::ExternalLink,
                        },
                    })
                })
            });

            items.push(Item {
                id,
                text,
                timestamp: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
                permalink,
                attachment,
            });
        }

        Ok(items)
    }
}

/// Extract the trailing status id from a permalink such as
/// `https://nitter.net/user/status/1234567890#m`.
fn status_id_from_link(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let id = segment.trim_end_matches("#m");
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_status_id_from_nitter_permalink() {
        assert_eq!(
            status_id_from_link("https://nitter.net/NFL/status/1790000000000000001#m").as_deref(),
            Some("1790000000000000001")
        );
        assert_eq!(
            status_id_from_link("https://nitter.net/NFL/status/42").as_deref(),
            Some("42")
        );
    }

    #[test]
    fn rejects_links_without_an_id() {
        assert!(status_id_from_link("not a url").is_none());
        assert!(status_id_from_link("https://nitter.net/").is_none());
    }
}
