use crate::traits::FeedFetcher;
use crate::types::{Attachment, AttachmentKind, Item, RelayError, Result, MAX_FETCH_ITEMS};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const EXTERNAL_VIDEO_HOSTS: [&str; 3] = ["youtube.com", "youtu.be", "vimeo.com"];

/// Feed fetcher backed by a Twitter-style v2 JSON API.
///
/// Resolves the account's numeric user id once per identifier and caches it,
/// then pulls the recent timeline with media expansions. Transient HTTP
/// failures are retried with exponential backoff; HTTP 429 surfaces as
/// `RateLimited` immediately so the scheduler can cool down.
pub struct ApiFetcher {
    client: Client,
    base_url: String,
    user_id_cache: Arc<RwLock<HashMap<String, String>>>,
    max_retries: u32,
}

#[derive(Deserialize)]
struct UserLookup {
    data: UserData,
}

#[derive(Deserialize)]
struct UserData {
    id: String,
}

#[derive(Deserialize)]
struct Timeline {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
    attachments: Option<Attachments>,
    entities: Option<Entities>,
}

#[derive(Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

#[derive(Deserialize)]
struct UrlEntity {
    expanded_url: Option<String>,
}

#[derive(Deserialize, Default)]
struct Includes {
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct Media {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    variants: Vec<MediaVariant>,
}

#[derive(Deserialize)]
struct MediaVariant {
    content_type: Option<String>,
    url: Option<String>,
    bit_rate: Option<u64>,
}

impl ApiFetcher {
    pub fn new(bearer_token: &str, base_url: Option<String>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {bearer_token}"))
            .map_err(|e| RelayError::Fetch {
                source_id: String::new(),
                reason: format!("invalid bearer token: {e}"),
            })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent("feedrelay/0.1")
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            user_id_cache: Arc::new(RwLock::new(HashMap::new())),
            max_retries: 3,
        })
    }

    async fn resolve_user_id(&self, username: &str) -> Result<String> {
        {
            let cache = self.user_id_cache.read().await;
            if let Some(id) = cache.get(username) {
                return Ok(id.clone());
            }
        }

        let url = format!("{}/2/users/by/username/{}", self.base_url, username);
        let lookup: UserLookup = self.get_json(username, &url).await?;
        debug!("resolved {} to user id {}", username, lookup.data.id);

        let mut cache = self.user_id_cache.write().await;
        cache.insert(username.to_string(), lookup.data.id.clone());
        Ok(lookup.data.id)
    }

    /// GET `url` and decode JSON, retrying transient failures. 429 is never
    /// retried here; it belongs to the scheduler's cooldown.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, source: &str, url: &str) -> Result<T> {
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(30),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(RelayError::RateLimited);
                    }
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|e| RelayError::Fetch {
                            source_id: source.to_string(),
                            reason: format!("decoding response: {e}"),
                        });
                    }
                    format!(
                        "HTTP {}: {}",
                        status,
                        status.canonical_reason().unwrap_or("unknown")
                    )
                }
                Err(e) => e.to_string(),
            };
            if attempt <= self.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "attempt {} for {} failed ({}), retrying in {:?}",
                        attempt, source, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            return Err(RelayError::Fetch {
                source_id: source.to_string(),
                reason,
            });
        }
    }
}

#[async_trait]
impl FeedFetcher for ApiFetcher {
    async fn fetch(&self, identifier: &str) -> Result<Vec<Item>> {
        let user_id = self.resolve_user_id(identifier).await?;

        let url = format!(
            "{}/2/users/{}/tweets?max_results={}\
             &tweet.fields=created_at,attachments,entities\
             &expansions=attachments.media_keys,author_id\
             &media.fields=type,url,preview_image_url,variants",
            self.base_url, user_id, MAX_FETCH_ITEMS
        );
        let timeline: Timeline = self.get_json(identifier, &url).await?;

        let media_by_key: HashMap<&str, &Media> = timeline
            .includes
            .media
            .iter()
            .map(|m| (m.media_key.as_str(), m))
            .collect();

        let items = timeline
            .data
            .iter()
            .take(MAX_FETCH_ITEMS)
            .map(|tweet| Item {
                id: tweet.id.clone(),
                text: tweet.text.clone(),
                timestamp: parse_timestamp(tweet.created_at.as_deref()),
                permalink: format!("https://x.com/{}/status/{}", identifier, tweet.id),
                attachment: extract_attachment(tweet, &media_by_key),
            })
            .collect();

        Ok(items)
    }
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// Prefer the highest-bitrate mp4 variant of an attached video; fall back to
/// a recognized external video link in the tweet's url entities.
fn extract_attachment(tweet: &Tweet, media_by_key: &HashMap<&str, &Media>) -> Option<Attachment> {
    if let Some(attachments) = &tweet.attachments {
        for key in &attachments.media_keys {
            let Some(media) = media_by_key.get(key.as_str()) else {
                continue;
            };
            if media.kind != "video" && media.kind != "animated_gif" {
                continue;
            }
            let best = media
                .variants
                .iter()
                .filter(|v| v.content_type.as_deref() == Some("video/mp4"))
                .max_by_key(|v| v.bit_rate.unwrap_or(0))
                .and_then(|v| v.url.clone());
            if let Some(url) = best {
                return Some(Attachment {
                    url,
                    kind: AttachmentKind::Video,
                });
            }
        }
    }

    let urls = tweet.entities.as_ref().map(|e| e.urls.as_slice())?;
    urls.iter()
        .filter_map(|u| u.expanded_url.as_deref())
        .find(|url| EXTERNAL_VIDEO_HOSTS.iter().any(|host| url.contains(host)))
        .map(|url| Attachment {
            url: url.to_string(),
            kind: AttachmentKind::ExternalLink,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(key: &str, kind: &str, variants: Vec<MediaVariant>) -> Media {
        Media {
            media_key: key.to_string(),
            kind: kind.to_string(),
            variants,
        }
    }

    fn variant(content_type: &str, url: &str, bit_rate: Option<u64>) -> MediaVariant {
        MediaVariant {
            content_type: Some(content_type.to_string()),
            url: Some(url.to_string()),
            bit_rate,
        }
    }

    #[test]
    fn picks_highest_bitrate_mp4() {
        let m = media(
            "m1",
            "video",
            vec![
                variant("video/mp4", "https://v/low.mp4", Some(256_000)),
                variant("application/x-mpegURL", "https://v/playlist.m3u8", None),
                variant("video/mp4", "https://v/high.mp4", Some(2_176_000)),
            ],
        );
        let tweet = Tweet {
            id: "1".to_string(),
            text: String::new(),
            created_at: None,
            attachments: Some(Attachments {
                media_keys: vec!["m1".to_string()],
            }),
            entities: None,
        };
        let lookup: HashMap<&str, &Media> = [("m1", &m)].into_iter().collect();

        let att = extract_attachment(&tweet, &lookup).unwrap();
        assert_eq!(att.url, "https://v/high.mp4");
        assert_eq!(att.kind, AttachmentKind::Video);
    }

    #[test]
    fn falls_back_to_external_video_link() {
        let tweet = Tweet {
            id: "1".to_string(),
            text: String::new(),
            created_at: None,
            attachments: None,
            entities: Some(Entities {
                urls: vec![
                    UrlEntity {
                        expanded_url: Some("https://example.com/article".to_string()),
                    },
                    UrlEntity {
                        expanded_url: Some("https://youtu.be/abc123".to_string()),
                    },
                ],
            }),
        };

        let att = extract_attachment(&tweet, &HashMap::new()).unwrap();
        assert_eq!(att.url, "https://youtu.be/abc123");
        assert_eq!(att.kind, AttachmentKind::ExternalLink);
    }

    #[test]
    fn no_media_means_no_attachment() {
        let tweet = Tweet {
            id: "1".to_string(),
            text: "plain".to_string(),
            created_at: None,
            attachments: None,
            entities: None,
        };
        assert!(extract_attachment(&tweet, &HashMap::new()).is_none());
    }
}
