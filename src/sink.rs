use crate::traits::NotificationSink;
use crate::types::{Item, RelayError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const EMBED_COLOR: u32 = 0x1DA1F2;
// Discord caps embed descriptions at 4096 characters.
const MAX_DESCRIPTION_LEN: usize = 4096;

/// Notification sink that posts one embed per item to a Discord webhook.
///
/// A video or external-link attachment rides along as the plain message
/// content so Discord unfurls a player for it; the embed itself carries the
/// item text, permalink and timestamp.
pub struct DiscordSink {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    embeds: [Embed<'a>; 1],
}

#[derive(Serialize)]
struct Embed<'a> {
    description: &'a str,
    url: &'a str,
    color: u32,
    timestamp: String,
    author: EmbedAuthor,
    footer: EmbedFooter<'a>,
}

#[derive(Serialize)]
struct EmbedAuthor {
    name: String,
    url: String,
}

#[derive(Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

impl DiscordSink {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent("feedrelay/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn deliver(&self, item: &Item, source: &str) -> Result<()> {
        let description = if item.text.len() > MAX_DESCRIPTION_LEN {
            let mut end = MAX_DESCRIPTION_LEN;
            while !item.text.is_char_boundary(end) {
                end -= 1;
            }
            &item.text[..end]
        } else {
            item.text.as_str()
        };

        let payload = WebhookPayload {
            content: item.attachment.as_ref().map(|a| a.url.as_str()),
            embeds: [Embed {
                description,
                url: &item.permalink,
                color: EMBED_COLOR,
                timestamp: item.timestamp.to_rfc3339(),
                author: EmbedAuthor {
                    name: format!("@{source}"),
                    url: format!("https://x.com/{source}"),
                },
                footer: EmbedFooter { text: "feedrelay" },
            }],
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::RateLimited);
        }
        if !status.is_success() {
            return Err(RelayError::Delivery(format!("webhook returned HTTP {status}")));
        }

        debug!("posted item {} for {} to webhook", item.id, source);
        Ok(())
    }
}
