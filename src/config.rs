use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetcherKind {
    /// JSON API fetcher (requires RELAY_BEARER_TOKEN).
    Api,
    /// RSS mirror fetcher.
    Rss,
}

/// Runtime configuration. Knobs come from the command line; secrets come
/// from the environment so they never show up in process listings.
#[derive(Debug, Parser)]
#[command(name = "feedrelay", about = "Relays new feed items to a notification channel")]
pub struct Config {
    /// Source identifiers to track at startup (repeatable).
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Seconds between poll cycles.
    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,

    /// Seconds to suspend polling after an upstream rate limit.
    #[arg(long, default_value_t = 900)]
    pub cooldown_secs: u64,

    /// Milliseconds between deliveries for one source.
    #[arg(long, default_value_t = 1000)]
    pub pacing_ms: u64,

    /// Watermark persistence file.
    #[arg(long, default_value = "watermarks.json")]
    pub state_file: PathBuf,

    /// Which fetcher variant to use.
    #[arg(long, value_enum, default_value_t = FetcherKind::Api)]
    pub fetcher: FetcherKind,

    /// Port for the on-demand fetch endpoint.
    #[arg(long, default_value_t = 5000)]
    pub listen_port: u16,

    /// Override the API base URL (testing, proxies).
    #[arg(long)]
    pub api_base: Option<String>,

    /// Override the RSS mirror base URL.
    #[arg(long)]
    pub rss_base: Option<String>,
}

/// Secrets resolved from the environment for the selected components.
pub struct Secrets {
    pub bearer_token: Option<String>,
    pub webhook_url: String,
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Read required secrets, failing fast with a clear message when one is
    /// missing for the selected fetcher. This is the only fatal validation
    /// in the process.
    pub fn secrets(&self) -> anyhow::Result<Secrets> {
        let webhook_url = std::env::var("RELAY_WEBHOOK_URL")
            .context("RELAY_WEBHOOK_URL is required (Discord webhook to deliver to)")?;

        let bearer_token = std::env::var("RELAY_BEARER_TOKEN").ok();
        if self.fetcher == FetcherKind::Api && bearer_token.is_none() {
            bail!("RELAY_BEARER_TOKEN is required for the api fetcher (or use --fetcher rss)");
        }

        Ok(Secrets {
            bearer_token,
            webhook_url,
        })
    }
}
