use anyhow::Context;
use clap::Parser;
use feedrelay::{
    commands, server, ApiFetcher, Config, DiscordSink, FeedFetcher, FetcherKind, PollScheduler,
    RssFetcher, SourceSupervisor, WatermarkStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::parse();
    let secrets = config.secrets()?;

    let fetcher: Arc<dyn FeedFetcher> = match config.fetcher {
        FetcherKind::Api => {
            // secrets() has already failed fast when the token is absent.
            let token = secrets
                .bearer_token
                .as_deref()
                .context("RELAY_BEARER_TOKEN is required for the api fetcher")?;
            Arc::new(ApiFetcher::new(token, config.api_base.clone())?)
        }
        FetcherKind::Rss => Arc::new(RssFetcher::new(config.rss_base.clone())?),
    };
    let sink = Arc::new(DiscordSink::new(secrets.webhook_url)?);

    let store = WatermarkStore::new(&config.state_file);
    let supervisor = Arc::new(
        SourceSupervisor::new(fetcher.clone(), sink, store, config.pacing()).await?,
    );

    for source in &config.sources {
        supervisor.add_source(source).await;
    }
    info!(
        "tracking {} source(s), polling every {}s",
        supervisor.list_sources().await.len(),
        config.interval_secs
    );

    let scheduler = Arc::new(PollScheduler::new(
        supervisor.clone(),
        config.interval(),
        config.cooldown(),
    ));
    scheduler.start().await;

    // On-demand fetch endpoint runs alongside the poller.
    let endpoint_fetcher = fetcher.clone();
    let listen_port = config.listen_port;
    tokio::spawn(async move {
        if let Err(e) = server::serve(endpoint_fetcher, listen_port).await {
            error!("on-demand fetch endpoint exited: {}", e);
        }
    });

    // Operator console: one textual command per line on stdin.
    let console_supervisor = supervisor.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let reply = match commands::parse(&line) {
                Ok(command) => commands::execute(&console_supervisor, command).await,
                Err(usage) => usage.to_string(),
            };
            println!("{reply}");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.stop().await;
    Ok(())
}
