use crate::diff;
use crate::relay::Relay;
use crate::traits::{FeedFetcher, NotificationSink};
use crate::types::{compare_ids, Result, TrackedSource};
use crate::watermark::WatermarkStore;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyTracked,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotTracked,
}

/// Summary of one full pass over the tracked sources.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub sources: usize,
    pub relayed: usize,
    /// True when any fetch or delivery signalled a rate limit. The scheduler
    /// reacts with a process-wide cooldown; limits come from the provider as
    /// a whole, not per source.
    pub rate_limited: bool,
}

/// Per-source result collected inside a cycle before watermarks are applied.
struct SourceOutcome {
    identifier: String,
    advanced_to: Option<String>,
    delivered: usize,
    rate_limited: bool,
}

/// Owns the set of tracked sources and drives fetch → diff → relay for each
/// of them once per cycle. A failing source is logged and skipped; it never
/// stops iteration over the remaining sources.
pub struct SourceSupervisor {
    sources: RwLock<BTreeMap<String, TrackedSource>>,
    fetcher: Arc<dyn FeedFetcher>,
    relay: Relay,
    store: WatermarkStore,
    // Serializes cycles: held for the whole of run_cycle so a manually
    // triggered cycle cannot overlap a scheduled one.
    cycle_gate: Mutex<()>,
}

impl SourceSupervisor {
    /// Build a supervisor, seeding watermarks from the persisted store.
    pub async fn new(
        fetcher: Arc<dyn FeedFetcher>,
        sink: Arc<dyn NotificationSink>,
        store: WatermarkStore,
        pacing: Duration,
    ) -> Result<Self> {
        let persisted = store.load().await?;
        let sources = persisted
            .into_iter()
            .map(|(id, mark)| (id.clone(), TrackedSource::new(id, Some(mark))))
            .collect();

        Ok(Self {
            sources: RwLock::new(sources),
            fetcher,
            relay: Relay::new(sink, pacing),
            store,
            cycle_gate: Mutex::new(()),
        })
    }

    pub async fn add_source(&self, identifier: &str) -> AddOutcome {
        let mut sources = self.sources.write().await;
        if sources.contains_key(identifier) {
            return AddOutcome::AlreadyTracked;
        }
        sources.insert(
            identifier.to_string(),
            TrackedSource::new(identifier.to_string(), None),
        );
        info!("now tracking source {}", identifier);
        AddOutcome::Added
    }

    pub async fn remove_source(&self, identifier: &str) -> RemoveOutcome {
        let mut sources = self.sources.write().await;
        match sources.remove(identifier) {
            Some(_) => {
                info!("stopped tracking source {}", identifier);
                RemoveOutcome::Removed
            }
            None => RemoveOutcome::NotTracked,
        }
    }

    pub async fn list_sources(&self) -> Vec<String> {
        self.sources.read().await.keys().cloned().collect()
    }

    /// Run one cycle: fetch → diff → relay for every tracked source, sources
    /// concurrent with each other, delivery within a source sequential.
    /// Watermark advances are applied after all sources finish and persisted
    /// in a single wholesale rewrite.
    ///
    /// Cycles never overlap: a second caller (an operator `check` racing the
    /// scheduler) waits for the in-flight cycle and then snapshots the
    /// already-advanced watermarks, so both cycles cannot relay the same
    /// items.
    pub async fn run_cycle(&self) -> CycleReport {
        let _gate = self.cycle_gate.lock().await;

        let snapshot: Vec<TrackedSource> =
            self.sources.read().await.values().cloned().collect();

        let mut report = CycleReport {
            sources: snapshot.len(),
            ..Default::default()
        };
        if snapshot.is_empty() {
            return report;
        }

        let outcomes = futures::future::join_all(
            snapshot.into_iter().map(|source| self.sync_source(source)),
        )
        .await;

        let mut advanced = false;
        {
            let mut sources = self.sources.write().await;
            for outcome in outcomes {
                report.relayed += outcome.delivered;
                report.rate_limited |= outcome.rate_limited;

                if let Some(new_mark) = outcome.advanced_to {
                    // The source may have been removed mid-cycle; a stale
                    // advance must not resurrect it.
                    if let Some(tracked) = sources.get_mut(&outcome.identifier) {
                        let grew = match &tracked.watermark {
                            Some(old) => compare_ids(&new_mark, old) == Ordering::Greater,
                            None => true,
                        };
                        if grew {
                            tracked.watermark = Some(new_mark);
                            advanced = true;
                        }
                    }
                }
            }
        }

        if advanced {
            self.persist_watermarks().await;
        }

        report
    }

    /// Fetch, diff and relay one source, catching every failure so the rest
    /// of the cycle is unaffected.
    async fn sync_source(&self, source: TrackedSource) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            identifier: source.identifier.clone(),
            advanced_to: None,
            delivered: 0,
            rate_limited: false,
        };

        let fetched = match self.fetcher.fetch(&source.identifier).await {
            Ok(items) => items,
            Err(e) => {
                outcome.rate_limited = e.is_rate_limit();
                if outcome.rate_limited {
                    warn!("fetch for {} hit a rate limit", source.identifier);
                } else {
                    error!("fetch for {} failed: {}", source.identifier, e);
                }
                return outcome;
            }
        };

        let fresh = diff::new_items(&fetched, source.watermark.as_deref());
        if fresh.is_empty() {
            info!("no new items for {}", source.identifier);
            return outcome;
        }
        info!("{} new item(s) for {}", fresh.len(), source.identifier);

        let relayed = self.relay.deliver_all(&source.identifier, &fresh).await;
        outcome.delivered = relayed.delivered;
        outcome.advanced_to = relayed.last_delivered;
        if let Some(e) = relayed.error {
            outcome.rate_limited = e.is_rate_limit();
        }
        outcome
    }

    /// Mirror the in-memory watermarks to disk. A failed save is logged and
    /// non-fatal; in-memory state stays authoritative and the next cycle
    /// retries from current state.
    async fn persist_watermarks(&self) {
        let map: BTreeMap<String, String> = self
            .sources
            .read()
            .await
            .values()
            .filter_map(|s| {
                s.watermark
                    .as_ref()
                    .map(|mark| (s.identifier.clone(), mark.clone()))
            })
            .collect();

        if let Err(e) = self.store.save(&map).await {
            error!("failed to persist watermarks: {}", e);
        }
    }

    /// Current watermark for a source, if tracked and synchronized.
    pub async fn watermark(&self, identifier: &str) -> Option<String> {
        self.sources
            .read()
            .await
            .get(identifier)
            .and_then(|s| s.watermark.clone())
    }
}
