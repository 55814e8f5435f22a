use crate::supervisor::SourceSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

struct RunningPoller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Triggers supervisor cycles on a fixed interval.
///
/// One cycle runs to completion before the next tick is considered; ticks
/// that fall due while a cycle is still running are skipped, never stacked.
/// A rate-limit signal from any source suspends all polling for the cooldown
/// window, since limits are imposed by the upstream provider as a whole.
pub struct PollScheduler {
    supervisor: Arc<SourceSupervisor>,
    interval: Duration,
    cooldown: Duration,
    poller: Mutex<Option<RunningPoller>>,
}

impl PollScheduler {
    pub fn new(supervisor: Arc<SourceSupervisor>, interval: Duration, cooldown: Duration) -> Self {
        Self {
            supervisor,
            interval,
            cooldown,
            poller: Mutex::new(None),
        }
    }

    /// Start polling. No-op when already running. The first cycle fires
    /// immediately so a fresh deployment gives feedback without waiting a
    /// full interval.
    pub async fn start(&self) {
        let mut poller = self.poller.lock().await;
        if let Some(running) = poller.as_ref() {
            if !running.handle.is_finished() {
                return;
            }
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let supervisor = self.supervisor.clone();
        let interval = self.interval;
        let cooldown = self.cooldown;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if *stop_rx.borrow() {
                    break;
                }

                let report = supervisor.run_cycle().await;
                info!(
                    "cycle complete: {} source(s), {} item(s) relayed",
                    report.sources, report.relayed
                );

                if report.rate_limited {
                    warn!(
                        "rate limited upstream, suspending polling for {:?}",
                        cooldown
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(cooldown) => {}
                        _ = stop_rx.changed() => break,
                    }
                }
            }
            info!("poller stopped");
        });

        info!("poller started, interval {:?}", self.interval);
        *poller = Some(RunningPoller { stop_tx, handle });
    }

    /// Stop polling. Any in-flight cycle is allowed to finish; no new cycle
    /// is scheduled afterward. Safe to call at any time, including when the
    /// scheduler was never started.
    pub async fn stop(&self) {
        let running = self.poller.lock().await.take();
        if let Some(running) = running {
            let _ = running.stop_tx.send(true);
            let _ = running.handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }
}
