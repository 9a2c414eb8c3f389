//! Background polling engine.
//!
//! Once per interval the monitor snapshots the store list, probes every
//! store concurrently (bounded by a worker cap), reduces the samples to one
//! verdict per store and applies the verdicts in snapshot order: an
//! observation event per store, a status update in the repository, a
//! refresh signal on any change and a notification on a flip.

mod aggregate;
mod events;

pub use aggregate::*;
pub use events::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::lookup::StoreIpList;
use crate::notify::{self, Notifier};
use crate::probe::Prober;
use crate::repo::{Repo, Store};

/// Display address for stores with no explicit IP and no list entry.
pub const UNRESOLVED_ADDRESS: &str = "-";

pub struct Monitor {
    cfg: MonitorConfig,
    repo: Arc<Repo>,
    lookup: Arc<StoreIpList>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    notifications_enabled: Arc<AtomicBool>,
    events: mpsc::Sender<PingEvent>,
    refresh: watch::Sender<u64>,
}

/// Handle to a started monitor. Stopping is cooperative: the flag is
/// observed at the sleep/run boundary, so an in-flight cycle finishes first.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

impl Monitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: MonitorConfig,
        repo: Arc<Repo>,
        lookup: Arc<StoreIpList>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
        notifications_enabled: Arc<AtomicBool>,
        events: mpsc::Sender<PingEvent>,
        refresh: watch::Sender<u64>,
    ) -> Self {
        Self {
            cfg,
            repo,
            lookup,
            prober,
            notifier,
            notifications_enabled,
            events,
            refresh,
        }
    }

    /// Spawn the polling loop on the current runtime.
    pub fn start(self: Arc<Self>) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let monitor = self;

        let task = tokio::spawn(async move {
            tracing::info!(
                "monitor started: {} stores, interval {:?}",
                monitor.repo.len(),
                monitor.cfg.interval
            );
            loop {
                monitor.run_once().await;
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = stop_rx.changed() => {}
                    _ = tokio::time::sleep(monitor.cfg.interval) => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
            }
            tracing::info!("monitor stopped");
        });

        MonitorHandle {
            stop: stop_tx,
            task,
        }
    }

    /// Execute one polling cycle.
    pub async fn run_once(&self) {
        let snapshot = self.repo.snapshot();

        // Addresses are pinned at cycle start; CRUD during the cycle
        // becomes visible next cycle.
        let plan: Vec<(String, Option<String>)> = snapshot
            .stores
            .values()
            .map(|store| (store.number.clone(), resolve_address(store, &self.lookup)))
            .collect();

        let limiter = Arc::new(Semaphore::new(self.cfg.max_workers));
        let tasks: Vec<Option<JoinHandle<Verdict>>> = plan
            .iter()
            .map(|(_, address)| {
                address.as_ref().map(|addr| {
                    let limiter = limiter.clone();
                    let prober = self.prober.clone();
                    let addr = addr.clone();
                    let cfg = self.cfg.clone();
                    tokio::spawn(async move {
                        let _permit = limiter.acquire_owned().await;
                        aggregate(
                            prober.as_ref(),
                            &addr,
                            cfg.sample_count,
                            cfg.quorum,
                            cfg.probe_timeout,
                        )
                        .await
                    })
                })
            })
            .collect();

        // Apply in snapshot order, not completion order.
        for ((number, address), task) in plan.into_iter().zip(tasks) {
            let verdict = match task {
                Some(handle) => match handle.await {
                    Ok(verdict) => verdict,
                    Err(err) => {
                        tracing::warn!("probe task for store {} failed: {}", number, err);
                        Verdict::offline()
                    }
                },
                None => Verdict::offline(),
            };
            self.apply(&number, address.as_deref(), &verdict);
        }
    }

    fn apply(&self, number: &str, address: Option<&str>, verdict: &Verdict) {
        let event = PingEvent {
            number: number.to_string(),
            address: address.unwrap_or(UNRESOLVED_ADDRESS).to_string(),
            online: verdict.online,
            latency_ms: verdict.avg_latency.map(|d| d.as_millis() as u64),
            success_count: verdict.success_count,
            time: Local::now(),
        };
        if self.events.try_send(event).is_err() {
            tracing::warn!("event channel full, dropping observation for store {}", number);
        }

        let prev = self.repo.set_status(number, verdict.online);
        if prev != Some(verdict.online) {
            self.refresh.send_modify(|version| *version += 1);
        }
        if notify::should_notify(prev, verdict.online)
            && self.notifications_enabled.load(Ordering::Relaxed)
        {
            let notifier = self.notifier.clone();
            let number = number.to_string();
            let online = verdict.online;
            tokio::spawn(async move {
                notifier.notify(&number, online).await;
            });
        }
    }
}

/// Address actually probed for a store: the explicit IP when set, else the
/// IP list fallback, else nothing.
fn resolve_address(store: &Store, lookup: &StoreIpList) -> Option<String> {
    if !store.ip.is_empty() {
        return Some(store.ip.clone());
    }
    lookup.resolve(&store.number).map(str::to_string)
}
