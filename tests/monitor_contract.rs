//! Contract tests for the polling cycle, driven through scripted test
//! doubles for the prober and notifier.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use storewatch::config::MonitorConfig;
use storewatch::lookup::StoreIpList;
use storewatch::monitor::{Monitor, PingEvent, UNRESOLVED_ADDRESS};
use storewatch::notify::Notifier;
use storewatch::probe::{ProbeOutcome, Prober};
use storewatch::repo::{Repo, Store};

fn ok(ms: u64) -> ProbeOutcome {
    ProbeOutcome {
        success: true,
        elapsed: Duration::from_millis(ms),
    }
}

fn fail() -> ProbeOutcome {
    ProbeOutcome {
        success: false,
        elapsed: Duration::from_millis(0),
    }
}

/// Replays scripted outcomes per address; unscripted probes fail. An
/// address can be configured to stall before answering, standing in for a
/// probe that hangs until its timeout.
#[derive(Default)]
struct ScriptedProber {
    outcomes: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProber {
    fn script<I>(mut self, address: &str, outcomes: I) -> Self
    where
        I: IntoIterator<Item = ProbeOutcome>,
    {
        self.outcomes
            .get_mut()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    fn stalling(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(address.to_string(), delay);
        self
    }

    fn calls_for(&self, address: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str, _timeout: Duration) -> ProbeOutcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_insert(0) += 1;
        if let Some(delay) = self.delays.get(address) {
            tokio::time::sleep(*delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(fail)
    }
}

/// Counts deliveries and remembers the last one.
#[derive(Default)]
struct CountingNotifier {
    count: AtomicUsize,
    last: Mutex<Option<(String, bool)>>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, number: &str, online: bool) {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((number.to_string(), online));
    }
}

struct Harness {
    repo: Arc<Repo>,
    monitor: Arc<Monitor>,
    events: mpsc::Receiver<PingEvent>,
    refresh: watch::Receiver<u64>,
    prober: Arc<ScriptedProber>,
    notifier: Arc<CountingNotifier>,
}

impl Harness {
    fn new(stores: Vec<Store>, lookup: StoreIpList, prober: ScriptedProber) -> Self {
        Self::with_config(stores, lookup, prober, test_config())
    }

    fn with_config(
        stores: Vec<Store>,
        lookup: StoreIpList,
        prober: ScriptedProber,
        cfg: MonitorConfig,
    ) -> Self {
        let repo = Arc::new(Repo::with_stores(stores));
        let prober = Arc::new(prober);
        let notifier = Arc::new(CountingNotifier::default());
        let (event_tx, event_rx) = mpsc::channel(256);
        let (refresh_tx, refresh_rx) = watch::channel(0u64);

        let monitor = Arc::new(Monitor::new(
            cfg,
            repo.clone(),
            Arc::new(lookup),
            prober.clone(),
            notifier.clone(),
            Arc::new(AtomicBool::new(true)),
            event_tx,
            refresh_tx,
        ));

        Self {
            repo,
            monitor,
            events: event_rx,
            refresh: refresh_rx,
            prober,
            notifier,
        }
    }

    fn drain_events(&mut self) -> Vec<PingEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn refresh_version(&self) -> u64 {
        *self.refresh.borrow()
    }
}

fn test_config() -> MonitorConfig {
    MonitorConfig {
        interval: Duration::from_millis(20),
        sample_count: 1,
        quorum: 1,
        probe_timeout: Duration::from_millis(50),
        max_workers: 4,
    }
}

/// Give spawned fire-and-forget notification tasks a chance to run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn first_observation_sets_status_silently() {
    let prober = ScriptedProber::default().script("10.0.0.1", [ok(10)]);
    let mut harness = Harness::new(vec![Store::new("0001", "10.0.0.1")], StoreIpList::empty(), prober);

    harness.monitor.run_once().await;
    settle().await;

    let snapshot = harness.repo.snapshot();
    assert_eq!(snapshot.status.get("0001"), Some(&true));
    assert!(snapshot.last_change.is_empty());
    assert_eq!(harness.notifier.count.load(Ordering::SeqCst), 0);
    assert_eq!(harness.refresh_version(), 1);

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].online);
    assert_eq!(events[0].address, "10.0.0.1");
}

#[tokio::test]
async fn flip_stamps_timestamp_and_notifies_once() {
    let prober = ScriptedProber::default().script("10.0.0.1", [ok(10), fail()]);
    let harness = Harness::new(vec![Store::new("0001", "10.0.0.1")], StoreIpList::empty(), prober);

    harness.monitor.run_once().await;
    harness.monitor.run_once().await;
    settle().await;

    let snapshot = harness.repo.snapshot();
    assert_eq!(snapshot.status.get("0001"), Some(&false));
    assert!(snapshot.last_change.contains_key("0001"));
    assert_eq!(harness.notifier.count.load(Ordering::SeqCst), 1);
    assert_eq!(
        *harness.notifier.last.lock().unwrap(),
        Some(("0001".to_string(), false))
    );
}

#[tokio::test]
async fn steady_state_is_quiet() {
    let prober = ScriptedProber::default().script("10.0.0.1", [ok(10), ok(11)]);
    let harness = Harness::new(vec![Store::new("0001", "10.0.0.1")], StoreIpList::empty(), prober);

    harness.monitor.run_once().await;
    let version_after_first = harness.refresh_version();
    harness.monitor.run_once().await;
    settle().await;

    assert_eq!(harness.notifier.count.load(Ordering::SeqCst), 0);
    assert!(harness.repo.snapshot().last_change.is_empty());
    assert_eq!(harness.refresh_version(), version_after_first);
}

#[tokio::test]
async fn unresolved_store_gets_synthetic_offline_without_probing() {
    let prober = ScriptedProber::default();
    let mut harness = Harness::new(vec![Store::new("0099", "")], StoreIpList::empty(), prober);

    harness.monitor.run_once().await;

    assert_eq!(harness.prober.total_calls(), 0);
    assert_eq!(harness.repo.snapshot().status.get("0099"), Some(&false));

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].online);
    assert_eq!(events[0].address, UNRESOLVED_ADDRESS);
    assert_eq!(events[0].success_count, 0);
    assert_eq!(events[0].latency_ms, None);
}

#[tokio::test]
async fn lookup_fallback_resolves_and_quorum_aggregates() {
    // Store 0007 has no explicit address; the IP list supplies 10.0.0.9.
    // Three of four samples succeed at 10/12/14 ms, the fourth times out.
    let prober =
        ScriptedProber::default().script("10.0.0.9", [ok(10), ok(12), ok(14), fail()]);
    let lookup = StoreIpList::parse("Store ID,IP Address\n7,10.0.0.9\n");
    let cfg = MonitorConfig {
        sample_count: 4,
        ..test_config()
    };
    let mut harness = Harness::with_config(vec![Store::new("0007", "")], lookup, prober, cfg);

    harness.monitor.run_once().await;

    assert_eq!(harness.prober.calls_for("10.0.0.9"), 4);

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].online);
    assert_eq!(events[0].success_count, 3);
    assert_eq!(events[0].latency_ms, Some(12));
    assert_eq!(events[0].address, "10.0.0.9");
    assert_eq!(harness.repo.snapshot().status.get("0007"), Some(&true));
}

#[tokio::test]
async fn slow_store_does_not_block_others_or_reorder_events() {
    let prober = ScriptedProber::default()
        .script("10.0.0.1", [ok(5)])
        .script("10.0.0.3", [ok(7)])
        .stalling("10.0.0.2", Duration::from_millis(150));
    let mut harness = Harness::new(
        vec![
            Store::new("0001", "10.0.0.1"),
            Store::new("0002", "10.0.0.2"),
            Store::new("0003", "10.0.0.3"),
        ],
        StoreIpList::empty(),
        prober,
    );

    harness.monitor.run_once().await;

    let numbers: Vec<String> = harness
        .drain_events()
        .into_iter()
        .map(|event| event.number)
        .collect();
    assert_eq!(numbers, ["0001", "0002", "0003"]);

    let snapshot = harness.repo.snapshot();
    assert_eq!(snapshot.status.get("0001"), Some(&true));
    assert_eq!(snapshot.status.get("0002"), Some(&false));
    assert_eq!(snapshot.status.get("0003"), Some(&true));
}

#[tokio::test]
async fn stop_is_cooperative() {
    let prober = ScriptedProber::default().script("10.0.0.1", [ok(1), ok(1), ok(1)]);
    let harness = Harness::new(vec![Store::new("0001", "10.0.0.1")], StoreIpList::empty(), prober);

    let handle = harness.monitor.clone().start();
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.stop();

    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("monitor should stop promptly after the stop signal");
}

#[tokio::test]
async fn crud_during_a_cycle_is_visible_next_cycle() {
    let prober = ScriptedProber::default()
        .script("10.0.0.1", [ok(5), ok(5)])
        .script("10.0.0.2", [ok(6)]);
    let mut harness = Harness::new(vec![Store::new("0001", "10.0.0.1")], StoreIpList::empty(), prober);

    harness.monitor.run_once().await;
    assert_eq!(harness.drain_events().len(), 1);

    harness.repo.upsert(Store::new("0002", "10.0.0.2"));
    harness.monitor.run_once().await;

    let numbers: Vec<String> = harness
        .drain_events()
        .into_iter()
        .map(|event| event.number)
        .collect();
    assert_eq!(numbers, ["0001", "0002"]);
}
