//! Configuration, loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// ISP labels offered by the store edit form.
pub const ISP_OPTIONS: &[&str] = &[
    "",
    "Granite",
    "GlobalGig",
    "GTT",
    "Comcast",
    "CradlePoint: Verizon",
    "CradlePoint: ATT",
    "CradlePoint: T-Mobile",
];

/// Base URL helpdesk tickets link to.
pub const HELPDESK_URL_PREFIX: &str =
    "https://lidshelp.atlassian.net/jira/servicedesk/projects/HD/queues/custom/20/";

pub const STORES_FILENAME: &str = "stores.json";
pub const IP_LIST_FILENAME: &str = "store_ip_list.csv";

/// Settings consumed by the polling core.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between cycles.
    pub interval: Duration,
    /// Probes per store per cycle.
    pub sample_count: u32,
    /// Successful probes required to call a store online.
    pub quorum: u32,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
    /// Cap on concurrently probed stores.
    pub max_workers: usize,
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port for the dashboard (default: 8080).
    pub http_port: u16,
    /// Directory holding stores.json and store_ip_list.csv.
    pub data_dir: PathBuf,
    /// Ring-buffer capacity of the observation log.
    pub event_log_capacity: usize,
    /// Webhook URL for change notifications; log-only when unset.
    pub notify_webhook: Option<String>,
    /// Initial state of the notifications toggle.
    pub notifications_enabled: bool,
    pub monitor: MonitorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            data_dir: PathBuf::from("."),
            event_log_capacity: 1000,
            notify_webhook: None,
            notifications_enabled: true,
            monitor: MonitorConfig {
                interval: Duration::from_secs(30),
                sample_count: 4,
                quorum: 1,
                probe_timeout: Duration::from_secs(2),
                max_workers: 8,
            },
        }
    }
}

impl Config {
    /// Load configuration from `STOREWATCH_*` environment variables.
    /// Unset or unparseable values keep their defaults.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = env_parse("STOREWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Ok(dir) = env::var("STOREWATCH_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(capacity) = env_parse("STOREWATCH_EVENT_LOG_CAPACITY") {
            cfg.event_log_capacity = capacity;
        }
        if let Ok(url) = env::var("STOREWATCH_NOTIFY_WEBHOOK") {
            if !url.trim().is_empty() {
                cfg.notify_webhook = Some(url);
            }
        }
        if let Some(enabled) = env_parse("STOREWATCH_NOTIFICATIONS") {
            cfg.notifications_enabled = enabled;
        }
        if let Some(secs) = env_parse::<u64>("STOREWATCH_PING_INTERVAL_SECS") {
            cfg.monitor.interval = Duration::from_secs(secs);
        }
        if let Some(count) = env_parse("STOREWATCH_SAMPLE_COUNT") {
            cfg.monitor.sample_count = count;
        }
        if let Some(quorum) = env_parse("STOREWATCH_QUORUM") {
            cfg.monitor.quorum = quorum;
        }
        if let Some(ms) = env_parse::<u64>("STOREWATCH_PROBE_TIMEOUT_MS") {
            cfg.monitor.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(workers) = env_parse::<usize>("STOREWATCH_MAX_WORKERS") {
            cfg.monitor.max_workers = workers.max(1);
        }

        if cfg.monitor.quorum > cfg.monitor.sample_count {
            tracing::warn!(
                "quorum {} exceeds sample count {}; every store will read offline",
                cfg.monitor.quorum,
                cfg.monitor.sample_count
            );
        }

        cfg
    }

    pub fn stores_path(&self) -> PathBuf {
        self.data_dir.join(STORES_FILENAME)
    }

    pub fn ip_list_path(&self) -> PathBuf {
        self.data_dir.join(IP_LIST_FILENAME)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}
