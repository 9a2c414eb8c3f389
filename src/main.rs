//! storewatch - Down Store Monitor service.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storewatch::config::Config;
use storewatch::lookup::StoreIpList;
use storewatch::monitor::{EventLog, Monitor};
use storewatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use storewatch::probe::PingProber;
use storewatch::repo::Repo;
use storewatch::storage;
use storewatch::web::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storewatch=info".parse()?),
        )
        .init();

    let cfg = Config::load();
    tracing::info!("starting storewatch on port {}", cfg.http_port);

    let lookup = Arc::new(StoreIpList::load(&cfg.ip_list_path()));
    let stores = storage::load_stores(&cfg.stores_path());
    tracing::info!(
        "loaded {} stores from {}",
        stores.len(),
        cfg.stores_path().display()
    );
    let repo = Arc::new(Repo::with_stores(stores));

    let events = Arc::new(EventLog::new(cfg.event_log_capacity));
    let (event_tx, mut event_rx) = mpsc::channel(1024);
    {
        let events = events.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                events.push(event);
            }
        });
    }

    let (refresh_tx, refresh_rx) = watch::channel(0u64);
    let notifications_enabled = Arc::new(AtomicBool::new(cfg.notifications_enabled));

    let notifier: Arc<dyn Notifier> = match &cfg.notify_webhook {
        Some(url) => {
            tracing::info!("change notifications via webhook {}", url);
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    let monitor = Arc::new(Monitor::new(
        cfg.monitor.clone(),
        repo.clone(),
        lookup.clone(),
        Arc::new(PingProber),
        notifier,
        notifications_enabled.clone(),
        event_tx,
        refresh_tx,
    ));
    let monitor_handle = monitor.start();

    let server = Server::new(
        cfg,
        repo,
        lookup,
        events,
        notifications_enabled,
        refresh_rx,
    );
    tokio::select! {
        result = server.start() => {
            if let Err(err) = result {
                tracing::error!("web server failed: {}", err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    monitor_handle.stop();
    monitor_handle.join().await;

    Ok(())
}
