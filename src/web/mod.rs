//! Web dashboard and JSON API.
//!
//! Read paths only ever consume repository snapshots; mutations go through
//! the repository's atomic operations and persist the full store list.

mod handlers;

pub use handlers::*;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::lookup::StoreIpList;
use crate::monitor::EventLog;
use crate::repo::Repo;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repo: Arc<Repo>,
    pub lookup: Arc<StoreIpList>,
    pub events: Arc<EventLog>,
    pub notifications_enabled: Arc<AtomicBool>,
    pub refresh: watch::Receiver<u64>,
}

/// Web server for storewatch.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(
        config: Config,
        repo: Arc<Repo>,
        lookup: Arc<StoreIpList>,
        events: Arc<EventLog>,
        notifications_enabled: Arc<AtomicBool>,
        refresh: watch::Receiver<u64>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                repo,
                lookup,
                events,
                notifications_enabled,
                refresh,
            },
        }
    }

    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/", get(handlers::handle_dashboard))
            .route("/api/stores", get(handlers::handle_get_stores))
            .route("/api/stores", post(handlers::handle_upsert_store))
            .route("/api/stores", delete(handlers::handle_clear_stores))
            .route("/api/stores/{number}", put(handlers::handle_replace_store))
            .route("/api/stores/{number}", delete(handlers::handle_delete_store))
            .route("/api/events", get(handlers::handle_get_events))
            .route("/api/refresh", get(handlers::handle_get_refresh))
            .route("/api/notifications", get(handlers::handle_get_notifications))
            .route("/api/notifications", post(handlers::handle_set_notifications))
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        tracing::info!("web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.routes()).await?;

        Ok(())
    }
}
