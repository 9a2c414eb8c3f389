//! HTTP request handlers.

use super::AppState;
use crate::config::{HELPDESK_URL_PREFIX, ISP_OPTIONS};
use crate::monitor::UNRESOLVED_ADDRESS;
use crate::repo::{format_ticket, helpdesk_url, normalize_number, Store};
use crate::storage;

use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");
const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard() -> impl IntoResponse {
    let isp_options = serde_json::to_string(ISP_OPTIONS).unwrap_or_else(|_| "[]".to_string());
    let content = DASHBOARD_TEMPLATE.replace("{{isp_options}}", &isp_options);

    let page = LAYOUT_TEMPLATE
        .replace("{{title}}", "Down Store Monitor")
        .replace("{{content}}", &content);

    Html(page)
}

// ============================================================================
// API: stores
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StoreRow {
    pub number: String,
    pub ip: String,
    pub display_address: String,
    pub isp: String,
    pub helpdesk_ticket: String,
    pub helpdesk_url: Option<String>,
    pub online: Option<bool>,
    pub last_change: Option<String>,
}

pub async fn handle_get_stores(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.repo.snapshot();
    let rows: Vec<StoreRow> = snapshot
        .stores
        .values()
        .map(|store| {
            let display_address = if !store.ip.is_empty() {
                store.ip.clone()
            } else {
                state
                    .lookup
                    .resolve(&store.number)
                    .unwrap_or(UNRESOLVED_ADDRESS)
                    .to_string()
            };
            let ticket = format_ticket(&store.helpdesk_ticket);
            let url = helpdesk_url(&ticket, HELPDESK_URL_PREFIX);
            StoreRow {
                number: store.number.clone(),
                ip: store.ip.clone(),
                display_address,
                isp: store.isp.clone(),
                helpdesk_ticket: ticket,
                helpdesk_url: url,
                online: snapshot.status.get(&store.number).copied(),
                last_change: snapshot
                    .last_change
                    .get(&store.number)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            }
        })
        .collect();

    Json(rows)
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub number: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub helpdesk_ticket: String,
}

impl StoreRequest {
    fn into_store(self) -> Option<Store> {
        let number = normalize_number(&self.number);
        if number.is_empty() {
            return None;
        }
        Some(Store {
            number,
            ip: self.ip.trim().to_string(),
            isp: self.isp.trim().to_string(),
            helpdesk_ticket: self.helpdesk_ticket.trim().to_string(),
        })
    }
}

pub async fn handle_upsert_store(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> impl IntoResponse {
    let Some(store) = req.into_store() else {
        return (StatusCode::BAD_REQUEST, "store number must not be empty").into_response();
    };

    state.repo.upsert(store.clone());
    persist(&state);
    Json(store).into_response()
}

pub async fn handle_replace_store(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(req): Json<StoreRequest>,
) -> impl IntoResponse {
    let key = normalize_number(&number);
    if state.repo.get(&key).is_none() {
        return (StatusCode::NOT_FOUND, "store not found").into_response();
    }
    let Some(store) = req.into_store() else {
        return (StatusCode::BAD_REQUEST, "store number must not be empty").into_response();
    };

    // Renumbering replaces the old entry wholesale.
    if store.number != key {
        state.repo.remove(&key);
    }
    state.repo.upsert(store.clone());
    persist(&state);
    Json(store).into_response()
}

pub async fn handle_delete_store(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> impl IntoResponse {
    state.repo.remove(&number);
    persist(&state);
    StatusCode::NO_CONTENT
}

pub async fn handle_clear_stores(State(state): State<AppState>) -> impl IntoResponse {
    state.repo.clear_all();
    persist(&state);
    StatusCode::NO_CONTENT
}

/// Presentation-triggered mutations persist the full current list.
fn persist(state: &AppState) {
    let stores = state.repo.store_list();
    if let Err(err) = storage::save_stores(&stores, &state.config.stores_path()) {
        tracing::warn!("could not save store list: {}", err);
    }
}

// ============================================================================
// API: events, refresh, notifications
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn handle_get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(200);
    Json(state.events.recent(limit))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub version: u64,
}

pub async fn handle_get_refresh(State(state): State<AppState>) -> impl IntoResponse {
    let version = *state.refresh.borrow();
    Json(RefreshResponse { version })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationsBody {
    pub enabled: bool,
}

pub async fn handle_get_notifications(State(state): State<AppState>) -> impl IntoResponse {
    Json(NotificationsBody {
        enabled: state.notifications_enabled.load(Ordering::Relaxed),
    })
}

pub async fn handle_set_notifications(
    State(state): State<AppState>,
    Json(body): Json<NotificationsBody>,
) -> impl IntoResponse {
    state.notifications_enabled.store(body.enabled, Ordering::Relaxed);
    Json(body)
}
