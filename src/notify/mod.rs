//! Change notifications: the flip decision and best-effort delivery.

use async_trait::async_trait;
use serde_json::json;

/// Decide whether a status observation warrants a user-facing notification.
/// The first observation is silent; any flip between known states is loud.
pub fn should_notify(prev: Option<bool>, new: bool) -> bool {
    matches!(prev, Some(p) if p != new)
}

/// Best-effort notification delivery. Implementations log failures and
/// never propagate them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, number: &str, online: bool);
}

/// Writes notifications to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, number: &str, online: bool) {
        let state = if online { "ONLINE" } else { "OFFLINE" };
        tracing::info!("store {} is now {}", number, state);
    }
}

/// Posts notifications to a webhook as JSON.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, number: &str, online: bool) {
        let state = if online { "ONLINE" } else { "OFFLINE" };
        let payload = json!({
            "store": number,
            "online": online,
            "message": format!("Store {number} is now {state}"),
        });
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::warn!("notification webhook returned {}", resp.status());
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("notification webhook failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_silent() {
        assert!(!should_notify(None, true));
        assert!(!should_notify(None, false));
    }

    #[test]
    fn unchanged_status_is_silent() {
        assert!(!should_notify(Some(true), true));
        assert!(!should_notify(Some(false), false));
    }

    #[test]
    fn any_flip_notifies() {
        assert!(should_notify(Some(true), false));
        assert!(should_notify(Some(false), true));
    }
}
