use async_trait::async_trait;
use chrono::Utc;
use kawase_core::notify::error::NotifyError;
use kawase_core::notify::port::Notifier;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// # Summary
/// A notifier implementation that POSTs strategy-trader update events
/// to a configured HTTP webhook endpoint as a JSON body.
///
/// # Invariants
/// - The `reqwest` client is reused across notifications.
/// - Delivery failures are reported to the caller but never retried here.
pub struct WebhookNotifier {
    /// The shared asynchronous HTTP client.
    client: Client,
    /// The webhook endpoint URL.
    url: String,
}

impl WebhookNotifier {
    /// # Summary
    /// Creates a new `WebhookNotifier`.
    ///
    /// # Logic
    /// 1. Validates that the URL is non-empty.
    /// 2. Builds a client with a 10 second request timeout.
    ///
    /// # Arguments
    /// * `url` - The webhook endpoint to POST events to.
    ///
    /// # Returns
    /// * A new instance of `WebhookNotifier` or `NotifyError`.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        if url.is_empty() {
            return Err(NotifyError::Config("webhook url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    /// # Summary
    /// Delivers a "strategy-trader updated" event for one market.
    ///
    /// # Logic
    /// 1. Builds a JSON body with the event name, market code and timestamp.
    /// 2. POSTs it to the configured endpoint.
    /// 3. Maps transport errors and non-success status codes to `NotifyError`.
    ///
    /// # Arguments
    /// * `market` - The market code whose trading state changed.
    ///
    /// # Returns
    /// * `Ok(())` if the endpoint accepted the event.
    async fn strategy_trader_updated(&self, market: &str) -> Result<(), NotifyError> {
        let body = json!({
            "event": "strategy-trader-updated",
            "market": market,
            "timestamp": Utc::now(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Network(format!("webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifyError::Endpoint(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        debug!("webhook delivered for {}", market);
        Ok(())
    }
}
