//! Webhook notification delivery.
//!
//! [`WebhookNotifier`] POSTs `{"content": <message>}` to a single URL. There
//! is no retry: a failed delivery is logged and dropped.

use std::time::Duration;

use monitor_core::notifications::Notifier;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers notification messages to a chat webhook (e.g. Discord).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for `url` with a pre-configured HTTP client.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// JSON body sent for `message`.
    pub fn payload(message: &str) -> serde_json::Value {
        serde_json::json!({ "content": message })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        let result = self
            .client
            .post(&self.url)
            .json(&Self::payload(message))
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    "webhook returned non-success status; notification dropped"
                );
            }
            Ok(_) => tracing::debug!("notification delivered"),
            Err(e) => {
                tracing::warn!(error = %e, "webhook delivery failed; notification dropped");
            }
        }
    }
}
