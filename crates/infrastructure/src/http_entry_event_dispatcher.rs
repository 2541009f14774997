use std::time::Duration;

use async_trait::async_trait;
use formyard_application::{ClaimedEntryEvent, EntryEventDispatcher};
use formyard_core::{AppError, AppResult};
use tracing::warn;

/// Delivers entry events to a webhook endpoint with bounded retries.
pub struct HttpEntryEventDispatcher {
    http_client: reqwest::Client,
    endpoint: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpEntryEventDispatcher {
    /// Creates a new dispatcher posting to `endpoint`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    async fn dispatch_with_retry(&self, claimed: &ClaimedEntryEvent) -> AppResult<()> {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.endpoint.as_str())
                .header("Idempotency-Key", claimed.event_id.as_str())
                .header("X-Formyard-Event", claimed.event.kind.as_str())
                .header("X-Formyard-Delivery-Attempt", claimed.attempt.to_string())
                .json(&claimed.event)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} for entry event '{}'",
                        response.status(),
                        claimed.event_id
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Validation(format!(
                        "entry event delivery failed with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("entry event delivery transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    event_id = %claimed.event_id,
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying entry event delivery"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "entry event delivery exhausted retries".to_owned()
        })))
    }
}

#[async_trait]
impl EntryEventDispatcher for HttpEntryEventDispatcher {
    async fn dispatch(&self, event: &ClaimedEntryEvent) -> AppResult<()> {
        self.dispatch_with_retry(event).await
    }
}
