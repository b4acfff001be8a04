use std::time::Duration;

use chrono::Utc;
use entity::api_key::WebhookRetryPolicy;
use entity::verification_session::SessionStatus;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::SessionSignals;

/// Per-attempt delivery timeout.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Payload posted to a customer's webhook URL when a verification session
/// reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventData {
    pub session_id: String,
    pub status: SessionStatus,
    pub confidence: i32,
    pub signals: SessionSignals,
}

impl WebhookEvent {
    pub fn verification_completed(
        session_id: String,
        status: SessionStatus,
        confidence: i32,
        signals: SessionSignals,
    ) -> Self {
        WebhookEvent {
            event: "verification.completed".to_string(),
            data: WebhookEventData {
                session_id,
                status,
                confidence,
                signals,
            },
        }
    }
}

/// Result of a delivery run, recorded on the key as `webhook_last_delivery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// HTTP status of the final attempt, absent when it never connected.
    pub status_code: Option<u16>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

/// How many retries a key's policy allows after the initial attempt.
pub fn max_retries(policy: WebhookRetryPolicy) -> u32 {
    match policy {
        WebhookRetryPolicy::None => 0,
        WebhookRetryPolicy::Once => 1,
        WebhookRetryPolicy::Twice => 2,
        WebhookRetryPolicy::Thrice => 3,
    }
}

/// Deliver an event to a customer webhook. Retries only on transport errors
/// and 5xx responses; a 4xx is terminal since retrying cannot change it.
/// Never returns Err: failure is data, captured in the outcome.
pub async fn deliver(
    client: &reqwest::Client,
    url: &str,
    secret: &str,
    policy: WebhookRetryPolicy,
    event: &WebhookEvent,
) -> DeliveryOutcome {
    let total_attempts = max_retries(policy) + 1;
    let mut attempts = 0;
    let mut last_status_code: Option<u16> = None;

    while attempts < total_attempts {
        attempts += 1;

        let result = client
            .post(url)
            .timeout(ATTEMPT_TIMEOUT)
            .header("X-Webhook-Secret", secret)
            .json(event)
            .send()
            .await;

        match result {
            Ok(response) => {
                let code = response.status().as_u16();
                last_status_code = Some(code);

                if response.status().is_success() {
                    info!(
                        "Webhook delivered to {} on attempt {} ({})",
                        url, attempts, code
                    );
                    return DeliveryOutcome {
                        status: DeliveryStatus::Success,
                        timestamp: Utc::now(),
                        status_code: Some(code),
                        attempts,
                    };
                }

                if response.status().is_client_error() {
                    warn!("Webhook to {} rejected with {}, not retrying", url, code);
                    break;
                }

                warn!(
                    "Webhook to {} failed with {} (attempt {}/{})",
                    url, code, attempts, total_attempts
                );
            }
            Err(e) => {
                warn!(
                    "Webhook to {} failed: {} (attempt {}/{})",
                    url, e, attempts, total_attempts
                );
            }
        }
    }

    DeliveryOutcome {
        status: DeliveryStatus::Failed,
        timestamp: Utc::now(),
        status_code: last_status_code,
        attempts,
    }
}
