use std::time::Duration;

use super::client::{OutboundClient, OutboundMessage};
use crate::db::models::DeliveryStatus;

/// Reintentos acotados con espera exponencial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Espera antes del intento `attempt + 1` (el primero es `attempt = 1`)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Envía `message` reintentando los fallos transitorios
pub async fn deliver(
    client: &dyn OutboundClient,
    message: &OutboundMessage,
    policy: RetryPolicy,
) -> DeliveryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match client.send(message).await {
            Ok(()) => {
                return DeliveryOutcome {
                    status: DeliveryStatus::Delivered,
                    attempts: attempt,
                    last_error: None,
                };
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    provider = %client.provider(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Outbound delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                return DeliveryOutcome {
                    status: DeliveryStatus::Failed,
                    attempts: attempt,
                    last_error: Some(error.to_string()),
                };
            }
        }
    }
}
