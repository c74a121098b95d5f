//! Interfaz uniforme para proveedores externos (email, SMS, pagos, OTAs).

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::ProviderConfig;
use crate::db::models::Channel;

/// Mensaje genérico; cada proveedor lo recibe tal cual en JSON
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Identificador interno asociado (p. ej. la reserva)
    pub reference: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Vale la pena reintentar: timeouts, 5xx, 429
    #[error("fallo transitorio: {0}")]
    Transient(String),
    /// El proveedor rechazó la petición
    #[error("fallo permanente: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

#[async_trait]
pub trait OutboundClient: Send + Sync {
    fn channel(&self) -> Channel;
    fn provider(&self) -> &str;
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Cliente HTTP que publica el mensaje en `base_url + path`
pub struct HttpOutboundClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpOutboundClient {
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpOutboundClient { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl OutboundClient for HttpOutboundClient {
    fn channel(&self) -> Channel {
        self.config.channel
    }

    fn provider(&self) -> &str {
        &self.config.name
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(e.to_string()))?;

        classify_status(response.status().as_u16())
    }
}

fn classify_status(status: u16) -> Result<(), DeliveryError> {
    match status {
        200..=299 => Ok(()),
        408 | 429 | 500..=599 => Err(DeliveryError::Transient(format!("HTTP {}", status))),
        _ => Err(DeliveryError::Permanent(format!("HTTP {}", status))),
    }
}
