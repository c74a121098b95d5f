//! # Integraciones externas
//!
//! Los proveedores se configuran por canal desde el entorno. Los envíos se
//! hacen fuera de la petición HTTP y su resultado queda registrado como
//! [`DeliveryRecord`](crate::db::models::DeliveryRecord).

pub mod client;
mod dispatcher;
pub mod retry;

pub use client::{DeliveryError, HttpOutboundClient, OutboundClient, OutboundMessage};
pub use dispatcher::Notifier;
pub use retry::{deliver, DeliveryOutcome, RetryPolicy};

use serde::Serialize;

use crate::db::models::Channel;

/// Configuración de un proveedor; sin lógica propia
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub channel: Channel,
    pub name: String,
    pub base_url: String,
    pub path: String,
    pub api_key: String,
}

/// Vista pública de un proveedor, con la credencial enmascarada
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSummary {
    pub channel: Channel,
    pub name: String,
    pub base_url: String,
    pub path: String,
    pub credentials: String,
}

impl ProviderConfig {
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            channel: self.channel,
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            path: self.path.clone(),
            credentials: redact(&self.api_key),
        }
    }
}

fn redact(secret: &str) -> String {
    let visible: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}
