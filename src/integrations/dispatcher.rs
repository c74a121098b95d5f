use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::client::{HttpOutboundClient, OutboundClient, OutboundMessage};
use super::retry::{deliver, RetryPolicy};
use super::ProviderSummary;
use crate::config::Config;
use crate::db::models::{Booking, Channel, DeliveryRecord, Resource};
use crate::db::{current_timestamp, Store};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Envía avisos a huéspedes por los canales configurados
#[derive(Clone)]
pub struct Notifier {
    clients: Vec<Arc<dyn OutboundClient>>,
    providers: Vec<ProviderSummary>,
    policy: RetryPolicy,
    store: Arc<dyn Store>,
}

impl Notifier {
    pub fn new(
        clients: Vec<Arc<dyn OutboundClient>>,
        providers: Vec<ProviderSummary>,
        policy: RetryPolicy,
        store: Arc<dyn Store>,
    ) -> Self {
        Notifier {
            clients,
            providers,
            policy,
            store,
        }
    }

    /// Sin proveedores: no se envía nada
    pub fn disabled(store: Arc<dyn Store>) -> Self {
        Self::new(Vec::new(), Vec::new(), RetryPolicy::default(), store)
    }

    /// Construye un cliente HTTP por cada proveedor de email o SMS
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self, reqwest::Error> {
        let mut clients: Vec<Arc<dyn OutboundClient>> = Vec::new();
        for provider in &config.integrations {
            if matches!(provider.channel, Channel::Email | Channel::Sms) {
                clients.push(Arc::new(HttpOutboundClient::new(
                    provider.clone(),
                    PROVIDER_TIMEOUT,
                )?));
            }
        }
        let providers = config.integrations.iter().map(|p| p.summary()).collect();
        Ok(Self::new(clients, providers, config.retry, store))
    }

    pub fn providers(&self) -> &[ProviderSummary] {
        &self.providers
    }

    /// Lanza el aviso de confirmación en segundo plano
    ///
    /// La reserva ya está guardada; un fallo de envío solo queda registrado.
    pub fn booking_confirmed(&self, booking: &Booking, resource: &Resource) -> Vec<JoinHandle<()>> {
        let body = format!(
            "Hola {}, su reserva de '{}' del {} al {} está confirmada.",
            booking.guest_name,
            resource.name,
            booking.starts_at.format("%Y-%m-%d %H:%M"),
            booking.ends_at.format("%Y-%m-%d %H:%M"),
        );

        self.clients
            .iter()
            .filter_map(|client| {
                let recipient = match client.channel() {
                    Channel::Email => booking.guest_email.clone(),
                    Channel::Sms => booking.guest_phone.clone(),
                    Channel::Payment | Channel::Ota => return None,
                };
                let message = OutboundMessage {
                    channel: client.channel(),
                    recipient,
                    subject: "Reserva confirmada".to_string(),
                    body: body.clone(),
                    reference: booking.id.to_hex(),
                };
                Some(tokio::spawn(dispatch(
                    Arc::clone(client),
                    message,
                    self.policy,
                    Arc::clone(&self.store),
                )))
            })
            .collect()
    }
}

async fn dispatch(
    client: Arc<dyn OutboundClient>,
    message: OutboundMessage,
    policy: RetryPolicy,
    store: Arc<dyn Store>,
) {
    let outcome = deliver(client.as_ref(), &message, policy).await;

    tracing::info!(
        provider = %client.provider(),
        channel = %message.channel,
        reference = %message.reference,
        status = ?outcome.status,
        attempts = outcome.attempts,
        "Outbound delivery finished"
    );

    let record = DeliveryRecord {
        id: ObjectId::new(),
        channel: message.channel,
        provider: client.provider().to_string(),
        reference: message.reference,
        status: outcome.status,
        attempts: i32::try_from(outcome.attempts).unwrap_or(i32::MAX),
        last_error: outcome.last_error,
        created_at: current_timestamp(),
    };

    if let Err(e) = store.record_delivery(record).await {
        tracing::error!(error = %e, "Failed to record delivery outcome");
    }
}
