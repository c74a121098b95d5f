//! Contrato de persistencia compartido por MongoDB y el almacén en memoria.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use super::models::{
    Account, Booking, BookingStatus, DeliveryRecord, Order, OrderStatus, Resource, ResourceKind,
    ResourceStatus,
};
use crate::api::{AppError, AppResult};
use crate::availability::Interval;

#[derive(Debug, Default, Clone)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub status: Option<ResourceStatus>,
}

impl ResourceFilter {
    pub fn matches(&self, resource: &Resource) -> bool {
        self.kind.map_or(true, |kind| resource.kind == kind)
            && self.status.map_or(true, |status| resource.status == status)
    }
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub resource_id: Option<ObjectId>,
    pub status: Option<BookingStatus>,
    /// Solo reservas que se solapan con esta ventana
    pub window: Option<Interval>,
    /// Solo reservas en estado activo
    pub active_only: bool,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.resource_id.map_or(true, |id| booking.resource_id == id)
            && self.status.map_or(true, |status| booking.status == status)
            && self
                .window
                .map_or(true, |window| booking.interval().overlaps(&window))
            && (!self.active_only || booking.status.is_active())
    }
}

#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    /// Vacío equivale a todos los estados
    pub statuses: Vec<OrderStatus>,
    /// Pedidos creados dentro de la ventana
    pub created_within: Option<Interval>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&order.status))
            && self.created_within.map_or(true, |window| {
                order.created_at >= window.start().timestamp()
                    && order.created_at < window.end().timestamp()
            })
    }
}

/// Escritura de una reserva con verificación de conflicto
#[derive(Debug, Clone)]
pub struct BookingCommit {
    pub booking: Booking,
    /// `None` para altas; en actualizaciones, el estado que debe seguir
    /// teniendo la reserva guardada para que la escritura proceda
    pub expected: Option<BookingStatus>,
}

impl BookingCommit {
    pub fn create(booking: Booking) -> Self {
        BookingCommit {
            booking,
            expected: None,
        }
    }

    pub fn update(booking: Booking, expected: BookingStatus) -> Self {
        BookingCommit {
            booking,
            expected: Some(expected),
        }
    }

    /// Solo las reservas que siguen vivas necesitan hueco libre
    pub fn needs_interval(&self) -> bool {
        !self.booking.status.is_terminal()
    }

    /// Decide, a partir de lo guardado, si la escritura puede proceder
    pub fn check_stored(&self, stored: Option<&Booking>) -> AppResult<()> {
        match (stored, self.expected) {
            (Some(stored), Some(_)) => self.ensure_current(stored),
            (None, Some(_)) => Err(AppError::not_found_id("Reserva", &self.booking.id.to_hex())),
            (Some(_), None) => Err(AppError::Conflict("La reserva ya existe".to_string())),
            (None, None) => Ok(()),
        }
    }

    /// Un recurso en mantenimiento no admite reservas que aún no han empezado
    pub fn check_resource(&self, resource: &Resource) -> AppResult<()> {
        let upcoming = matches!(
            self.booking.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        );
        if upcoming && resource.status == ResourceStatus::Maintenance {
            return Err(AppError::Conflict(format!(
                "El recurso '{}' está en mantenimiento",
                resource.name
            )));
        }
        Ok(())
    }

    /// Compara con la versión guardada antes de sobrescribirla
    pub fn ensure_current(&self, stored: &Booking) -> AppResult<()> {
        if let Some(expected) = self.expected {
            if stored.status != expected {
                return Err(AppError::Conflict(format!(
                    "La reserva cambió de estado a '{}' durante la operación",
                    stored.status
                )));
            }
        }
        if stored.resource_id != self.booking.resource_id {
            return Err(AppError::Validation(
                "No se puede cambiar el recurso de una reserva".to_string(),
            ));
        }
        Ok(())
    }
}

/// Almacén de la aplicación
///
/// `commit_booking` es la única vía de escritura de reservas: comprueba
/// conflictos y escribe de forma atómica, de modo que dos peticiones
/// simultáneas sobre el mismo recurso e intervalo no pueden tener éxito
/// ambas.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count_accounts(&self) -> AppResult<u64>;
    /// Falla con `Conflict` si el nombre ya existe
    async fn insert_account(&self, account: Account) -> AppResult<()>;
    async fn find_account_by_name(&self, name: &str) -> AppResult<Option<Account>>;
    async fn find_account_by_token(&self, token: &str) -> AppResult<Option<Account>>;

    /// Falla con `Conflict` si ya existe un recurso del mismo tipo y nombre
    async fn insert_resource(&self, resource: Resource) -> AppResult<()>;
    async fn get_resource(&self, id: ObjectId) -> AppResult<Option<Resource>>;
    async fn list_resources(&self, filter: &ResourceFilter) -> AppResult<Vec<Resource>>;
    async fn set_resource_status(&self, id: ObjectId, status: ResourceStatus) -> AppResult<bool>;
    /// Falla con `Conflict` si el recurso tiene reservas no terminadas
    async fn delete_resource(&self, id: ObjectId) -> AppResult<bool>;

    async fn get_booking(&self, id: ObjectId) -> AppResult<Option<Booking>>;
    /// Ordenadas por inicio
    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>>;
    async fn commit_booking(&self, commit: BookingCommit) -> AppResult<Booking>;

    async fn insert_order(&self, order: Order) -> AppResult<()>;
    async fn get_order(&self, id: ObjectId) -> AppResult<Option<Order>>;
    /// Ordenados por creación, los más antiguos primero
    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<Order>>;
    /// Cambia el estado solo si sigue siendo `expected`; `None` si no
    async fn transition_order(
        &self,
        id: ObjectId,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> AppResult<Option<Order>>;

    async fn record_delivery(&self, record: DeliveryRecord) -> AppResult<()>;
    /// Los más recientes primero
    async fn list_deliveries(&self, limit: usize) -> AppResult<Vec<DeliveryRecord>>;
}
