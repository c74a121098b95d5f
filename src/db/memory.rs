//! Almacén en proceso para pruebas y ejecuciones locales sin MongoDB.
//!
//! Todo el estado vive detrás de un único `RwLock`; `commit_booking`
//! comprueba y escribe sin soltar el cerrojo de escritura.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{
    Account, Booking, DeliveryRecord, Order, OrderStatus, Resource, ResourceStatus,
};
use super::store::{BookingCommit, BookingFilter, OrderFilter, ResourceFilter, Store};
use crate::api::{AppError, AppResult};
use crate::availability;

/// Registros de envío conservados; los más antiguos se descartan
const MAX_DELIVERIES: usize = 1000;

#[derive(Default)]
struct State {
    accounts: HashMap<ObjectId, Account>,
    resources: HashMap<ObjectId, Resource>,
    bookings: HashMap<ObjectId, Booking>,
    orders: HashMap<ObjectId, Order>,
    deliveries: Vec<DeliveryRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count_accounts(&self) -> AppResult<u64> {
        Ok(self.state.read().await.accounts.len() as u64)
    }

    async fn insert_account(&self, account: Account) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.name == account.name) {
            return Err(AppError::Conflict(format!(
                "La cuenta '{}' ya existe",
                account.name
            )));
        }
        state.accounts.insert(account.id, account);
        Ok(())
    }

    async fn find_account_by_name(&self, name: &str) -> AppResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().find(|a| a.name == name).cloned())
    }

    async fn find_account_by_token(&self, token: &str) -> AppResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.access_token == token)
            .cloned())
    }

    async fn insert_resource(&self, resource: Resource) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .resources
            .values()
            .any(|r| r.kind == resource.kind && r.name == resource.name)
        {
            return Err(AppError::Conflict(format!(
                "Ya existe un recurso '{}' de tipo '{}'",
                resource.name, resource.kind
            )));
        }
        state.resources.insert(resource.id, resource);
        Ok(())
    }

    async fn get_resource(&self, id: ObjectId) -> AppResult<Option<Resource>> {
        Ok(self.state.read().await.resources.get(&id).cloned())
    }

    async fn list_resources(&self, filter: &ResourceFilter) -> AppResult<Vec<Resource>> {
        let state = self.state.read().await;
        let mut resources: Vec<Resource> = state
            .resources
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        resources.sort_by(|a, b| (a.kind.as_str(), &a.name).cmp(&(b.kind.as_str(), &b.name)));
        Ok(resources)
    }

    async fn set_resource_status(&self, id: ObjectId, status: ResourceStatus) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.resources.get_mut(&id) {
            Some(resource) => {
                resource.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_resource(&self, id: ObjectId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state
            .bookings
            .values()
            .any(|b| b.resource_id == id && !b.status.is_terminal())
        {
            return Err(AppError::Conflict(
                "El recurso tiene reservas pendientes o activas".to_string(),
            ));
        }
        Ok(state.resources.remove(&id).is_some())
    }

    async fn get_booking(&self, id: ObjectId) -> AppResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.starts_at, b.id));
        Ok(bookings)
    }

    async fn commit_booking(&self, commit: BookingCommit) -> AppResult<Booking> {
        let mut state = self.state.write().await;
        let booking = &commit.booking;

        let resource = state
            .resources
            .get(&booking.resource_id)
            .ok_or_else(|| AppError::not_found_id("Recurso", &booking.resource_id.to_hex()))?;
        commit.check_resource(resource)?;
        commit.check_stored(state.bookings.get(&booking.id))?;

        if commit.needs_interval() {
            availability::ensure_available(state.bookings.values(), booking)?;
        }

        state.bookings.insert(booking.id, booking.clone());
        Ok(commit.booking)
    }

    async fn insert_order(&self, order: Order) -> AppResult<()> {
        self.state.write().await.orders.insert(order.id, order);
        Ok(())
    }

    async fn get_order(&self, id: ObjectId) -> AppResult<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn transition_order(
        &self,
        id: ObjectId,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> AppResult<Option<Order>> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&id) {
            Some(order) if order.status == expected => {
                order.status = next;
                order.updated_at = updated_at;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_delivery(&self, record: DeliveryRecord) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.deliveries.len() >= MAX_DELIVERIES {
            let excess = state.deliveries.len() + 1 - MAX_DELIVERIES;
            state.deliveries.drain(..excess);
        }
        state.deliveries.push(record);
        Ok(())
    }

    async fn list_deliveries(&self, limit: usize) -> AppResult<Vec<DeliveryRecord>> {
        let state = self.state.read().await;
        Ok(state.deliveries.iter().rev().take(limit).cloned().collect())
    }
}
