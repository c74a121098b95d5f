use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;

use super::models::{
    Account, Booking, BookingStatus, DeliveryRecord, Order, OrderStatus, Resource,
    ResourceStatus,
};
use super::store::{BookingCommit, BookingFilter, OrderFilter, ResourceFilter, Store};
use crate::api::middleware::ErrorLogExt;
use crate::api::{AppError, AppResult};
use crate::availability::Interval;

pub type Result<T> = AppResult<T>;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init(uri: &str, database_name: &str) -> Result<MongoRepo> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| AppError::database("connect", e))?;

        let database = client.database(database_name);

        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::database("ping", e))?;

        tracing::info!(database = %database_name, "MongoDB connection established");

        Ok(MongoRepo { client, database })
    }

    pub fn accounts(&self) -> Collection<Account> {
        self.database.collection("accounts")
    }

    pub fn resources(&self) -> Collection<Resource> {
        self.database.collection("resources")
    }

    pub fn bookings(&self) -> Collection<Booking> {
        self.database.collection("bookings")
    }

    pub fn orders(&self) -> Collection<Order> {
        self.database.collection("orders")
    }

    pub fn deliveries(&self) -> Collection<DeliveryRecord> {
        self.database.collection("deliveries")
    }

    pub async fn create_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.accounts()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "access_token": 1 })
                    .options(unique())
                    .build(),
            ])
            .await
            .map_err(|e| AppError::database("create_indexes_accounts", e))?;

        self.resources()
            .create_indexes(vec![IndexModel::builder()
                .keys(doc! { "kind": 1, "name": 1 })
                .options(unique())
                .build()])
            .await
            .map_err(|e| AppError::database("create_indexes_resources", e))?;

        self.bookings()
            .create_indexes(vec![
                IndexModel::builder()
                    .keys(doc! { "resource_id": 1, "starts_at": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "status": 1 }).build(),
            ])
            .await
            .map_err(|e| AppError::database("create_indexes_bookings", e))?;

        self.orders()
            .create_indexes(vec![IndexModel::builder()
                .keys(doc! { "status": 1, "created_at": 1 })
                .build()])
            .await
            .map_err(|e| AppError::database("create_indexes_orders", e))?;

        self.deliveries()
            .create_indexes(vec![IndexModel::builder()
                .keys(doc! { "created_at": -1 })
                .build()])
            .await
            .map_err(|e| AppError::database("create_indexes_deliveries", e))?;

        tracing::info!("MongoDB indexes created");
        Ok(())
    }

    /// Escribir en el recurso lo bloquea hasta el fin de la transacción;
    /// cualquier otra transacción que lo toque recibe un conflicto de escritura
    async fn lock_resource(
        &self,
        session: &mut ClientSession,
        id: ObjectId,
    ) -> Result<Option<Resource>> {
        self.resources()
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { "booking_version": 1_i64 } })
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await
            .map_err(|e| transaction_error("lock_resource", e))
    }

    async fn delete_in_session(&self, session: &mut ClientSession, id: ObjectId) -> Result<bool> {
        if self.lock_resource(session, id).await?.is_none() {
            return Ok(false);
        }

        let live = [
            BookingStatus::Pending.as_str(),
            BookingStatus::Confirmed.as_str(),
            BookingStatus::CheckedIn.as_str(),
        ];
        let pending = self
            .bookings()
            .count_documents(doc! { "resource_id": id, "status": { "$in": live.to_vec() } })
            .session(&mut *session)
            .await
            .map_err(|e| transaction_error("count_live_bookings", e))?;
        if pending > 0 {
            return Err(AppError::Conflict(
                "El recurso tiene reservas pendientes o activas".to_string(),
            ));
        }

        let result = self
            .resources()
            .delete_one(doc! { "_id": id })
            .session(&mut *session)
            .await
            .map_err(|e| transaction_error("delete_resource", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn start_transaction(&self) -> Result<ClientSession> {
        let mut session = self
            .client
            .start_session()
            .await
            .map_err(|e| AppError::database("start_session", e))?;
        session
            .start_transaction()
            .await
            .map_err(|e| AppError::database("start_transaction", e))?;
        Ok(session)
    }

    async fn commit_in_session(&self, session: &mut ClientSession, commit: &BookingCommit) -> Result<()> {
        let booking = &commit.booking;

        let resource = self
            .lock_resource(session, booking.resource_id)
            .await?
            .ok_or_else(|| AppError::not_found_id("Recurso", &booking.resource_id.to_hex()))?;
        commit.check_resource(&resource)?;

        let stored = self
            .bookings()
            .find_one(doc! { "_id": booking.id })
            .session(&mut *session)
            .await
            .map_err(|e| transaction_error("load_booking", e))?;
        commit.check_stored(stored.as_ref())?;

        if commit.needs_interval() {
            let filter = overlap_filter(booking.resource_id, &booking.interval(), Some(booking.id));
            let mut cursor = self
                .bookings()
                .find(filter)
                .session(&mut *session)
                .await
                .map_err(|e| transaction_error("check_overlap", e))?;

            let mut blocking = Vec::new();
            while let Some(found) = cursor.next(&mut *session).await {
                blocking.push(found.map_err(|e| transaction_error("check_overlap", e))?);
            }
            if !blocking.is_empty() {
                return Err(AppError::unavailable(&booking.resource_id, &blocking));
            }
        }

        if commit.expected.is_some() {
            self.bookings()
                .replace_one(doc! { "_id": booking.id }, booking)
                .session(&mut *session)
                .await
                .map_err(|e| transaction_error("replace_booking", e))?;
        } else {
            self.bookings()
                .insert_one(booking)
                .session(&mut *session)
                .await
                .map_err(|e| transaction_error("insert_booking", e))?;
        }
        Ok(())
    }
}

async fn collect_all<T>(
    collection: Collection<T>,
    filter: Document,
    sort: Document,
    operation: &str,
) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut cursor = collection
        .find(filter)
        .sort(sort)
        .await
        .map_err(|e| AppError::database(operation, e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::database(operation, e))?
    {
        let item = cursor
            .deserialize_current()
            .map_err(|e| AppError::database(operation, e))?;
        results.push(item);
    }
    Ok(results)
}

/// Reservas activas del recurso cuyo intervalo semiabierto se solapa
fn overlap_filter(resource_id: ObjectId, interval: &Interval, exclude: Option<ObjectId>) -> Document {
    let active: Vec<&str> = BookingStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
    let mut filter = doc! {
        "resource_id": resource_id,
        "status": { "$in": active },
        "starts_at": { "$lt": interval.end().timestamp() },
        "ends_at": { "$gt": interval.start().timestamp() },
    };
    if let Some(id) = exclude {
        filter.insert("_id", doc! { "$ne": id });
    }
    filter
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY
    )
}

/// Los conflictos de escritura entre transacciones se reportan como 409
async fn abort(session: &mut ClientSession) {
    if let Err(error) = session.abort_transaction().await {
        tracing::warn!(error = %error, "Failed to abort transaction");
    }
}

fn transaction_error(operation: &str, error: mongodb::error::Error) -> AppError {
    if error.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        tracing::info!(operation = %operation, error = %error, "Transaction write conflict");
        AppError::Conflict(
            "Otra operación modificó el recurso al mismo tiempo, inténtelo de nuevo".to_string(),
        )
    } else {
        AppError::database(operation, error)
    }
}

#[async_trait]
impl Store for MongoRepo {
    async fn count_accounts(&self) -> Result<u64> {
        self.accounts()
            .count_documents(doc! {})
            .await
            .map_err(|e| AppError::database("count_accounts", e))
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        let name = account.name.clone();
        match self.accounts().insert_one(account).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(AppError::Conflict(format!("La cuenta '{}' ya existe", name)))
            }
            Err(e) => Err(AppError::database("insert_account", e)),
        }
    }

    async fn find_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        self.accounts()
            .find_one(doc! { "name": name })
            .await
            .log_error_context("finding account by name")
            .map_err(|e| AppError::database("find_account_by_name", e))
    }

    async fn find_account_by_token(&self, token: &str) -> Result<Option<Account>> {
        self.accounts()
            .find_one(doc! { "access_token": token })
            .await
            .log_error_context("validating access token")
            .map_err(|e| AppError::database("find_account_by_token", e))
    }

    async fn insert_resource(&self, resource: Resource) -> Result<()> {
        let name = resource.name.clone();
        match self.resources().insert_one(resource).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "Ya existe un recurso con nombre '{}'",
                name
            ))),
            Err(e) => Err(AppError::database("insert_resource", e)),
        }
    }

    async fn get_resource(&self, id: ObjectId) -> Result<Option<Resource>> {
        self.resources()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("get_resource", e))
    }

    async fn list_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>> {
        let mut query = doc! {};
        if let Some(kind) = filter.kind {
            query.insert("kind", kind.as_str());
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        collect_all(self.resources(), query, doc! { "kind": 1, "name": 1 }, "list_resources")
            .await
    }

    async fn set_resource_status(&self, id: ObjectId, status: ResourceStatus) -> Result<bool> {
        let result = self
            .resources()
            .update_one(doc! { "_id": id }, doc! { "$set": { "status": status.as_str() } })
            .await
            .map_err(|e| AppError::database("set_resource_status", e))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_resource(&self, id: ObjectId) -> Result<bool> {
        let mut session = self.start_transaction().await?;
        let deleted = match self.delete_in_session(&mut session, id).await {
            Ok(deleted) => deleted,
            Err(error) => {
                abort(&mut session).await;
                return Err(error);
            }
        };
        session
            .commit_transaction()
            .await
            .map_err(|e| transaction_error("delete_resource", e))?;
        Ok(deleted)
    }

    async fn get_booking(&self, id: ObjectId) -> Result<Option<Booking>> {
        self.bookings()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("get_booking", e))
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let mut query = doc! {};
        if let Some(resource_id) = filter.resource_id {
            query.insert("resource_id", resource_id);
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        } else if filter.active_only {
            let active: Vec<&str> = BookingStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
            query.insert("status", doc! { "$in": active });
        }
        if let Some(window) = filter.window {
            query.insert("starts_at", doc! { "$lt": window.end().timestamp() });
            query.insert("ends_at", doc! { "$gt": window.start().timestamp() });
        }
        let mut bookings =
            collect_all(self.bookings(), query, doc! { "starts_at": 1 }, "list_bookings").await?;
        // status explícito y active_only a la vez
        bookings.retain(|b| filter.matches(b));
        Ok(bookings)
    }

    async fn commit_booking(&self, commit: BookingCommit) -> Result<Booking> {
        let mut session = self.start_transaction().await?;
        if let Err(error) = self.commit_in_session(&mut session, &commit).await {
            abort(&mut session).await;
            return Err(error);
        }

        session
            .commit_transaction()
            .await
            .map_err(|e| transaction_error("commit_booking", e))?;

        Ok(commit.booking)
    }

    async fn insert_order(&self, order: Order) -> Result<()> {
        self.orders()
            .insert_one(order)
            .await
            .log_error_context("inserting order")
            .map_err(|e| AppError::database("insert_order", e))?;
        Ok(())
    }

    async fn get_order(&self, id: ObjectId) -> Result<Option<Order>> {
        self.orders()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("get_order", e))
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut query = doc! {};
        if !filter.statuses.is_empty() {
            let statuses: Vec<&str> = filter.statuses.iter().map(OrderStatus::as_str).collect();
            query.insert("status", doc! { "$in": statuses });
        }
        if let Some(window) = filter.created_within {
            query.insert(
                "created_at",
                doc! { "$gte": window.start().timestamp(), "$lt": window.end().timestamp() },
            );
        }
        collect_all(self.orders(), query, doc! { "created_at": 1 }, "list_orders")
            .await
    }

    async fn transition_order(
        &self,
        id: ObjectId,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: i64,
    ) -> Result<Option<Order>> {
        self.orders()
            .find_one_and_update(
                doc! { "_id": id, "status": expected.as_str() },
                doc! { "$set": { "status": next.as_str(), "updated_at": updated_at } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| AppError::database("transition_order", e))
    }

    async fn record_delivery(&self, record: DeliveryRecord) -> Result<()> {
        self.deliveries()
            .insert_one(record)
            .await
            .map_err(|e| AppError::database("record_delivery", e))?;
        Ok(())
    }

    async fn list_deliveries(&self, limit: usize) -> Result<Vec<DeliveryRecord>> {
        let mut cursor = self
            .deliveries()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .limit(limit as i64)
            .await
            .map_err(|e| AppError::database("list_deliveries", e))?;

        let mut results = Vec::new();
        while cursor
            .advance()
            .await
            .map_err(|e| AppError::database("list_deliveries", e))?
        {
            results.push(
                cursor
                    .deserialize_current()
                    .map_err(|e| AppError::database("list_deliveries", e))?,
            );
        }
        Ok(results)
    }
}
