//! # API de reservas
//!
//! Este módulo maneja el ciclo de vida de las reservas de habitaciones y mesas:
//! - Crear reservas (rechazando solapes con reservas activas)
//! - Listar y consultar reservas
//! - Reprogramar fechas o número de personas
//! - Confirmar, registrar entrada/salida y cancelar
//!
//! Todas las escrituras pasan por [`Store::commit_booking`], que vuelve a
//! comprobar el conflicto de forma atómica.

use actix_web::{get, post, put, web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::auth::{authenticate, parse_object_id, Identity, BOOKING_STAFF};
use super::{AppError, AppResult};
use crate::availability::{self, BookingWindow};
use crate::config::Config;
use crate::db::models::{Booking, BookingStatus, Resource, ResourceKind, ResourceStatus};
use crate::db::{current_timestamp, BookingCommit, BookingFilter, Store};
use crate::integrations::Notifier;

#[derive(Deserialize)]
struct NewBooking {
    resource_id: String,
    guest_name: String,
    guest_email: String,
    guest_phone: String,
    party_size: i32,
    window: BookingWindow,
}

#[derive(Deserialize)]
struct Reschedule {
    window: Option<BookingWindow>,
    party_size: Option<i32>,
}

#[derive(Deserialize)]
struct BookingQuery {
    resource_id: Option<String>,
    status: Option<BookingStatus>,
    /// Solapan con [from, to), fechas YYYY-MM-DD
    from: Option<String>,
    to: Option<String>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    resource_id: String,
    requested_by: String,
    guest_name: String,
    guest_email: String,
    guest_phone: String,
    party_size: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: BookingStatus,
    created_at: i64,
    updated_at: i64,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        BookingResponse {
            id: booking.id.to_hex(),
            resource_id: booking.resource_id.to_hex(),
            requested_by: booking.requested_by.to_hex(),
            guest_name: booking.guest_name,
            guest_email: booking.guest_email,
            guest_phone: booking.guest_phone,
            party_size: booking.party_size,
            starts_at: booking.starts_at,
            ends_at: booking.ends_at,
            status: booking.status,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

/// Valida un email de forma básica
fn validate_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn validate_guest(data: &NewBooking) -> AppResult<()> {
    if data.guest_name.trim().is_empty() {
        return Err(AppError::validation_field("guest_name", "es obligatorio"));
    }
    if !validate_email(data.guest_email.trim()) {
        return Err(AppError::validation_field("guest_email", "email inválido"));
    }
    if data.guest_phone.trim().is_empty() {
        return Err(AppError::validation_field("guest_phone", "es obligatorio"));
    }
    validate_party(data.party_size)
}

fn validate_party(party_size: i32) -> AppResult<()> {
    if party_size <= 0 {
        return Err(AppError::validation_field("party_size", "debe ser mayor a 0"));
    }
    Ok(())
}

async fn load_resource(store: &dyn Store, id: ObjectId) -> AppResult<Resource> {
    store
        .get_resource(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Recurso", &id.to_hex()))
}

async fn load_booking(store: &dyn Store, id: &str) -> AppResult<Booking> {
    let booking_id = parse_object_id("id", id)?;
    store
        .get_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Reserva", id))
}

/// Crea una nueva reserva
///
/// # Validaciones
/// - Datos del huésped completos y email con formato válido
/// - El tipo de ventana corresponde al tipo de recurso (`stay` para
///   habitaciones, `slot` para mesas) y su fin es posterior al inicio
/// - El recurso existe, no está en mantenimiento y admite el grupo
/// - Ninguna reserva activa del recurso se solapa con la ventana
///
/// # Ejemplo
/// ```json
/// {
///   "resource_id": "507f1f77bcf86cd799439011",
///   "guest_name": "Juan Pérez",
///   "guest_email": "juan@email.com",
///   "guest_phone": "+34 123 456 789",
///   "party_size": 2,
///   "window": { "kind": "stay", "check_in": "2024-01-10", "check_out": "2024-01-12" }
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: datos o intervalo inválidos
/// - `401/403`: token inválido o rol sin permiso
/// - `404 Not Found`: recurso inexistente
/// - `409 Conflict`: recurso ocupado (con `conflicts`) o en mantenimiento
#[post("/bookings")]
async fn create_booking(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    notifier: web::Data<Notifier>,
    data: web::Json<NewBooking>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("create_booking", BOOKING_STAFF)?;
    validate_guest(&data)?;

    let resource_id = parse_object_id("resource_id", &data.resource_id)?;
    let resource = load_resource(store.get_ref(), resource_id).await?;
    let interval = data.window.interval_for(&resource, config.table_slot_minutes)?;
    availability::ensure_bookable(&resource, data.party_size)?;

    let now = current_timestamp();
    let status = if config.auto_confirm {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };
    let booking = Booking {
        id: ObjectId::new(),
        resource_id,
        requested_by: identity.account_id,
        guest_name: data.guest_name.trim().to_string(),
        guest_email: data.guest_email.trim().to_string(),
        guest_phone: data.guest_phone.trim().to_string(),
        party_size: data.party_size,
        starts_at: interval.start(),
        ends_at: interval.end(),
        status,
        created_at: now,
        updated_at: now,
    };

    let booking = store.commit_booking(BookingCommit::create(booking)).await?;
    tracing::info!(
        booking_id = %booking.id,
        resource_id = %resource.id,
        status = %booking.status,
        by = %identity.name,
        "Booking created"
    );

    if booking.status == BookingStatus::Confirmed {
        notifier.booking_confirmed(&booking, &resource);
    }

    Ok(HttpResponse::Created().json(BookingResponse::from(booking)))
}

#[get("/bookings")]
async fn list_bookings(
    store: web::Data<dyn Store>,
    query: web::Query<BookingQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("list_bookings", BOOKING_STAFF)?;

    let window = match (&query.from, &query.to) {
        (Some(from), Some(to)) => Some(availability::Interval::from_dates(
            availability::parse_date("from", from)?,
            availability::parse_date("to", to)?,
        )?),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "Los filtros 'from' y 'to' deben indicarse juntos".to_string(),
            ))
        }
    };

    let filter = BookingFilter {
        resource_id: query
            .resource_id
            .as_deref()
            .map(|id| parse_object_id("resource_id", id))
            .transpose()?,
        status: query.status,
        window,
        active_only: false,
    };

    let results: Vec<BookingResponse> = store
        .list_bookings(&filter)
        .await?
        .into_iter()
        .map(BookingResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(results))
}

#[get("/bookings/{id}")]
async fn get_booking(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("get_booking", BOOKING_STAFF)?;
    let booking = load_booking(store.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

/// Cambia la ventana y/o el número de personas de una reserva
///
/// Solo para reservas `pending` o `confirmed`. El recurso no cambia; la
/// comprobación de conflicto ignora la propia reserva.
#[put("/bookings/{id}")]
async fn reschedule_booking(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    path: web::Path<String>,
    data: web::Json<Reschedule>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("reschedule_booking", BOOKING_STAFF)?;

    if data.window.is_none() && data.party_size.is_none() {
        return Err(AppError::Validation(
            "Indique 'window' o 'party_size' para reprogramar".to_string(),
        ));
    }

    let current = load_booking(store.get_ref(), &path).await?;
    if !current.status.is_reschedulable() {
        return Err(AppError::Conflict(format!(
            "No se puede reprogramar una reserva en estado '{}'",
            current.status
        )));
    }
    let resource = load_resource(store.get_ref(), current.resource_id).await?;

    let expected = current.status;
    let mut updated = current;
    if let Some(window) = &data.window {
        let interval = window.interval_for(&resource, config.table_slot_minutes)?;
        updated.starts_at = interval.start();
        updated.ends_at = interval.end();
    }
    if let Some(party_size) = data.party_size {
        validate_party(party_size)?;
        updated.party_size = party_size;
    }
    availability::ensure_bookable(&resource, updated.party_size)?;
    updated.updated_at = current_timestamp();

    let booking = store
        .commit_booking(BookingCommit::update(updated, expected))
        .await?;
    tracing::info!(booking_id = %booking.id, by = %identity.name, "Booking rescheduled");

    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

/// Aplica una transición de estado validada contra la tabla de transiciones
async fn transition(
    store: &dyn Store,
    identity: &Identity,
    id: &str,
    next: BookingStatus,
) -> AppResult<Booking> {
    let current = load_booking(store, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "No se puede pasar una reserva de '{}' a '{}'",
            current.status, next
        )));
    }

    let expected = current.status;
    let mut updated = current;
    updated.status = next;
    updated.updated_at = current_timestamp();

    let booking = store
        .commit_booking(BookingCommit::update(updated, expected))
        .await?;
    tracing::info!(
        booking_id = %booking.id,
        from = %expected,
        to = %next,
        by = %identity.name,
        "Booking status changed"
    );
    Ok(booking)
}

/// Estado cacheado del recurso tras un cambio de la reserva
fn resource_status_after(kind: ResourceKind, status: BookingStatus) -> Option<ResourceStatus> {
    match (status, kind) {
        (BookingStatus::CheckedIn, _) => Some(ResourceStatus::Occupied),
        (BookingStatus::CheckedOut, ResourceKind::Room) => Some(ResourceStatus::Cleaning),
        (BookingStatus::CheckedOut, ResourceKind::Table) => Some(ResourceStatus::Available),
        (BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Cancelled, _) => None,
    }
}

async fn sync_resource_status(store: &dyn Store, booking: &Booking) -> AppResult<()> {
    let Some(resource) = store.get_resource(booking.resource_id).await? else {
        return Ok(());
    };
    if let Some(status) = resource_status_after(resource.kind, booking.status) {
        store.set_resource_status(resource.id, status).await?;
        tracing::debug!(resource_id = %resource.id, status = %status, "Resource status synced");
    }
    Ok(())
}

/// Confirma una reserva pendiente
///
/// Vuelve a comprobar conflictos: dos reservas pendientes pueden solaparse,
/// pero solo una puede confirmarse.
#[post("/bookings/{id}/confirm")]
async fn confirm_booking(
    store: web::Data<dyn Store>,
    notifier: web::Data<Notifier>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("confirm_booking", BOOKING_STAFF)?;

    let booking = transition(store.get_ref(), &identity, &path, BookingStatus::Confirmed).await?;
    if let Some(resource) = store.get_resource(booking.resource_id).await? {
        notifier.booking_confirmed(&booking, &resource);
    }
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

#[post("/bookings/{id}/check-in")]
async fn check_in(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("check_in", BOOKING_STAFF)?;

    let booking = transition(store.get_ref(), &identity, &path, BookingStatus::CheckedIn).await?;
    sync_resource_status(store.get_ref(), &booking).await?;
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

#[post("/bookings/{id}/check-out")]
async fn check_out(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("check_out", BOOKING_STAFF)?;

    let booking = transition(store.get_ref(), &identity, &path, BookingStatus::CheckedOut).await?;
    sync_resource_status(store.get_ref(), &booking).await?;
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

/// Cancela una reserva y libera su intervalo
#[post("/bookings/{id}/cancel")]
async fn cancel_booking(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("cancel_booking", BOOKING_STAFF)?;

    let booking = transition(store.get_ref(), &identity, &path, BookingStatus::Cancelled).await?;
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

/// Rutas de reservas
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_booking);
    cfg.service(list_bookings);
    cfg.service(get_booking);
    cfg.service(reschedule_booking);
    cfg.service(confirm_booking);
    cfg.service(check_in);
    cfg.service(check_out);
    cfg.service(cancel_booking);
}
