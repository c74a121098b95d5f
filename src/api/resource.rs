//! # API de recursos
//!
//! Habitaciones y mesas: alta, listado, búsqueda por disponibilidad,
//! cambio del estado cacheado y borrado.

use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::auth::{authenticate, parse_object_id, RESOURCE_ADMIN, RESOURCE_STATUS};
use super::{AppError, AppResult};
use crate::availability::{self, BookingWindow};
use crate::config::Config;
use crate::db::models::{Resource, ResourceKind, ResourceStatus};
use crate::db::{current_timestamp, BookingFilter, ResourceFilter, Store};

#[derive(Deserialize)]
struct NewResource {
    kind: ResourceKind,
    name: String,
    max_occupancy: i32,
    min_occupancy: Option<i32>,
}

#[derive(Deserialize)]
struct ResourceQuery {
    kind: Option<ResourceKind>,
    status: Option<ResourceStatus>,
}

/// Parámetros de búsqueda de disponibilidad
///
/// Habitaciones usan `check_in`/`check_out`; mesas `date`/`time` y
/// opcionalmente `duration_minutes`.
#[derive(Deserialize)]
struct AvailabilityQuery {
    kind: ResourceKind,
    check_in: Option<String>,
    check_out: Option<String>,
    date: Option<String>,
    time: Option<String>,
    duration_minutes: Option<i64>,
    party_size: Option<i32>,
}

#[derive(Deserialize)]
struct StatusUpdate {
    status: ResourceStatus,
}

#[derive(Serialize)]
pub struct ResourceResponse {
    id: String,
    kind: ResourceKind,
    name: String,
    max_occupancy: i32,
    min_occupancy: Option<i32>,
    status: ResourceStatus,
}

impl From<&Resource> for ResourceResponse {
    fn from(resource: &Resource) -> Self {
        ResourceResponse {
            id: resource.id.to_hex(),
            kind: resource.kind,
            name: resource.name.clone(),
            max_occupancy: resource.max_occupancy,
            min_occupancy: resource.min_occupancy,
            status: resource.status,
        }
    }
}

fn validate_new_resource(data: &NewResource) -> AppResult<()> {
    if data.name.trim().is_empty() {
        return Err(AppError::validation_field("name", "es obligatorio"));
    }
    if data.max_occupancy <= 0 {
        return Err(AppError::validation_field("max_occupancy", "debe ser mayor a 0"));
    }
    if let Some(min) = data.min_occupancy {
        if min <= 0 || min > data.max_occupancy {
            return Err(AppError::validation_field(
                "min_occupancy",
                "debe estar entre 1 y max_occupancy",
            ));
        }
    }
    Ok(())
}

/// Crea una habitación o una mesa
///
/// # Errores
/// - `400 Bad Request`: nombre vacío o capacidades incoherentes
/// - `403 Forbidden`: requiere rol admin
/// - `409 Conflict`: ya existe un recurso con ese nombre y tipo
#[post("/resources")]
async fn create_resource(
    store: web::Data<dyn Store>,
    data: web::Json<NewResource>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("create_resource", RESOURCE_ADMIN)?;
    validate_new_resource(&data)?;

    let resource = Resource {
        id: ObjectId::new(),
        kind: data.kind,
        name: data.name.trim().to_string(),
        max_occupancy: data.max_occupancy,
        min_occupancy: data.min_occupancy,
        status: ResourceStatus::Available,
        booking_version: 0,
        created_at: current_timestamp(),
    };
    store.insert_resource(resource.clone()).await?;
    tracing::info!(resource_id = %resource.id, kind = %resource.kind, name = %resource.name, "Resource created");

    Ok(HttpResponse::Created().json(ResourceResponse::from(&resource)))
}

#[get("/resources")]
async fn list_resources(
    store: web::Data<dyn Store>,
    query: web::Query<ResourceQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(&req, store.get_ref()).await?;

    let filter = ResourceFilter {
        kind: query.kind,
        status: query.status,
    };
    let resources = store.list_resources(&filter).await?;
    let results: Vec<ResourceResponse> = resources.iter().map(ResourceResponse::from).collect();
    Ok(HttpResponse::Ok().json(results))
}

/// Busca recursos libres para una ventana
///
/// # Ejemplo
/// `GET /resources/available?kind=room&check_in=2024-01-10&check_out=2024-01-12&party_size=2`
#[get("/resources/available")]
async fn search_available(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    query: web::Query<AvailabilityQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(&req, store.get_ref()).await?;

    let window = BookingWindow::from_parts(
        query.kind,
        query.check_in.as_deref(),
        query.check_out.as_deref(),
        query.date.as_deref(),
        query.time.as_deref(),
        query.duration_minutes,
    )?;
    let interval = window.interval(config.table_slot_minutes)?;

    if let Some(party) = query.party_size {
        if party <= 0 {
            return Err(AppError::validation_field("party_size", "debe ser mayor a 0"));
        }
    }

    let resources = store
        .list_resources(&ResourceFilter {
            kind: Some(query.kind),
            status: None,
        })
        .await?;
    let bookings = store
        .list_bookings(&BookingFilter {
            window: Some(interval),
            active_only: true,
            ..Default::default()
        })
        .await?;

    let results: Vec<ResourceResponse> =
        availability::available_resources(&resources, &bookings, &interval, query.party_size)
            .into_iter()
            .map(ResourceResponse::from)
            .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "starts_at": interval.start(),
        "ends_at": interval.end(),
        "resources": results
    })))
}

#[get("/resources/{id}")]
async fn get_resource(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(&req, store.get_ref()).await?;
    let id = parse_object_id("id", &path)?;

    let resource = store
        .get_resource(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Recurso", &path))?;
    Ok(HttpResponse::Ok().json(ResourceResponse::from(&resource)))
}

/// Cambia el estado cacheado de un recurso
///
/// No afecta a las reservas existentes. `maintenance` deja el recurso
/// fuera de las búsquedas y rechaza reservas nuevas.
#[post("/resources/{id}/status")]
async fn set_status(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    data: web::Json<StatusUpdate>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("set_resource_status", RESOURCE_STATUS)?;
    let id = parse_object_id("id", &path)?;

    if !store.set_resource_status(id, data.status).await? {
        return Err(AppError::not_found_id("Recurso", &path));
    }
    tracing::info!(resource_id = %id, status = %data.status, by = %identity.name, "Resource status changed");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": id.to_hex(),
        "status": data.status
    })))
}

#[delete("/resources/{id}")]
async fn delete_resource(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("delete_resource", RESOURCE_ADMIN)?;
    let id = parse_object_id("id", &path)?;

    if !store.delete_resource(id).await? {
        return Err(AppError::not_found_id("Recurso", &path));
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Recurso eliminado correctamente",
        "id": id.to_hex()
    })))
}

/// Rutas de recursos
///
/// `search_available` se registra antes que `get_resource` para que
/// `/resources/available` no se interprete como un ID.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_resource);
    cfg.service(list_resources);
    cfg.service(search_available);
    cfg.service(get_resource);
    cfg.service(set_status);
    cfg.service(delete_resource);
}
