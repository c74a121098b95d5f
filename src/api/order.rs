//! # API de pedidos
//!
//! Pedidos de restaurante: en mesa, servicio de habitaciones o para llevar.
//! Los cambios de estado siguen el flujo
//! `pending → preparing → ready → served`, con cancelación posible hasta
//! que el pedido está listo.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::auth::{authenticate, parse_object_id, ORDER_HANDLERS, ORDER_TAKERS};
use super::{AppError, AppResult};
use crate::db::models::{BookingStatus, Order, OrderLine, OrderOrigin, OrderStatus, ResourceKind};
use crate::db::{current_timestamp, OrderFilter, Store};

const MAX_NOTE_LEN: usize = 500;
const MAX_LINES: usize = 200;
const MAX_LINE_QUANTITY: i32 = 10_000;
/// 1.000.000,00 por unidad
const MAX_UNIT_PRICE_CENTS: i64 = 100_000_000;

/// Procedencia tal como llega en la petición (IDs en texto)
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum OriginRequest {
    Table { table_id: String },
    RoomService { booking_id: String },
    Takeaway,
}

#[derive(Deserialize)]
struct NewOrder {
    origin: OriginRequest,
    lines: Vec<OrderLine>,
    note: Option<String>,
}

#[derive(Deserialize)]
struct OrderQuery {
    status: Option<OrderStatus>,
}

#[derive(Deserialize)]
struct StatusChange {
    status: OrderStatus,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginResponse {
    Table { table_id: String },
    RoomService { booking_id: String },
    Takeaway,
}

impl From<&OrderOrigin> for OriginResponse {
    fn from(origin: &OrderOrigin) -> Self {
        match origin {
            OrderOrigin::Table { table_id } => OriginResponse::Table {
                table_id: table_id.to_hex(),
            },
            OrderOrigin::RoomService { booking_id } => OriginResponse::RoomService {
                booking_id: booking_id.to_hex(),
            },
            OrderOrigin::Takeaway => OriginResponse::Takeaway,
        }
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub origin: OriginResponse,
    pub lines: Vec<OrderLine>,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            id: order.id.to_hex(),
            origin: OriginResponse::from(&order.origin),
            total_cents: order.total_cents(),
            lines: order.lines,
            note: order.note,
            status: order.status,
            created_by: order.created_by.to_hex(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn validate_lines(lines: &[OrderLine]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::validation_field("lines", "el pedido no tiene líneas"));
    }
    if lines.len() > MAX_LINES {
        return Err(AppError::validation_field(
            "lines",
            &format!("máximo {} líneas por pedido", MAX_LINES),
        ));
    }
    let mut total: i64 = 0;
    for (index, line) in lines.iter().enumerate() {
        let field = format!("lines[{}]", index);
        if line.name.trim().is_empty() {
            return Err(AppError::validation_field(&field, "falta el nombre del plato"));
        }
        if line.quantity <= 0 {
            return Err(AppError::validation_field(&field, "la cantidad debe ser mayor a 0"));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(AppError::validation_field(
                &field,
                &format!("la cantidad máxima es {}", MAX_LINE_QUANTITY),
            ));
        }
        if line.unit_price_cents < 0 {
            return Err(AppError::validation_field(&field, "el precio no puede ser negativo"));
        }
        if line.unit_price_cents > MAX_UNIT_PRICE_CENTS {
            return Err(AppError::validation_field(&field, "el precio unitario es demasiado alto"));
        }
        total = line
            .checked_total_cents()
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| AppError::validation_field(&field, "el importe del pedido es demasiado alto"))?;
    }
    Ok(())
}

/// Comprueba que la procedencia apunte a algo que exista y tenga sentido
async fn resolve_origin(store: &dyn Store, origin: &OriginRequest) -> AppResult<OrderOrigin> {
    match origin {
        OriginRequest::Table { table_id } => {
            let id = parse_object_id("table_id", table_id)?;
            let resource = store
                .get_resource(id)
                .await?
                .ok_or_else(|| AppError::not_found_id("Mesa", table_id))?;
            if resource.kind != ResourceKind::Table {
                return Err(AppError::validation_field("table_id", "el recurso no es una mesa"));
            }
            Ok(OrderOrigin::Table { table_id: id })
        }
        OriginRequest::RoomService { booking_id } => {
            let id = parse_object_id("booking_id", booking_id)?;
            let booking = store
                .get_booking(id)
                .await?
                .ok_or_else(|| AppError::not_found_id("Reserva", booking_id))?;
            if booking.status != BookingStatus::CheckedIn {
                return Err(AppError::Conflict(format!(
                    "El servicio de habitaciones requiere una estancia en curso (estado actual '{}')",
                    booking.status
                )));
            }
            Ok(OrderOrigin::RoomService { booking_id: id })
        }
        OriginRequest::Takeaway => Ok(OrderOrigin::Takeaway),
    }
}

/// Crea un pedido en estado `pending`
///
/// # Ejemplo
/// ```json
/// {
///   "origin": { "kind": "table", "table_id": "507f1f77bcf86cd799439011" },
///   "lines": [{ "name": "Paella", "quantity": 2, "unit_price_cents": 1450 }],
///   "note": "sin marisco"
/// }
/// ```
#[post("/orders")]
async fn create_order(
    store: web::Data<dyn Store>,
    data: web::Json<NewOrder>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("create_order", ORDER_TAKERS)?;

    let NewOrder { origin, lines, note } = data.into_inner();
    validate_lines(&lines)?;
    let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
        return Err(AppError::validation_field(
            "note",
            &format!("máximo {} caracteres", MAX_NOTE_LEN),
        ));
    }
    let origin = resolve_origin(store.get_ref(), &origin).await?;

    let now = current_timestamp();
    let order = Order {
        id: ObjectId::new(),
        origin,
        lines,
        note,
        status: OrderStatus::Pending,
        created_by: identity.account_id,
        created_at: now,
        updated_at: now,
    };
    store.insert_order(order.clone()).await?;
    tracing::info!(
        order_id = %order.id,
        total_cents = order.total_cents(),
        by = %identity.name,
        "Order created"
    );

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

#[get("/orders")]
async fn list_orders(
    store: web::Data<dyn Store>,
    query: web::Query<OrderQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("list_orders", ORDER_TAKERS)?;

    let filter = OrderFilter {
        statuses: query.status.into_iter().collect(),
        created_within: None,
    };
    let results: Vec<OrderResponse> = store
        .list_orders(&filter)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(results))
}

#[get("/orders/{id}")]
async fn get_order(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("get_order", ORDER_TAKERS)?;

    let id = parse_object_id("id", &path)?;
    let order = store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Pedido", &path))?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// Avanza o cancela un pedido
///
/// # Errores
/// - `409 Conflict`: transición no permitida, o el pedido cambió de estado
///   entre la lectura y la escritura
#[post("/orders/{id}/status")]
async fn change_status(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    data: web::Json<StatusChange>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("change_order_status", ORDER_HANDLERS)?;

    let id = parse_object_id("id", &path)?;
    let current = store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Pedido", &path))?;

    let next = data.status;
    if !current.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "No se puede pasar un pedido de '{}' a '{}'",
            current.status, next
        )));
    }

    let order = store
        .transition_order(id, current.status, next, current_timestamp())
        .await?
        .ok_or_else(|| {
            AppError::Conflict("El pedido cambió de estado durante la operación".to_string())
        })?;
    tracing::info!(order_id = %id, from = %current.status, to = %next, by = %identity.name, "Order status changed");

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_order);
    cfg.service(list_orders);
    cfg.service(get_order);
    cfg.service(change_status);
}
