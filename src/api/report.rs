//! # API de informes (solo admin)

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use super::auth::{authenticate, ADMIN_ONLY};
use super::AppResult;
use crate::availability::{parse_date, Interval};
use crate::db::models::ResourceKind;
use crate::db::{BookingFilter, OrderFilter, ResourceFilter, Store};
use crate::reports;

/// Ventana de fechas [from, to) en formato YYYY-MM-DD
#[derive(Deserialize)]
struct WindowQuery {
    from: String,
    to: String,
}

#[derive(Deserialize)]
struct OccupancyQuery {
    kind: ResourceKind,
    from: String,
    to: String,
}

fn parse_window(from: &str, to: &str) -> AppResult<Interval> {
    Interval::from_dates(parse_date("from", from)?, parse_date("to", to)?)
}

/// `GET /reports/occupancy?kind=room&from=2024-01-01&to=2024-02-01`
#[get("/reports/occupancy")]
async fn occupancy(
    store: web::Data<dyn Store>,
    query: web::Query<OccupancyQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("occupancy_report", ADMIN_ONLY)?;

    let window = parse_window(&query.from, &query.to)?;
    let resources = store
        .list_resources(&ResourceFilter {
            kind: Some(query.kind),
            status: None,
        })
        .await?;
    let bookings = store
        .list_bookings(&BookingFilter {
            window: Some(window),
            ..Default::default()
        })
        .await?;

    let report = reports::occupancy(&resources, &bookings, &window, query.kind);
    Ok(HttpResponse::Ok().json(report))
}

#[get("/reports/orders")]
async fn orders(
    store: web::Data<dyn Store>,
    query: web::Query<WindowQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("orders_report", ADMIN_ONLY)?;

    let window = parse_window(&query.from, &query.to)?;
    let orders = store
        .list_orders(&OrderFilter {
            statuses: Vec::new(),
            created_within: Some(window),
        })
        .await?;

    Ok(HttpResponse::Ok().json(reports::order_summary(&orders)))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(occupancy);
    cfg.service(orders);
}
