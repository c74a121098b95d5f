//! # API de integraciones (solo admin)
//!
//! Proveedores configurados, con credenciales ocultas, y registro de
//! envíos salientes.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::auth::{authenticate, ADMIN_ONLY};
use super::AppResult;
use crate::config::Config;
use crate::db::Store;
use crate::integrations::Notifier;

const DEFAULT_DELIVERY_LIMIT: usize = 50;
const MAX_DELIVERY_LIMIT: usize = 500;

#[derive(Deserialize)]
struct DeliveryQuery {
    limit: Option<usize>,
}

#[get("/integrations")]
async fn list_providers(
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
    notifier: web::Data<Notifier>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("list_integrations", ADMIN_ONLY)?;

    Ok(HttpResponse::Ok().json(json!({
        "providers": notifier.providers(),
        "ota_sync_minutes": config.ota_sync_minutes,
        "retry": {
            "max_attempts": config.retry.max_attempts,
            "base_delay_ms": config.retry.base_delay.as_millis() as u64,
            "max_delay_ms": config.retry.max_delay.as_millis() as u64
        }
    })))
}

/// Últimos envíos, los más recientes primero
#[get("/integrations/deliveries")]
async fn list_deliveries(
    store: web::Data<dyn Store>,
    query: web::Query<DeliveryQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("list_deliveries", ADMIN_ONLY)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_DELIVERY_LIMIT)
        .clamp(1, MAX_DELIVERY_LIMIT);
    let records = store.list_deliveries(limit).await?;

    let body: Vec<_> = records
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id.to_hex(),
                "channel": r.channel,
                "provider": r.provider,
                "reference": r.reference,
                "status": r.status,
                "attempts": r.attempts,
                "last_error": r.last_error,
                "created_at": r.created_at
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_providers);
    cfg.service(list_deliveries);
}
