//! # Cola de cocina
//!
//! Pedidos sin terminar, los más antiguos primero, con su antigüedad en
//! minutos.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Serialize;

use super::auth::{authenticate, KITCHEN_VIEW};
use super::order::OrderResponse;
use super::AppResult;
use crate::db::models::{Order, OrderStatus};
use crate::db::{current_timestamp, OrderFilter, Store};

#[derive(Serialize)]
struct Ticket {
    #[serde(flatten)]
    order: OrderResponse,
    age_minutes: i64,
}

#[derive(Serialize, Default, Debug, PartialEq, Eq)]
struct QueueCounts {
    pending: usize,
    preparing: usize,
    ready: usize,
}

#[derive(Serialize)]
struct KitchenQueue {
    counts: QueueCounts,
    tickets: Vec<Ticket>,
}

fn count(orders: &[Order]) -> QueueCounts {
    let mut counts = QueueCounts::default();
    for order in orders {
        match order.status {
            OrderStatus::Pending => counts.pending += 1,
            OrderStatus::Preparing => counts.preparing += 1,
            OrderStatus::Ready => counts.ready += 1,
            OrderStatus::Served | OrderStatus::Cancelled => {}
        }
    }
    counts
}

#[get("/kitchen/queue")]
async fn queue(store: web::Data<dyn Store>, req: HttpRequest) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    identity.require("kitchen_queue", KITCHEN_VIEW)?;

    let orders = store
        .list_orders(&OrderFilter {
            statuses: OrderStatus::KITCHEN.to_vec(),
            created_within: None,
        })
        .await?;

    let now = current_timestamp();
    let counts = count(&orders);
    let tickets = orders
        .into_iter()
        .map(|order| Ticket {
            age_minutes: (now - order.created_at).max(0) / 60,
            order: OrderResponse::from(order),
        })
        .collect();

    Ok(HttpResponse::Ok().json(KitchenQueue { counts, tickets }))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(queue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::OrderOrigin;
    use mongodb::bson::oid::ObjectId;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: ObjectId::new(),
            origin: OrderOrigin::Takeaway,
            lines: Vec::new(),
            note: None,
            status,
            created_by: ObjectId::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn counts_ignore_finished_orders() {
        let orders = vec![
            order(OrderStatus::Pending),
            order(OrderStatus::Pending),
            order(OrderStatus::Ready),
            order(OrderStatus::Served),
        ];
        assert_eq!(
            count(&orders),
            QueueCounts {
                pending: 2,
                preparing: 0,
                ready: 1
            }
        );
    }
}
