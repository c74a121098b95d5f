//! Informes de ocupación y de pedidos.
//!
//! Funciones puras sobre los datos ya cargados del almacén.

use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::availability::Interval;
use crate::db::models::{Booking, Order, OrderStatus, Resource, ResourceKind};

const TOP_ITEMS: usize = 5;

#[derive(Debug, Serialize)]
pub struct ResourceOccupancy {
    pub resource_id: String,
    pub name: String,
    pub booked_seconds: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct OccupancyReport {
    pub kind: ResourceKind,
    pub window_seconds: i64,
    pub resources: Vec<ResourceOccupancy>,
    pub booked_seconds: i64,
    pub capacity_seconds: i64,
    pub occupancy_rate: f64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ItemSales {
    pub name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderReport {
    pub total_orders: usize,
    pub by_status: BTreeMap<OrderStatus, usize>,
    pub served_revenue_cents: i64,
    pub top_items: Vec<ItemSales>,
}

fn rate(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Ocupación de los recursos de `kind` dentro de `window`
///
/// Cada reserva confirmada, en curso o cerrada aporta la parte de su
/// intervalo que cae en la ventana.
pub fn occupancy(
    resources: &[Resource],
    bookings: &[Booking],
    window: &Interval,
    kind: ResourceKind,
) -> OccupancyReport {
    let window_seconds = window.duration().num_seconds();

    let mut booked: HashMap<ObjectId, i64> = HashMap::new();
    for booking in bookings.iter().filter(|b| b.status.counts_as_occupied()) {
        if let Some(part) = booking.interval().clip(window) {
            *booked.entry(booking.resource_id).or_default() += part.duration().num_seconds();
        }
    }

    let rows: Vec<ResourceOccupancy> = resources
        .iter()
        .filter(|r| r.kind == kind)
        .map(|resource| {
            let seconds = booked.get(&resource.id).copied().unwrap_or(0);
            ResourceOccupancy {
                resource_id: resource.id.to_hex(),
                name: resource.name.clone(),
                booked_seconds: seconds,
                occupancy_rate: rate(seconds, window_seconds),
            }
        })
        .collect();

    let booked_seconds = rows.iter().map(|r| r.booked_seconds).sum();
    let capacity_seconds = window_seconds * rows.len() as i64;

    OccupancyReport {
        kind,
        window_seconds,
        booked_seconds,
        capacity_seconds,
        occupancy_rate: rate(booked_seconds, capacity_seconds),
        resources: rows,
    }
}

/// Resumen de pedidos creados en la ventana
pub fn order_summary(orders: &[Order]) -> OrderReport {
    let mut by_status: BTreeMap<OrderStatus, usize> =
        OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut items: HashMap<&str, ItemSales> = HashMap::new();
    let mut served_revenue_cents: i64 = 0;

    for order in orders {
        *by_status.entry(order.status).or_default() += 1;
        if order.status != OrderStatus::Served {
            continue;
        }
        served_revenue_cents = served_revenue_cents.saturating_add(order.total_cents());
        for line in &order.lines {
            let entry = items.entry(line.name.as_str()).or_insert_with(|| ItemSales {
                name: line.name.clone(),
                quantity: 0,
                revenue_cents: 0,
            });
            entry.quantity += i64::from(line.quantity);
            entry.revenue_cents = entry.revenue_cents.saturating_add(line.total_cents());
        }
    }

    let mut top_items: Vec<ItemSales> = items.into_values().collect();
    top_items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_items.truncate(TOP_ITEMS);

    OrderReport {
        total_orders: orders.len(),
        by_status,
        served_revenue_cents,
        top_items,
    }
}
