use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::availability::Interval;

macro_rules! status_str {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Tipo de recurso reservable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Room,
    Table,
}

status_str!(ResourceKind { Room => "room", Table => "table" });

/// Estado cacheado del recurso. No decide la disponibilidad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Occupied,
    Maintenance,
    Cleaning,
}

status_str!(ResourceStatus {
    Available => "available",
    Occupied => "occupied",
    Maintenance => "maintenance",
    Cleaning => "cleaning",
});

/// Habitación o mesa
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub kind: ResourceKind,
    pub name: String,
    pub max_occupancy: i32,
    pub min_occupancy: Option<i32>,
    pub status: ResourceStatus,
    /// Contador que se incrementa dentro de cada transacción de reserva
    #[serde(default)]
    pub booking_version: i64,
    pub created_at: i64,
}

impl Resource {
    pub fn fits_party(&self, party_size: i32) -> bool {
        party_size <= self.max_occupancy
            && self.min_occupancy.map_or(true, |min| party_size >= min)
    }
}

/// Ciclo de vida de una reserva
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

status_str!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    CheckedIn => "checked_in",
    CheckedOut => "checked_out",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Estados que cuentan al calcular conflictos
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::CheckedIn];

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Confirmed | Self::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CheckedOut | Self::Cancelled)
    }

    /// Se puede cambiar fecha o número de personas
    pub fn is_reschedulable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Cuenta como ocupación efectiva en los informes
    pub fn counts_as_occupied(&self) -> bool {
        matches!(self, Self::Confirmed | Self::CheckedIn | Self::CheckedOut)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match self {
            Pending => matches!(next, Confirmed | Cancelled),
            Confirmed => matches!(next, CheckedIn | Cancelled),
            CheckedIn => matches!(next, CheckedOut),
            CheckedOut | Cancelled => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub resource_id: ObjectId,
    /// Cuenta que registró la reserva
    pub requested_by: ObjectId,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    pub party_size: i32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub starts_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ends_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Booking {
    pub fn interval(&self) -> Interval {
        Interval::from_stored(self.starts_at, self.ends_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

status_str!(OrderStatus {
    Pending => "pending",
    Preparing => "preparing",
    Ready => "ready",
    Served => "served",
    Cancelled => "cancelled",
});

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Cancelled,
    ];

    /// Estados visibles en la cola de cocina
    pub const KITCHEN: [OrderStatus; 3] =
        [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Served | Self::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(next, Preparing | Cancelled),
            Preparing => matches!(next, Ready | Cancelled),
            Ready => matches!(next, Served),
            Served | Cancelled => false,
        }
    }
}

/// Procedencia de un pedido
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOrigin {
    Table { table_id: ObjectId },
    RoomService { booking_id: ObjectId },
    Takeaway,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl OrderLine {
    /// Importe de la línea, o `None` si no cabe en un `i64`
    pub fn checked_total_cents(&self) -> Option<i64> {
        i64::from(self.quantity).checked_mul(self.unit_price_cents)
    }

    pub fn total_cents(&self) -> i64 {
        i64::from(self.quantity).saturating_mul(self.unit_price_cents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub origin: OrderOrigin,
    pub lines: Vec<OrderLine>,
    pub note: Option<String>,
    pub status: OrderStatus,
    pub created_by: ObjectId,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(OrderLine::total_cents)
            .fold(0i64, i64::saturating_add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    FrontDesk,
    Waiter,
    Kitchen,
}

status_str!(Role {
    Admin => "admin",
    FrontDesk => "front_desk",
    Waiter => "waiter",
    Kitchen => "kitchen",
});

/// Cuenta de personal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub access_token: String,
    pub created_at: i64,
}

/// Canal de una integración externa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Payment,
    Ota,
}

status_str!(Channel {
    Email => "email",
    Sms => "sms",
    Payment => "payment",
    Ota => "ota",
});

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Sms, Channel::Payment, Channel::Ota];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

/// Resultado de un envío saliente, con todos sus reintentos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub channel: Channel,
    pub provider: String,
    pub reference: String,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_confirmed_and_checked_in_are_active() {
        let active: Vec<_> = [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
        ]
        .into_iter()
        .filter(BookingStatus::is_active)
        .collect();
        assert_eq!(active, BookingStatus::ACTIVE.to_vec());
    }

    #[test]
    fn terminal_booking_states_have_no_exits() {
        for next in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::CheckedIn,
            BookingStatus::CheckedOut,
            BookingStatus::Cancelled,
        ] {
            assert!(!BookingStatus::CheckedOut.can_transition_to(next));
            assert!(!BookingStatus::Cancelled.can_transition_to(next));
        }
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::CheckedIn));
        assert!(BookingStatus::CheckedIn.can_transition_to(BookingStatus::CheckedOut));
    }

    #[test]
    fn order_flow_moves_forward_only() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Served));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Served.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn status_strings_match_serde_names() {
        assert_eq!(
            serde_json::to_value(BookingStatus::CheckedIn).unwrap(),
            serde_json::json!(BookingStatus::CheckedIn.as_str())
        );
        assert_eq!(
            serde_json::to_value(Role::FrontDesk).unwrap(),
            serde_json::json!("front_desk")
        );
    }

    #[test]
    fn order_total_sums_lines() {
        let order = Order {
            id: ObjectId::new(),
            origin: OrderOrigin::Takeaway,
            lines: vec![
                OrderLine { name: "Paella".into(), quantity: 2, unit_price_cents: 1450 },
                OrderLine { name: "Agua".into(), quantity: 3, unit_price_cents: 200 },
            ],
            note: None,
            status: OrderStatus::Pending,
            created_by: ObjectId::new(),
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(order.total_cents(), 3500);
    }

    #[test]
    fn party_limits_are_inclusive() {
        let table = Resource {
            id: ObjectId::new(),
            kind: ResourceKind::Table,
            name: "T1".into(),
            max_occupancy: 4,
            min_occupancy: Some(2),
            status: ResourceStatus::Available,
            booking_version: 0,
            created_at: 0,
        };
        assert!(table.fits_party(2));
        assert!(table.fits_party(4));
        assert!(!table.fits_party(1));
        assert!(!table.fits_party(5));
    }
}
