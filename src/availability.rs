//! # Disponibilidad de habitaciones y mesas
//!
//! Los intervalos son semiabiertos `[inicio, fin)`: una salida el día N no
//! choca con una entrada el mismo día N. Solo las reservas en estado
//! `confirmed` o `checked_in` bloquean un recurso.
//!
//! Todo lo de este módulo es puro. La comprobación atómica contra lo
//! persistido vive en cada implementación de [`crate::db::Store`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;

use crate::api::{AppError, AppResult};
use crate::db::models::{Booking, Resource, ResourceKind, ResourceStatus};

/// Límite superior para la duración de una mesa
const MAX_SLOT_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    /// Construye un intervalo validado
    ///
    /// # Errores
    /// - `Validation`: si `end <= start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::validation_field(
                "intervalo",
                "la fecha de fin debe ser posterior a la de inicio",
            ));
        }
        Ok(Interval { start, end })
    }

    /// Reconstruye un intervalo ya validado al guardarse
    pub(crate) fn from_stored(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Interval { start, end }
    }

    /// Estancia de hotel: de la medianoche UTC de entrada a la de salida
    pub fn from_dates(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<Self> {
        Self::new(midnight(check_in), midnight(check_out))
    }

    /// Turno de mesa: fecha y hora de llegada más la duración en minutos
    pub fn from_slot(date: NaiveDate, time: NaiveTime, minutes: i64) -> AppResult<Self> {
        if minutes <= 0 || minutes > MAX_SLOT_MINUTES {
            return Err(AppError::validation_field(
                "duration_minutes",
                &format!("debe estar entre 1 y {}", MAX_SLOT_MINUTES),
            ));
        }
        let start = date.and_time(time).and_utc();
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Parte de `self` que cae dentro de `window`
    pub fn clip(&self, window: &Interval) -> Option<Interval> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(Interval { start, end })
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Valida y parsea una fecha en formato YYYY-MM-DD
pub fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::validation_field(field, "formato de fecha inválido, use YYYY-MM-DD"))
}

/// Valida y parsea una hora en formato HH:MM
pub fn parse_time(field: &str, value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| AppError::validation_field(field, "formato de hora inválido, use HH:MM"))
}

/// Ventana pedida por el cliente, antes de convertirla a [`Interval`]
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingWindow {
    /// Estancia en habitación, por fechas
    Stay { check_in: String, check_out: String },
    /// Turno de mesa
    Slot {
        date: String,
        time: String,
        duration_minutes: Option<i64>,
    },
}

impl BookingWindow {
    /// Construye la ventana desde parámetros de consulta planos
    pub fn from_parts(
        kind: ResourceKind,
        check_in: Option<&str>,
        check_out: Option<&str>,
        date: Option<&str>,
        time: Option<&str>,
        duration_minutes: Option<i64>,
    ) -> AppResult<Self> {
        let required = |field: &str, value: Option<&str>| {
            value
                .map(str::to_string)
                .ok_or_else(|| AppError::validation_field(field, "es obligatorio"))
        };

        match kind {
            ResourceKind::Room => Ok(BookingWindow::Stay {
                check_in: required("check_in", check_in)?,
                check_out: required("check_out", check_out)?,
            }),
            ResourceKind::Table => Ok(BookingWindow::Slot {
                date: required("date", date)?,
                time: required("time", time)?,
                duration_minutes,
            }),
        }
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            BookingWindow::Stay { .. } => ResourceKind::Room,
            BookingWindow::Slot { .. } => ResourceKind::Table,
        }
    }

    pub fn interval(&self, default_slot_minutes: i64) -> AppResult<Interval> {
        match self {
            BookingWindow::Stay {
                check_in,
                check_out,
            } => Interval::from_dates(
                parse_date("check_in", check_in)?,
                parse_date("check_out", check_out)?,
            ),
            BookingWindow::Slot {
                date,
                time,
                duration_minutes,
            } => Interval::from_slot(
                parse_date("date", date)?,
                parse_time("time", time)?,
                duration_minutes.unwrap_or(default_slot_minutes),
            ),
        }
    }

    /// Valida que la ventana sea del tipo del recurso y la convierte
    pub fn interval_for(&self, resource: &Resource, default_slot_minutes: i64) -> AppResult<Interval> {
        if self.resource_kind() != resource.kind {
            return Err(AppError::validation_field(
                "window",
                &format!(
                    "un recurso de tipo '{}' no admite ventanas de tipo '{}'",
                    resource.kind,
                    self.resource_kind()
                ),
            ));
        }
        self.interval(default_slot_minutes)
    }
}

/// Reservas activas de `resource_id` que se solapan con `interval`
///
/// `exclude` deja fuera la propia reserva al reprogramar o confirmar.
pub fn conflicts<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    resource_id: ObjectId,
    interval: &Interval,
    exclude: Option<ObjectId>,
) -> Vec<&'a Booking> {
    bookings
        .into_iter()
        .filter(|b| b.resource_id == resource_id)
        .filter(|b| Some(b.id) != exclude)
        .filter(|b| b.status.is_active())
        .filter(|b| b.interval().overlaps(interval))
        .collect()
}

pub fn is_available<'a>(
    bookings: impl IntoIterator<Item = &'a Booking>,
    resource_id: ObjectId,
    interval: &Interval,
    exclude: Option<ObjectId>,
) -> bool {
    conflicts(bookings, resource_id, interval, exclude).is_empty()
}

/// Verifica que `candidate` pueda ocupar su intervalo frente a `existing`
pub fn ensure_available<'a>(
    existing: impl IntoIterator<Item = &'a Booking>,
    candidate: &Booking,
) -> AppResult<()> {
    let blocking = conflicts(
        existing,
        candidate.resource_id,
        &candidate.interval(),
        Some(candidate.id),
    );
    if blocking.is_empty() {
        Ok(())
    } else {
        Err(AppError::unavailable(&candidate.resource_id, blocking))
    }
}

/// Rechaza recursos fuera de servicio o sin capacidad para el grupo
pub fn ensure_bookable(resource: &Resource, party_size: i32) -> AppResult<()> {
    if resource.status == ResourceStatus::Maintenance {
        return Err(AppError::Conflict(format!(
            "El recurso '{}' está en mantenimiento",
            resource.name
        )));
    }
    if let Some(min) = resource.min_occupancy {
        if party_size < min {
            return Err(AppError::Validation(format!(
                "'{}' requiere mínimo {} personas",
                resource.name, min
            )));
        }
    }
    if party_size > resource.max_occupancy {
        return Err(AppError::Validation(format!(
            "'{}' permite máximo {} personas",
            resource.name, resource.max_occupancy
        )));
    }
    Ok(())
}

/// Filtra el inventario para una búsqueda
///
/// Quedan fuera los recursos en mantenimiento, los que no admiten el grupo
/// y los que tienen una reserva activa solapada.
pub fn available_resources<'a>(
    resources: &'a [Resource],
    bookings: &[Booking],
    interval: &Interval,
    party_size: Option<i32>,
) -> Vec<&'a Resource> {
    resources
        .iter()
        .filter(|r| r.status != ResourceStatus::Maintenance)
        .filter(|r| party_size.map_or(true, |party| r.fits_party(party)))
        .filter(|r| is_available(bookings, r.id, interval, None))
        .collect()
}
