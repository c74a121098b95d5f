//! # Manejo de errores de la aplicación
//!
//! Jerarquía de errores construida con thiserror. Cada variante sabe qué
//! código HTTP le corresponde y cómo se registra en los logs.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use thiserror::Error;

use crate::db::models::{Booking, BookingStatus};

/// Ventana ocupada que bloquea una reserva solicitada.
///
/// Se devuelve dentro de la respuesta 409 para que el cliente pueda
/// proponer alternativas.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictWindow {
    pub booking_id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<&Booking> for ConflictWindow {
    fn from(booking: &Booking) -> Self {
        ConflictWindow {
            booking_id: booking.id.to_hex(),
            starts_at: booking.starts_at,
            ends_at: booking.ends_at,
            status: booking.status,
        }
    }
}

/// Tipos de error de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    /// Error de base de datos con la operación que lo provocó
    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Error de validación con campo específico
    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField { field: String, message: String },

    /// Error de validación general
    #[error("Error de validación: {0}")]
    Validation(String),

    /// Falta el token o no es válido
    #[error("No autorizado: {0}")]
    Unauthorized(String),

    /// El token es válido pero el rol no alcanza
    #[error("Acceso denegado a '{operation}': requiere rol {required}")]
    Forbidden { operation: String, required: String },

    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId { resource_type: String, id: String },

    /// Conflicto de estado (duplicados, transiciones no permitidas)
    #[error("Conflicto: {0}")]
    Conflict(String),

    /// El recurso ya está ocupado en el intervalo pedido
    #[error("Recurso '{resource_id}' no disponible en el intervalo solicitado")]
    Unavailable {
        resource_id: String,
        conflicts: Vec<ConflictWindow>,
    },

    /// Error interno con código de rastreo
    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace { trace_id: String, message: String },

    #[error("Error interno: {0}")]
    Internal(String),
}

impl AppError {
    /// Crea un error de base de datos con contexto de operación
    pub fn database(operation: &str, source: mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }

    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn forbidden(operation: &str, required: &[impl std::fmt::Display]) -> Self {
        let required = required
            .iter()
            .map(|role| role.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        Self::Forbidden {
            operation: operation.to_string(),
            required,
        }
    }

    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Crea el error de disponibilidad a partir de las reservas que bloquean
    pub fn unavailable<'a>(
        resource_id: &mongodb::bson::oid::ObjectId,
        blocking: impl IntoIterator<Item = &'a Booking>,
    ) -> Self {
        Self::Unavailable {
            resource_id: resource_id.to_hex(),
            conflicts: blocking.into_iter().map(ConflictWindow::from).collect(),
        }
    }

    /// Crea un error interno con trace ID
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::ValidationWithField { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFoundWithId { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Unavailable { .. } => StatusCode::CONFLICT,
            Self::Database { .. } | Self::InternalWithTrace { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            Self::Database { operation, source } => {
                tracing::error!(
                    operation = %operation,
                    error = %source,
                    error_chain = ?source.source(),
                    "Database error occurred"
                );
                ErrorResponse::new("Error de base de datos", "Error interno del servidor")
            }
            Self::ValidationWithField { field, message } => {
                tracing::warn!(field = %field, message = %message, "Validation error");
                ErrorResponse::new("Error de validación", format!("Campo '{}': {}", field, message))
            }
            Self::Validation(message) => {
                tracing::warn!(message = %message, "Validation error");
                ErrorResponse::new("Error de validación", message.clone())
            }
            Self::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "Unauthorized access attempt");
                ErrorResponse::new("No autorizado", reason.clone())
            }
            Self::Forbidden { operation, required } => {
                tracing::warn!(operation = %operation, required = %required, "Forbidden operation");
                ErrorResponse::new("Acceso denegado", self.to_string())
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(resource_type = %resource_type, id = %id, "Resource not found");
                ErrorResponse::new(
                    "No encontrado",
                    format!("{} con ID '{}' no encontrado", resource_type, id),
                )
            }
            Self::Conflict(message) => {
                tracing::info!(message = %message, "Conflict");
                ErrorResponse::new("Conflicto", message.clone())
            }
            Self::Unavailable {
                resource_id,
                conflicts,
            } => {
                tracing::info!(
                    resource_id = %resource_id,
                    conflicts = conflicts.len(),
                    "Resource unavailable for requested interval"
                );
                ErrorResponse {
                    error: "No disponible".to_string(),
                    message: self.to_string(),
                    conflicts: Some(conflicts.clone()),
                }
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(trace_id = %trace_id, message = %message, "Internal error with trace");
                ErrorResponse::new("Error interno", format!("Error interno (trace: {})", trace_id))
            }
            Self::Internal(message) => {
                tracing::error!(message = %message, "Internal error");
                ErrorResponse::new("Error interno", "Error interno del servidor")
            }
        };

        HttpResponse::build(status).json(body)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictWindow>>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: message.into(),
            conflicts: None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

pub trait ResultExt<T> {
    fn map_err_validation(self, message: &str) -> AppResult<T>;
    fn map_err_internal(self, message: &str) -> AppResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + 'static,
{
    fn map_err_validation(self, message: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Validation(format!("{}: {}", message, e)))
    }

    fn map_err_internal(self, message: &str) -> AppResult<T> {
        self.map_err(|e| AppError::internal_trace(&format!("{}: {}", message, e), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn status_codes_follow_error_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::forbidden("reports", &["admin"]).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::not_found_id("Reserva", "x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unavailable_body_lists_conflicts() {
        let error = AppError::Unavailable {
            resource_id: "abc".into(),
            conflicts: vec![ConflictWindow {
                booking_id: "b1".into(),
                starts_at: DateTime::from_timestamp(0, 0).unwrap(),
                ends_at: DateTime::from_timestamp(3600, 0).unwrap(),
                status: BookingStatus::Confirmed,
            }],
        };
        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = response.into_body().try_into_bytes().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No disponible");
        assert_eq!(body["conflicts"][0]["booking_id"], "b1");
        assert_eq!(body["conflicts"][0]["status"], "confirmed");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response = AppError::Internal("pool exhausted at 10.0.0.3".into()).error_response();
        let bytes = response.into_body().try_into_bytes().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Error interno del servidor");
    }
}
