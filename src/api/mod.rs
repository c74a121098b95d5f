//! # Módulo API
//!
//! Este módulo contiene todas las rutas y controladores de la API REST.
//!
//! ## Módulos principales
//!
//! - [`auth`] - Cuentas del personal, login y validación de tokens
//! - [`resource`] - Habitaciones y mesas, búsqueda por disponibilidad
//! - [`booking`] - Ciclo de vida de las reservas
//! - [`order`] - Pedidos de restaurante
//! - [`kitchen`] - Cola de cocina
//! - [`report`] - Informes de ocupación y ventas
//! - [`integration`] - Proveedores externos y registro de envíos
//! - [`errors`] - Manejo de errores de la aplicación

pub mod auth;
pub mod booking;
pub mod errors;
pub mod integration;
pub mod kitchen;
pub mod middleware;
pub mod order;
pub mod report;
pub mod resource;

// Re-exportar tipos comunes para facilitar su uso
pub use errors::{AppError, AppResult, ConflictWindow, ErrorResponse, ResultExt};

use actix_web::web;

/// Configura todas las rutas de la API
///
/// Los errores de deserialización de JSON y query string se convierten en
/// `AppError::Validation` para que todas las respuestas 400 tengan el
/// mismo formato.
///
/// # Ejemplo
///
/// ```no_run
/// use actix_web::{web, App};
/// use pispas_hotel::api;
///
/// let app = App::new()
///     .configure(api::init_routes);
/// ```
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("JSON inválido: {}", err)).into()
    }));
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Parámetros inválidos: {}", err)).into()
    }));
    cfg.app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Ruta inválida: {}", err)).into()
    }));

    auth::routes(cfg);
    resource::routes(cfg);
    booking::routes(cfg);
    order::routes(cfg);
    kitchen::routes(cfg);
    report::routes(cfg);
    integration::routes(cfg);
}
