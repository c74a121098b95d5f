//! # Pispas Hotel
//!
//! Servidor de operaciones para hotel y restaurante: habitaciones y mesas,
//! reservas sin solapes, pedidos de cocina, informes e integraciones
//! salientes.

pub mod api;
pub mod availability;
pub mod config;
pub mod db;
pub mod integrations;
pub mod reports;
