// src/db/mod.rs
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod store;

pub use memory::MemoryStore;
pub use self::mongodb::MongoRepo;
pub use store::{BookingCommit, BookingFilter, OrderFilter, ResourceFilter, Store};

/// Timestamp unix actual, en segundos
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
