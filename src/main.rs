//! # Pispas Hotel Server
//!
//! Servidor web de operaciones de hotel y restaurante construido con Rust,
//! Actix Web y MongoDB.
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`),
//! ver [`pispas_hotel::config`]:
//!
//! ```env
//! MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0
//! MONGODB_DATABASE=pispas_hotel
//! BIND_ADDRESS=0.0.0.0:8080
//! RUST_LOG=debug,mongodb=info
//! ```
//!
//! Las reservas usan transacciones, así que MongoDB debe ejecutarse como
//! replica set (basta con uno de un solo nodo). `STORAGE=memory` arranca
//! sin base de datos.
//!
//! ## Arquitectura
//!
//! ```text
//! Clientes (HTML/JS, staff)
//!     ↓ HTTP/JSON
//! API REST (Actix Web)
//!     ↓ Store
//! MongoDB | memoria          → proveedores externos (email, SMS)
//! ```

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pispas_hotel::api;
use pispas_hotel::config::{Config, StorageBackend};
use pispas_hotel::db::{MemoryStore, MongoRepo, Store};
use pispas_hotel::integrations::Notifier;

const DEFAULT_LOG_FILTER: &str = "pispas_hotel=debug,mongodb=info,actix_web=info";

fn startup_error(message: String) -> io::Error {
    tracing::error!("{}", message);
    io::Error::new(io::ErrorKind::Other, message)
}

async fn open_store(storage: &StorageBackend) -> io::Result<Arc<dyn Store>> {
    match storage {
        StorageBackend::MongoDb { uri, database } => {
            let repo = MongoRepo::init(uri, database)
                .await
                .map_err(|e| startup_error(format!("Error de MongoDB: {}", e)))?;

            // No es un error fatal, continuamos sin índices
            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Could not create indexes: {}", e);
            }
            Ok(Arc::new(repo))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Arranca el servidor
///
/// 1. Carga `.env` y configura el logging con tracing
/// 2. Lee y valida la configuración
/// 3. Abre el almacén y prepara el notificador
/// 4. Sirve la API y, si existe, el directorio estático
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()
        .map_err(|e| startup_error(format!("Configuración inválida: {}", e)))?;
    tracing::info!("Starting Pispas Hotel Server");

    let store = open_store(&config.storage).await?;
    let notifier = Notifier::from_config(&config, Arc::clone(&store))
        .map_err(|e| startup_error(format!("Error creando clientes HTTP: {}", e)))?;
    for provider in notifier.providers() {
        tracing::info!(channel = %provider.channel, provider = %provider.name, "Integration configured");
    }

    let bind_address = config.bind_address.clone();
    let static_dir = config.static_dir.clone();
    let serve_static = static_dir.is_dir();
    if !serve_static {
        tracing::info!(dir = %static_dir.display(), "Static directory not found, skipping");
    }

    let store = web::Data::from(store);
    let config = web::Data::new(config);
    let notifier = web::Data::new(notifier);

    tracing::info!("Listening on {}", bind_address);
    HttpServer::new(move || {
        let app = App::new()
            .app_data(store.clone())
            .app_data(config.clone())
            .app_data(notifier.clone())
            .wrap(Logger::default())
            .configure(api::init_routes);

        if serve_static {
            app.service(Files::new("/static", static_dir.clone()).index_file("index.html"))
                .route(
                    "/",
                    web::get().to(|| async {
                        actix_web::HttpResponse::PermanentRedirect()
                            .append_header(("Location", "/static/index.html"))
                            .finish()
                    }),
                )
        } else {
            app
        }
    })
    .bind(&bind_address)?
    .run()
    .await
}
