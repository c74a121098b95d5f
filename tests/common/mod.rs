#![allow(dead_code)]

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;

use pispas_hotel::api;
use pispas_hotel::config::{Config, StorageBackend};
use pispas_hotel::db::{MemoryStore, Store};
use pispas_hotel::integrations::Notifier;

pub fn memory_config() -> Config {
    Config {
        storage: StorageBackend::Memory,
        ..Config::default()
    }
}

pub async fn app_with(
    config: Config,
) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let notifier = Notifier::disabled(Arc::clone(&store));
    test::init_service(
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(config))
            .app_data(web::Data::new(notifier))
            .configure(api::init_routes),
    )
    .await
}

pub async fn app() -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    app_with(memory_config()).await
}

/// Ejecuta la petición y devuelve estado y cuerpo JSON (`Null` si no hay)
pub async fn send<S>(app: &S, req: test::TestRequest) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

pub fn authed(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", token)))
}

pub async fn get<S>(app: &S, uri: &str, token: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(app, authed(test::TestRequest::get().uri(uri), token)).await
}

pub async fn post<S>(app: &S, uri: &str, token: &str, body: Value) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    send(
        app,
        authed(test::TestRequest::post().uri(uri).set_json(body), token),
    )
    .await
}

/// Registra la primera cuenta del almacén (admin) y devuelve su token
pub async fn bootstrap_admin<S>(app: &S) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = send(
        app,
        test::TestRequest::post()
            .uri("/accounts/register")
            .set_json(json!({ "name": "admin", "password": "admin-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["access_token"].as_str().unwrap().to_string()
}

/// Registra una cuenta con `role` usando el token de admin
pub async fn staff<S>(app: &S, admin: &str, name: &str, role: &str) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = post(
        app,
        "/accounts/register",
        admin,
        json!({ "name": name, "password": "staff-password", "role": role }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["access_token"].as_str().unwrap().to_string()
}

pub async fn create_resource<S>(app: &S, admin: &str, kind: &str, name: &str, max: i32) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let (status, body) = post(
        app,
        "/resources",
        admin,
        json!({ "kind": kind, "name": name, "max_occupancy": max }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

pub fn stay_request(resource_id: &str, check_in: &str, check_out: &str) -> Value {
    json!({
        "resource_id": resource_id,
        "guest_name": "Ana García",
        "guest_email": "ana@example.com",
        "guest_phone": "+34 600 111 222",
        "party_size": 2,
        "window": { "kind": "stay", "check_in": check_in, "check_out": check_out }
    })
}
