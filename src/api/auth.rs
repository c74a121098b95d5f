//! # API de cuentas
//!
//! - Registro de cuentas de personal (la primera cuenta es admin)
//! - Login con nombre y contraseña
//! - Validación del token Bearer de cada petición
//!
//! La identidad se resuelve en cada petición y se pasa explícitamente a los
//! handlers como [`Identity`]; no existe un "usuario actual" global.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{AppError, AppResult, ResultExt};
use crate::db::models::{Account, Role};
use crate::db::{current_timestamp, Store};

const MIN_PASSWORD_LEN: usize = 8;

pub const RESOURCE_ADMIN: &[Role] = &[Role::Admin];
pub const RESOURCE_STATUS: &[Role] = &[Role::Admin, Role::FrontDesk];
pub const BOOKING_STAFF: &[Role] = &[Role::Admin, Role::FrontDesk];
pub const ORDER_TAKERS: &[Role] = &[Role::Admin, Role::FrontDesk, Role::Waiter];
pub const ORDER_HANDLERS: &[Role] = &[Role::Admin, Role::Kitchen, Role::Waiter];
pub const KITCHEN_VIEW: &[Role] = &[Role::Admin, Role::Kitchen, Role::Waiter];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Cuenta autenticada en la petición en curso
#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: ObjectId,
    pub name: String,
    pub role: Role,
}

impl Identity {
    /// Exige que el rol de la cuenta esté en `allowed`
    ///
    /// # Errores
    /// - `Forbidden`: si el rol no está permitido para `operation`
    pub fn require(&self, operation: &str, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden(operation, allowed))
        }
    }
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Identity {
            account_id: account.id,
            name: account.name.clone(),
            role: account.role,
        }
    }
}

#[derive(Deserialize)]
struct RegisterAccount {
    name: String,
    password: String,
    /// Ignorado para la primera cuenta, que siempre es admin
    role: Option<Role>,
}

#[derive(Deserialize)]
struct LoginRequest {
    name: String,
    password: String,
}

#[derive(Serialize)]
struct AccountInfo {
    id: String,
    name: String,
    role: Role,
}

/// Extrae el token Bearer del header Authorization
///
/// # Errores
/// - `Unauthorized`: si falta el header, es inválido o no tiene el formato correcto
fn extract_token(req: &HttpRequest) -> AppResult<&str> {
    let auth_header = req
        .headers()
        .get("authorization")
        .ok_or_else(|| AppError::Unauthorized("Falta header Authorization".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Header Authorization inválido".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Formato de token inválido".to_string()))
}

/// Resuelve la identidad de la petición a partir de su token
pub async fn authenticate(req: &HttpRequest, store: &dyn Store) -> AppResult<Identity> {
    let token = extract_token(req)?;
    match store.find_account_by_token(token).await? {
        Some(account) => Ok(Identity::from(&account)),
        None => Err(AppError::Unauthorized("Token inválido".to_string())),
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err_internal("Error generando hash")
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Registra una cuenta de personal
///
/// Con el almacén vacío no hace falta token y la cuenta creada es admin.
/// A partir de ahí solo un admin puede registrar cuentas nuevas.
///
/// # Respuesta
/// ```json
/// { "access_token": "uuid", "id": "...", "role": "front_desk" }
/// ```
///
/// # Errores
/// - `400 Bad Request`: nombre vacío o contraseña corta
/// - `401/403`: falta token de admin cuando ya existen cuentas
/// - `409 Conflict`: el nombre ya está en uso
#[post("/accounts/register")]
async fn register_account(
    store: web::Data<dyn Store>,
    data: web::Json<RegisterAccount>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err(AppError::validation_field("name", "es obligatorio"));
    }
    if data.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation_field(
            "password",
            &format!("debe tener al menos {} caracteres", MIN_PASSWORD_LEN),
        ));
    }

    let bootstrap = store.count_accounts().await? == 0;
    let role = if bootstrap {
        Role::Admin
    } else {
        let identity = authenticate(&req, store.get_ref()).await?;
        identity.require("register_account", ADMIN_ONLY)?;
        data.role.unwrap_or(Role::FrontDesk)
    };

    let account = Account {
        id: ObjectId::new(),
        name: name.to_string(),
        password_hash: hash_password(&data.password)?,
        role,
        access_token: Uuid::new_v4().to_string(),
        created_at: current_timestamp(),
    };
    let response = json!({
        "access_token": account.access_token,
        "id": account.id.to_hex(),
        "role": account.role,
        "message": "Cuenta registrada correctamente"
    });

    store.insert_account(account).await?;
    tracing::info!(name = %name, role = %role, bootstrap, "Account registered");

    Ok(HttpResponse::Created().json(response))
}

#[post("/accounts/login")]
async fn login(
    store: web::Data<dyn Store>,
    data: web::Json<LoginRequest>,
) -> AppResult<impl Responder> {
    if data.name.is_empty() || data.password.is_empty() {
        return Err(AppError::Validation("Nombre y contraseña son requeridos".to_string()));
    }

    let account = store.find_account_by_name(data.name.trim()).await?;

    match account {
        Some(account) if verify_password(&data.password, &account.password_hash) => {
            Ok(HttpResponse::Ok().json(json!({
                "access_token": account.access_token,
                "id": account.id.to_hex(),
                "role": account.role,
                "message": "Login exitoso"
            })))
        }
        _ => Err(AppError::Unauthorized("Credenciales incorrectas".to_string())),
    }
}

#[get("/accounts/me")]
async fn me(store: web::Data<dyn Store>, req: HttpRequest) -> AppResult<impl Responder> {
    let identity = authenticate(&req, store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(AccountInfo {
        id: identity.account_id.to_hex(),
        name: identity.name,
        role: identity.role,
    }))
}

/// Parsea un ObjectId recibido como texto
pub fn parse_object_id(field: &str, value: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(value.trim()).map_err_validation(&format!("ID inválido en '{}'", field))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register_account);
    cfg.service(login);
    cfg.service(me);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn bearer_token_is_required() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(extract_token(&req), Err(AppError::Unauthorized(_))));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert!(matches!(extract_token(&req), Err(AppError::Unauthorized(_))));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok-123"))
            .to_http_request();
        assert_eq!(extract_token(&req).unwrap(), "tok-123");
    }

    #[test]
    fn require_rejects_roles_outside_the_list() {
        let identity = Identity {
            account_id: ObjectId::new(),
            name: "cocina".into(),
            role: Role::Kitchen,
        };
        assert!(identity.require("kitchen_queue", KITCHEN_VIEW).is_ok());
        assert!(matches!(
            identity.require("create_booking", BOOKING_STAFF),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn object_ids_are_validated() {
        assert!(parse_object_id("id", "not-an-id").is_err());
        let id = ObjectId::new();
        assert_eq!(parse_object_id("id", &id.to_hex()).unwrap(), id);
    }
}
