//! # Configuración desde variables de entorno
//!
//! ```env
//! BIND_ADDRESS=0.0.0.0:8080
//! STORAGE=mongodb            # o "memory"
//! MONGODB_URI=mongodb://localhost:27017/?replicaSet=rs0
//! MONGODB_DATABASE=pispas_hotel
//! AUTO_CONFIRM=true
//! TABLE_SLOT_MINUTES=120
//! STATIC_DIR=./static
//! RETRY_MAX_ATTEMPTS=3
//! RETRY_BASE_DELAY_MS=500
//! EMAIL_PROVIDER_URL=https://mail.example.com
//! EMAIL_PROVIDER_KEY=...
//! SMS_PROVIDER_URL=https://sms.example.com
//! SMS_PROVIDER_KEY=...
//! OTA_SYNC_MINUTES=15
//! ```

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::db::models::Channel;
use crate::integrations::{ProviderConfig, RetryPolicy};

const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "pispas_hotel";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("valor inválido para {key}='{value}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("{key} es obligatorio cuando {because}")]
    Missing { key: String, because: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb { uri: String, database: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub storage: StorageBackend,
    /// Las reservas nuevas nacen confirmadas
    pub auto_confirm: bool,
    /// Duración de un turno de mesa cuando la petición no la indica
    pub table_slot_minutes: i64,
    pub static_dir: PathBuf,
    pub retry: RetryPolicy,
    pub integrations: Vec<ProviderConfig>,
    pub ota_sync_minutes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: "0.0.0.0:8080".to_string(),
            storage: StorageBackend::MongoDb {
                uri: DEFAULT_MONGODB_URI.to_string(),
                database: DEFAULT_DATABASE.to_string(),
            },
            auto_confirm: true,
            table_slot_minutes: 120,
            static_dir: PathBuf::from("./static"),
            retry: RetryPolicy::default(),
            integrations: Vec::new(),
            ota_sync_minutes: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración leyendo cada clave con `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE").as_deref().unwrap_or("mongodb") {
            "mongodb" | "mongo" => StorageBackend::MongoDb {
                uri: get("MONGODB_URI").unwrap_or_else(|| DEFAULT_MONGODB_URI.to_string()),
                database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE".to_string(),
                    value: other.to_string(),
                    reason: "use 'mongodb' o 'memory'".to_string(),
                });
            }
        };

        let table_slot_minutes: i64 =
            parse_or(&get, "TABLE_SLOT_MINUTES", defaults.table_slot_minutes)?;
        if table_slot_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "TABLE_SLOT_MINUTES".to_string(),
                value: table_slot_minutes.to_string(),
                reason: "debe ser positivo".to_string(),
            });
        }

        let retry = RetryPolicy {
            max_attempts: parse_or(&get, "RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?.max(1),
            base_delay: Duration::from_millis(parse_or(
                &get,
                "RETRY_BASE_DELAY_MS",
                defaults.retry.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &get,
                "RETRY_MAX_DELAY_MS",
                defaults.retry.max_delay.as_millis() as u64,
            )?),
        };

        let mut integrations = Vec::new();
        for channel in Channel::ALL {
            if let Some(provider) = provider_from(&get, channel)? {
                integrations.push(provider);
            }
        }

        let ota_sync_minutes = match get("OTA_SYNC_MINUTES") {
            Some(value) => Some(parse_value("OTA_SYNC_MINUTES", &value)?),
            None => None,
        };

        Ok(Config {
            bind_address: get("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            storage,
            auto_confirm: parse_or(&get, "AUTO_CONFIRM", defaults.auto_confirm)?,
            table_slot_minutes,
            static_dir: get("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            retry,
            integrations,
            ota_sync_minutes,
        })
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match get(key) {
        Some(value) => parse_value(key, &value),
        None => {
            tracing::info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

/// `<CANAL>_PROVIDER_URL` activa el canal; la clave es entonces obligatoria
fn provider_from(
    get: &impl Fn(&str) -> Option<String>,
    channel: Channel,
) -> Result<Option<ProviderConfig>, ConfigError> {
    let prefix = channel.as_str().to_uppercase();
    let url_key = format!("{prefix}_PROVIDER_URL");

    let Some(base_url) = get(&url_key) else {
        return Ok(None);
    };
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key: url_key,
            value: base_url,
            reason: "debe empezar por http:// o https://".to_string(),
        });
    }

    let key_key = format!("{prefix}_PROVIDER_KEY");
    let api_key = get(&key_key).ok_or_else(|| ConfigError::Missing {
        key: key_key,
        because: format!("{url_key} está definido"),
    })?;

    Ok(Some(ProviderConfig {
        channel,
        name: get(&format!("{prefix}_PROVIDER_NAME")).unwrap_or_else(|| channel.as_str().to_string()),
        base_url,
        path: get(&format!("{prefix}_PROVIDER_PATH")).unwrap_or_else(|| "/".to_string()),
        api_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert!(config.auto_confirm);
        assert_eq!(config.table_slot_minutes, 120);
        assert!(config.integrations.is_empty());
        assert!(matches!(config.storage, StorageBackend::MongoDb { .. }));
    }

    #[test]
    fn memory_backend_and_overrides() {
        let config = config_from(&[
            ("STORAGE", "memory"),
            ("AUTO_CONFIRM", "false"),
            ("TABLE_SLOT_MINUTES", "90"),
            ("RETRY_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert!(!config.auto_confirm);
        assert_eq!(config.table_slot_minutes, 90);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn unknown_storage_is_rejected() {
        assert!(matches!(
            config_from(&[("STORAGE", "postgres")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let err = config_from(&[("TABLE_SLOT_MINUTES", "two hours")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "TABLE_SLOT_MINUTES"));
        assert!(config_from(&[("TABLE_SLOT_MINUTES", "0")]).is_err());
    }

    #[test]
    fn providers_are_loaded_per_channel() {
        let config = config_from(&[
            ("SMS_PROVIDER_URL", "https://sms.example.com"),
            ("SMS_PROVIDER_KEY", "secret-key-123456"),
            ("SMS_PROVIDER_PATH", "/v2/send"),
            ("OTA_PROVIDER_URL", "https://ota.example.com"),
            ("OTA_PROVIDER_KEY", "ota-key-abcdefgh"),
            ("OTA_PROVIDER_NAME", "channel-manager"),
            ("OTA_SYNC_MINUTES", "15"),
        ])
        .unwrap();

        assert_eq!(config.integrations.len(), 2);
        let sms = &config.integrations[0];
        assert_eq!(sms.channel, Channel::Sms);
        assert_eq!(sms.name, "sms");
        assert_eq!(sms.path, "/v2/send");
        let ota = &config.integrations[1];
        assert_eq!(ota.name, "channel-manager");
        assert_eq!(config.ota_sync_minutes, Some(15));
    }

    #[test]
    fn provider_url_without_key_is_an_error() {
        let err = config_from(&[("EMAIL_PROVIDER_URL", "https://mail.example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key, .. } if key == "EMAIL_PROVIDER_KEY"));
    }

    #[test]
    fn provider_url_must_be_http() {
        let err = config_from(&[
            ("EMAIL_PROVIDER_URL", "smtp://mail.example.com"),
            ("EMAIL_PROVIDER_KEY", "k"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
