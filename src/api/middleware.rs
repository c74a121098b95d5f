//! # Utilidades de logging para errores
//!
//! Registrar la cadena completa (`source()`) de un error antes de convertirlo
//! en `AppError`, que solo conserva el mensaje de más alto nivel.

use std::error::Error as StdError;

/// Registra la cadena completa de errores
pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let chain = error_chain(error);

    match context {
        Some(ctx) => tracing::error!(context = %ctx, error_chain = ?chain, "Error with full chain"),
        None => tracing::error!(error_chain = ?chain, "Error with full chain"),
    }
}

/// Mensajes de `error` y de todas sus causas, de fuera hacia dentro
pub fn error_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);

    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }
    chain
}

/// Extension trait para Results que registra la cadena de errores
///
/// ```ignore
/// store.accounts()
///     .find_one(filter)
///     .await
///     .log_error_context("validating access token")?;
/// ```
pub trait ErrorLogExt<T, E> {
    fn log_error_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, Some(context));
        }
        self
    }
}
