// ── Core error types ──
//
// Errors surfaced by the client layer. API errors are carried across
// one-to-one so callers can still tell a decode failure from a timeout;
// cache and validation failures are added on top.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Query errors ─────────────────────────────────────────────────
    #[error("Invalid API target: {0}")]
    InvalidTarget(String),

    #[error("Missing parameter '{parameter}' for target {target}")]
    MissingParameter {
        target: &'static str,
        parameter: &'static str,
    },

    // ── Transport errors ─────────────────────────────────────────────
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Server returned HTTP {status}")]
    Http { status: u16, body: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {attempts} attempt(s) of {timeout:?} each")]
    TransportTimeout { attempts: u32, timeout: Duration },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Could not decode response: {message}")]
    Decode { message: String, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Object not found: {bucket} with id {id}")]
    NotFound { bucket: String, id: i64 },

    // ── Cache errors ─────────────────────────────────────────────────
    #[error("Cache at {} unavailable: {reason}", path.display())]
    CacheUnavailable { path: PathBuf, reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<prtgly_api::Error> for CoreError {
    fn from(err: prtgly_api::Error) -> Self {
        match err {
            prtgly_api::Error::InvalidTarget(name) => CoreError::InvalidTarget(name),
            prtgly_api::Error::MissingParameter { target, parameter } => {
                CoreError::MissingParameter { target, parameter }
            }
            prtgly_api::Error::Transport(e) => CoreError::Transport(e),
            prtgly_api::Error::Http { status, body } => CoreError::Http { status, body },
            prtgly_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            prtgly_api::Error::TransportTimeout { attempts, timeout } => {
                CoreError::TransportTimeout { attempts, timeout }
            }
            prtgly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            prtgly_api::Error::Tls(message) => CoreError::Config {
                message: format!("TLS setup failed: {message}"),
            },
            prtgly_api::Error::Decode { message, body } => CoreError::Decode { message, body },
            prtgly_api::Error::Protocol(message) => CoreError::Protocol(message),
        }
    }
}

impl CoreError {
    pub(crate) fn cache(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CoreError::CacheUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_keep_their_payload() {
        let err: CoreError = prtgly_api::Error::Decode {
            message: "bad".into(),
            body: "<<<".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Decode { ref body, .. } if body == "<<<"));

        let err: CoreError = prtgly_api::Error::TransportTimeout {
            attempts: 4,
            timeout: Duration::from_secs(2),
        }
        .into();
        assert!(matches!(err, CoreError::TransportTimeout { attempts: 4, .. }));
    }

    #[test]
    fn cache_error_names_the_path() {
        let err = CoreError::cache("/tmp/prtgly.db", "file is not a database");
        assert_eq!(
            err.to_string(),
            "Cache at /tmp/prtgly.db unavailable: file is not a database"
        );
    }
}
