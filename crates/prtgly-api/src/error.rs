use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `prtgly-api` crate.
///
/// Covers every failure mode between building a query and handing back
/// decoded objects: query construction, transport, decoding, and pagination.
/// `prtgly-core` maps these into its own error type without losing payloads.
#[derive(Debug, Error)]
pub enum Error {
    // ── Query construction ──────────────────────────────────────────
    /// The operation name is not one of the supported API targets.
    #[error("Invalid API target: {0}")]
    InvalidTarget(String),

    /// A mutating or property target was built without a required parameter.
    #[error("Missing parameter '{parameter}' for target {target}")]
    MissingParameter {
        target: &'static str,
        parameter: &'static str,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from the server. Not retried.
    #[error("Server returned HTTP {status}")]
    Http { status: u16, body: String },

    /// Credentials rejected by the server.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The last attempt for one page hit the per-request timeout.
    #[error("Request timed out after {attempts} attempt(s) of {timeout:?} each")]
    TransportTimeout { attempts: u32, timeout: Duration },

    /// TLS or HTTP client setup failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// Response body could not be decoded, with the raw body for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },

    /// The server violated the pagination contract (e.g. a cursor that
    /// never advances).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Only network-level failures qualify. Decode, protocol, and
    /// parameter errors are surfaced unmodified.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::TransportTimeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build a decode error that keeps the raw payload.
    pub(crate) fn decode(message: impl Into<String>, body: &str) -> Self {
        Self::Decode {
            message: message.into(),
            body: body.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        let server = Error::Http {
            status: 503,
            body: String::new(),
        };
        let client = Error::Http {
            status: 400,
            body: "<prtg><error>bad</error></prtg>".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn decode_and_protocol_errors_are_never_transient() {
        assert!(!Error::decode("garbage", "<<<").is_transient());
        assert!(!Error::Protocol("stalled".into()).is_transient());
        assert!(!Error::InvalidTarget("nope".into()).is_transient());
    }
}
