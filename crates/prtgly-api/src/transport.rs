// HTTP transport boundary.
//
// `Connection` only composes URLs and consumes bytes; the wire itself sits
// behind the `Transport` trait. `HttpTransport` is the reqwest-backed
// implementation, configured through `TransportConfig`.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::error::Error;

/// Sends one request and returns the raw response body.
pub trait Transport: Send + Sync {
    fn send(&self, url: Url, method: Method) -> impl Future<Output = Result<Bytes, Error>> + Send;
}

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed servers).
    DangerAcceptInvalid,
}

/// Settings for building the underlying `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Connect timeout. Whole-request timeouts are applied per page by
    /// `Connection`.
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("prtgly/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
        })
    }

    /// Wrap an already-configured client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: Url, method: Method) -> impl Future<Output = Result<Bytes, Error>> + Send {
        async move {
            // Request URLs carry credentials; strip them from reqwest errors.
            let resp = self
                .http
                .request(method, url)
                .send()
                .await
                .map_err(|e| Error::Transport(e.without_url()))?;

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Authentication {
                    message: auth_message(&body),
                });
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Http {
                    status: status.as_u16(),
                    body,
                });
            }

            resp.bytes()
                .await
                .map_err(|e| Error::Transport(e.without_url()))
        }
    }
}

/// Pull the `<error>` text out of a PRTG error document, if there is one.
fn auth_message(body: &str) -> String {
    let text = body
        .split_once("<error>")
        .and_then(|(_, rest)| rest.split_once("</error>"))
        .map_or(body, |(msg, _)| msg)
        .trim();
    if text.is_empty() {
        "credentials rejected".to_owned()
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_message_extracts_error_element() {
        let body = "<?xml version=\"1.0\"?><prtg><error>Unauthorized</error></prtg>";
        assert_eq!(auth_message(body), "Unauthorized");
    }

    #[test]
    fn auth_message_defaults_on_empty_body() {
        assert_eq!(auth_message("  "), "credentials rejected");
    }

    #[test]
    fn default_config_uses_system_roots() {
        let config = TransportConfig::default();
        assert!(matches!(config.tls, TlsMode::System));
        assert!(config.user_agent.starts_with("prtgly/"));
    }
}
