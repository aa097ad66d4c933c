// Server endpoint and credentials
//
// Every API URL starts with the same base and the same credential pair.
// Credentials are held as secrets and only exposed when a URL is rendered.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// How requests authenticate. Both forms travel as query parameters.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// `username=…&password=…`
    Password {
        username: String,
        password: SecretString,
    },
    /// `username=…&passhash=…` (obtained once via `getpasshash`).
    PassHash {
        username: String,
        passhash: SecretString,
    },
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn pass_hash(username: impl Into<String>, passhash: impl Into<String>) -> Self {
        Self::PassHash {
            username: username.into(),
            passhash: SecretString::from(passhash.into()),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::PassHash { username, .. } => username,
        }
    }

    /// Query parameters in render order: username first, then the secret.
    pub(crate) fn query_pairs(&self) -> [(&'static str, &str); 2] {
        match self {
            Self::Password { username, password } => {
                [("username", username), ("password", password.expose_secret())]
            }
            Self::PassHash { username, passhash } => {
                [("username", username), ("passhash", passhash.expose_secret())]
            }
        }
    }
}

/// Base URL of a monitoring server plus the credentials used against it.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    base_url: Url,
    credentials: Credentials,
}

impl ApiEndpoint {
    /// The base URL may carry a path prefix (`https://host/prtg`); a
    /// trailing slash is added so `api/…` joins beneath it.
    pub fn new(mut base_url: Url, credentials: Credentials) -> Self {
        let path = base_url.path().trim_end_matches('/').to_owned();
        base_url.set_path(&format!("{path}/"));
        Self {
            base_url,
            credentials,
        }
    }

    pub fn parse(base_url: &str, credentials: Credentials) -> Result<Self, Error> {
        Ok(Self::new(Url::parse(base_url)?, credentials))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `{base}/api/{file}` without any query string.
    pub(crate) fn api_url(&self, file: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("api/{file}"))?)
    }
}
