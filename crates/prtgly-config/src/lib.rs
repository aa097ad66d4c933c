//! Profile configuration for prtgly.
//!
//! TOML profiles merged with `PRTGLY_` environment variables, credential
//! resolution (env var, plaintext or pass hash) and translation to
//! `prtgly_core::ClientConfig`. Also owns the tracing subscriber setup
//! shared by anything embedding the client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

use prtgly_api::{RetryPolicy, TlsMode};
use prtgly_core::{CacheFallback, ClientConfig, Credentials, Format};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not install tracing subscriber: {0}")]
    Tracing(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    /// Values a profile inherits unless it overrides them.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    /// `xml` or `json`.
    pub format: String,
    pub page_size: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub max_pages: u32,
    /// `fail` or `bypass`.
    pub cache_fallback: String,
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            format: "xml".into(),
            page_size: prtgly_api::query::DEFAULT_PAGE_SIZE,
            timeout: retry.timeout.as_secs(),
            max_retries: retry.max_retries,
            max_pages: prtgly_api::DEFAULT_MAX_PAGES,
            cache_fallback: "fail".into(),
            insecure: false,
        }
    }
}

/// A named server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g. "https://prtg.example.com").
    pub url: String,

    pub username: String,

    /// Plaintext password. Prefer `password_env`.
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Pass hash, used instead of a password.
    pub passhash: Option<String>,

    pub format: Option<String>,
    pub page_size: Option<u64>,
    pub timeout: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_pages: Option<u32>,

    /// Cache file. Defaults to `<platform cache dir>/<profile>.db`.
    pub cache_path: Option<PathBuf>,
    pub cache_fallback: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
    pub insecure: Option<bool>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "prtgly", "prtgly")
}

fn home_fallback(kind: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(kind);
    p.push("prtgly");
    p
}

/// Config file path per platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding one cache file per profile.
pub fn cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Provider chain: built-in defaults, then `path`, then `PRTGLY_*` env
/// vars. Nested keys use a double underscore, e.g.
/// `PRTGLY_DEFAULTS__PAGE_SIZE=1000`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PRTGLY_").split("__"))
}

/// Load the config from the platform config file and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` and the environment. A missing file is
/// not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!(path = %path.display(), exists = path.exists(), "loading config");
    Ok(figment(path).extract()?)
}

/// Write `cfg` as TOML to `path`, creating parent directories.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

impl Config {
    /// `name`, or the default profile when `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Resolve a profile and build its client configuration.
    pub fn client_config(&self, name: Option<&str>) -> Result<ClientConfig, ConfigError> {
        let (name, profile) = self.profile(name)?;
        profile.to_client_config(name, &self.defaults)
    }
}

// ── Credential resolution ───────────────────────────────────────────

impl Profile {
    /// Credentials in order: `password_env`, plaintext `password`,
    /// `passhash`.
    pub fn credentials(&self, profile_name: &str) -> Result<Credentials, ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::NoCredentials {
                profile: profile_name.into(),
            });
        }

        if let Some(password) = self.password_env.as_deref().and_then(|v| std::env::var(v).ok()) {
            return Ok(Credentials::password(&self.username, password));
        }
        if let Some(password) = &self.password {
            return Ok(Credentials::password(&self.username, password));
        }
        if let Some(hash) = &self.passhash {
            return Ok(Credentials::pass_hash(&self.username, hash));
        }

        Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
    }

    /// Validate this profile and build a `ClientConfig`, filling unset
    /// values from `defaults`.
    pub fn to_client_config(
        &self,
        profile_name: &str,
        defaults: &Defaults,
    ) -> Result<ClientConfig, ConfigError> {
        let url: Url = self
            .url
            .parse()
            .map_err(|_| invalid("url", format!("invalid URL: {}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("url", format!("unsupported scheme '{}'", url.scheme())));
        }

        let credentials = self.credentials(profile_name)?;
        let cache_path = self
            .cache_path
            .clone()
            .unwrap_or_else(|| cache_dir().join(format!("{profile_name}.db")));

        let mut config = ClientConfig::new(url, credentials, cache_path);
        config.format = parse_format(self.format.as_deref().unwrap_or(&defaults.format))?;
        config.cache_fallback =
            parse_fallback(self.cache_fallback.as_deref().unwrap_or(&defaults.cache_fallback))?;

        config.page_size = self.page_size.unwrap_or(defaults.page_size);
        if config.page_size == 0 {
            return Err(invalid("page_size", "must be at least 1"));
        }
        config.max_pages = self.max_pages.unwrap_or(defaults.max_pages);
        if config.max_pages == 0 {
            return Err(invalid("max_pages", "must be at least 1"));
        }

        let timeout = self.timeout.unwrap_or(defaults.timeout);
        if timeout == 0 {
            return Err(invalid("timeout", "must be at least 1 second"));
        }
        config.retry = RetryPolicy {
            timeout: Duration::from_secs(timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            ..RetryPolicy::default()
        };

        config.tls = if self.insecure.unwrap_or(defaults.insecure) {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ca) = &self.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };

        Ok(config)
    }
}

fn parse_format(value: &str) -> Result<Format, ConfigError> {
    match value.parse::<Format>() {
        Ok(format @ (Format::Xml | Format::Json)) => Ok(format),
        _ => Err(invalid("format", format!("expected 'xml' or 'json', got '{value}'"))),
    }
}

fn parse_fallback(value: &str) -> Result<CacheFallback, ConfigError> {
    match value {
        "fail" => Ok(CacheFallback::Fail),
        "bypass" => Ok(CacheFallback::Bypass),
        other => Err(invalid(
            "cache_fallback",
            format!("expected 'fail' or 'bypass', got '{other}'"),
        )),
    }
}

// ── Tracing ─────────────────────────────────────────────────────────

/// Install a global fmt subscriber. `RUST_LOG` wins over `verbosity`
/// (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn init_tracing(verbosity: u8, json: bool) -> Result<(), ConfigError> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ConfigError::Tracing(e.to_string()))
}
