// ── Runtime client configuration ──
//
// Describes how to reach one monitoring server and where to keep the
// cache. Carries credentials and tuning but never reads files itself;
// prtgly-config builds one of these from a profile.

use std::path::PathBuf;

use prtgly_api::{ApiEndpoint, Credentials, DEFAULT_MAX_PAGES, Format, RetryPolicy, TlsMode};
use url::Url;

/// What to do when the cache cannot be read or written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheFallback {
    /// Surface `CacheUnavailable` to the caller.
    #[default]
    Fail,
    /// Log a warning and go to the network without the cache.
    Bypass,
}

/// Configuration for a single server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g. `https://prtg.example.com`).
    pub url: Url,
    pub credentials: Credentials,
    pub tls: TlsMode,
    /// Wire format for table and status queries.
    pub format: Format,
    /// Objects requested per page.
    pub page_size: u64,
    /// Per-page timeout and retries.
    pub retry: RetryPolicy,
    pub max_pages: u32,
    /// SQLite file backing the cache.
    pub cache_path: PathBuf,
    pub cache_fallback: CacheFallback,
}

impl ClientConfig {
    /// Defaults for everything except where the server is and who we are.
    pub fn new(url: Url, credentials: Credentials, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url,
            credentials,
            tls: TlsMode::default(),
            format: Format::Xml,
            page_size: prtgly_api::query::DEFAULT_PAGE_SIZE,
            retry: RetryPolicy::default(),
            max_pages: DEFAULT_MAX_PAGES,
            cache_path: cache_path.into(),
            cache_fallback: CacheFallback::default(),
        }
    }

    pub fn endpoint(&self) -> ApiEndpoint {
        ApiEndpoint::new(self.url.clone(), self.credentials.clone())
    }
}
