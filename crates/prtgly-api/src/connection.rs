// ── Query execution ──
//
// Drives a `Query` against the server: renders the URL for the current
// cursor, sends it through the transport with a per-page timeout and
// retries, decodes the body and advances the cursor until the query is
// finished.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::decoder::{self, Page};
use crate::endpoint::ApiEndpoint;
use crate::error::Error;
use crate::query::Query;
use crate::transport::{HttpTransport, Transport, TransportConfig};

/// Consecutive empty pages tolerated while the server still reports more.
pub const MAX_STALLED_PAGES: u32 = 3;

/// Upper bound on pages fetched for one query.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Per-page timeout and retry behaviour.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Applied to every single request attempt.
    pub timeout: Duration,
    /// Retries after the first attempt; `0` means try once.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Executes queries against one endpoint.
#[derive(Debug, Clone)]
pub struct Connection<T: Transport = HttpTransport> {
    transport: T,
    endpoint: ApiEndpoint,
    retry: RetryPolicy,
    max_pages: u32,
}

impl Connection<HttpTransport> {
    /// Connection over a reqwest client built from `transport`.
    pub fn new(endpoint: ApiEndpoint, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_transport(HttpTransport::new(transport)?, endpoint))
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(transport: T, endpoint: ApiEndpoint) -> Self {
        Self {
            transport,
            endpoint,
            retry: RetryPolicy::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `query` to completion, appending every decoded object to its
    /// response.
    ///
    /// Non-paginating targets make exactly one request. Table queries loop
    /// until the cursor reports the last page. On error, pages already
    /// appended stay in the query.
    pub async fn execute(&self, query: &mut Query) -> Result<(), Error> {
        if query.is_finished() {
            return Ok(());
        }

        if !query.target().paginates() {
            let page = self.fetch_page(query).await?;
            query.extend_response(page.objects);
            query.finish();
            return Ok(());
        }

        let mut pages = 0_u32;
        let mut stalled = 0_u32;

        while !query.is_finished() {
            if pages >= self.max_pages {
                return Err(Error::Protocol(format!(
                    "{query}: gave up after {pages} pages without reaching the end"
                )));
            }
            pages += 1;

            let page = self.fetch_page(query).await?;
            let received = page.objects.len();
            query.extend_response(page.objects);
            query.advance(&page.signal, received);

            if query.is_finished() {
                break;
            }
            if received == 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_PAGES {
                    return Err(Error::Protocol(format!(
                        "{query}: {stalled} consecutive empty pages while the server reports {} of {:?}",
                        query.accumulated(),
                        query.total(),
                    )));
                }
            } else {
                stalled = 0;
            }
        }

        debug!(
            query = %query,
            objects = query.accumulated(),
            pages,
            "query complete"
        );
        Ok(())
    }

    async fn fetch_page(&self, query: &Query) -> Result<Page, Error> {
        debug!(
            query = %query,
            offset = query.cursor().offset,
            count = query.cursor().page_size,
            "fetching page"
        );
        let url = query.url(&self.endpoint)?;
        let body = self.send_with_retry(url, query).await?;
        decoder::decode(
            &body,
            query.format(),
            query.target().shape(),
            query.bucket(),
        )
    }

    async fn send_with_retry(&self, url: Url, query: &Query) -> Result<Bytes, Error> {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let outcome =
                tokio::time::timeout(self.retry.timeout, self.transport.send(url.clone(), Method::GET))
                    .await;

            let err = match outcome {
                Ok(Ok(body)) => return Ok(body),
                Ok(Err(e)) if e.is_transient() => e,
                Ok(Err(e)) => return Err(e),
                Err(_) => Error::TransportTimeout {
                    attempts: attempt,
                    timeout: self.retry.timeout,
                },
            };

            if attempt > self.retry.max_retries {
                return Err(err);
            }

            let delay = calculate_backoff(attempt - 1, &self.retry);
            warn!(
                query = %query,
                attempt,
                error = %err,
                delay_ms = delay.as_millis(),
                "page request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Exponential backoff with a deterministic jitter seeded from the attempt.
#[allow(clippy::as_conversions, clippy::cast_possible_wrap)]
fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let base = policy.initial_backoff.as_secs_f64() * 2.0_f64.powi(attempt.min(30) as i32);
    let capped = base.min(policy.max_backoff.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn backoff_increases_exponentially() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            ..RetryPolicy::default()
        };
        let d0 = calculate_backoff(0, &policy);
        let d3 = calculate_backoff(3, &policy);
        assert!(d3 > d0, "backoff should grow: {d0:?} then {d3:?}");
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        let d = calculate_backoff(20, &policy);
        // Jitter may push up to 25% past the cap.
        assert!(d <= Duration::from_secs_f64(5.0 * 1.25));
    }
}
