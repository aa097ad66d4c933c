//! Cached client layer on top of `prtgly-api`.
//!
//! - **[`Client`]** answers table and status queries from the cache when
//!   the bucket has been written, fetches from the server on a miss, and
//!   offers [`refresh`](Client::refresh), local [`update`](Client::update)s,
//!   explicit remote writes and filtered [`content`](Client::content) views.
//!
//! - **[`Cache`]** is the SQLite-backed object store, partitioned by
//!   [`Bucket`]. It opens lazily and serialises writers per bucket.
//!
//! - **[`ClientConfig`]** describes one server. It is built by the caller
//!   (or by `prtgly-config`); this crate never reads config files.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::Cache;
pub use client::{Client, UpdateMode};
pub use config::{CacheFallback, ClientConfig};
pub use error::CoreError;
pub use filter::{Attribute, Filter};

pub use prtgly_api::{Bucket, Credentials, Format, ObjectKind, PrtgObject, Query};
