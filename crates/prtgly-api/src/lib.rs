// prtgly-api: Async Rust client for the PRTG HTTP API (queries, pagination, decoding)

pub mod connection;
pub mod decoder;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod query;
pub mod transport;

pub use connection::{Connection, DEFAULT_MAX_PAGES, MAX_STALLED_PAGES, RetryPolicy};
pub use decoder::{Page, decode};
pub use endpoint::{ApiEndpoint, Credentials};
pub use error::Error;
pub use model::{Bucket, FieldMap, FieldValue, ObjectDetails, ObjectKind, PrtgObject};
pub use query::{Cursor, Format, PageSignal, Query, QueryBuilder, ResponseShape, Target};
pub use transport::{HttpTransport, TlsMode, Transport, TransportConfig};

pub use reqwest::Method;
