// ── Query and pagination cursor ──
//
// A `Query` describes one logical API request. Its cursor and `finished`
// flag move in place while a connection drives it through pages; the
// decoded objects accumulate in `response`.

use std::fmt;

use indexmap::IndexMap;
use strum::{AsRefStr, Display, EnumString};
use url::Url;

use crate::endpoint::ApiEndpoint;
use crate::error::Error;
use crate::model::{Bucket, PrtgObject};

/// Objects requested per page unless overridden.
pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// Columns every table query asks for.
pub const DEFAULT_COLUMNS: &[&str] = &[
    "objid", "parentid", "name", "tags", "active", "status", "type",
];

// ── Target ──────────────────────────────────────────────────────────

/// Supported API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum Target {
    #[strum(serialize = "table")]
    Table,
    #[strum(serialize = "getstatus")]
    Status,
    #[strum(serialize = "getobjectproperty")]
    GetObjectProperty,
    #[strum(serialize = "setobjectproperty")]
    SetObjectProperty,
    #[strum(serialize = "getpasshash")]
    GetPassHash,
}

/// What a target's response body looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A page of items plus a pagination signal.
    List,
    /// A single record.
    Scalar,
    /// No payload worth decoding.
    Acknowledge,
}

impl Target {
    /// Parse an operation name, e.g. `"table"` or `"getstatus"`.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        name.parse()
            .map_err(|_| Error::InvalidTarget(name.to_owned()))
    }

    /// URL path segment under `/api/`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Status => "getstatus",
            Self::GetObjectProperty => "getobjectproperty",
            Self::SetObjectProperty => "setobjectproperty",
            Self::GetPassHash => "getpasshash",
        }
    }

    pub fn shape(self) -> ResponseShape {
        match self {
            Self::Table => ResponseShape::List,
            Self::Status | Self::GetObjectProperty | Self::GetPassHash => ResponseShape::Scalar,
            Self::SetObjectProperty => ResponseShape::Acknowledge,
        }
    }

    pub fn paginates(self) -> bool {
        matches!(self, Self::Table)
    }

    /// The format actually sent on the wire. Only table and status let the
    /// caller choose; property reads answer in XML, the rest in plain text.
    pub fn wire_format(self, requested: Format) -> Format {
        match self {
            Self::Table | Self::Status => match requested {
                Format::Text => Format::Xml,
                other => other,
            },
            Self::GetObjectProperty => Format::Xml,
            Self::SetObjectProperty | Self::GetPassHash => Format::Text,
        }
    }

    /// File extension for the URL path.
    pub fn extension(self, requested: Format) -> &'static str {
        match self {
            Self::Table | Self::Status => self.wire_format(requested).extension(),
            Self::GetObjectProperty | Self::SetObjectProperty | Self::GetPassHash => "htm",
        }
    }
}

// ── Format ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    #[default]
    Xml,
    Json,
    Text,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Text => "htm",
        }
    }
}

// ── Cursor ──────────────────────────────────────────────────────────

/// Position of the next page: `start` and `count` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub offset: u64,
    pub page_size: u64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            offset: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Pagination information decoded from one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignal {
    /// Total number of objects the server holds for this query.
    pub total: Option<u64>,
    /// Explicit "this was the last page" marker.
    pub list_end: Option<bool>,
}

impl PageSignal {
    /// A signal that ends pagination.
    pub fn complete() -> Self {
        Self {
            total: None,
            list_end: Some(true),
        }
    }

    pub fn with_total(total: u64) -> Self {
        Self {
            total: Some(total),
            list_end: None,
        }
    }

    /// Whether more objects remain after `accumulated` have been received.
    /// `None` when the server gave no indication either way.
    pub fn more_remaining(&self, accumulated: u64) -> Option<bool> {
        if self.list_end == Some(true) {
            return Some(false);
        }
        if let Some(total) = self.total {
            return Some(accumulated < total);
        }
        self.list_end.map(|end| !end)
    }
}

// ── Query ───────────────────────────────────────────────────────────

/// One logical API request and its accumulated result.
#[derive(Debug, Clone)]
pub struct Query {
    target: Target,
    bucket: Option<Bucket>,
    format: Format,
    cursor: Cursor,
    finished: bool,
    total: Option<u64>,
    extra: IndexMap<String, String>,
    response: Vec<PrtgObject>,
}

impl Query {
    pub fn builder(target: Target) -> QueryBuilder {
        QueryBuilder::new(target)
    }

    /// Table listing for `bucket` with the default columns.
    pub fn table(bucket: Bucket) -> QueryBuilder {
        QueryBuilder::new(Target::Table).bucket(bucket)
    }

    pub fn status() -> QueryBuilder {
        QueryBuilder::new(Target::Status)
    }

    pub fn get_object_property(id: i64, name: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(Target::GetObjectProperty)
            .object_id(id)
            .property(name)
    }

    pub fn set_object_property(
        id: i64,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> QueryBuilder {
        QueryBuilder::new(Target::SetObjectProperty)
            .object_id(id)
            .property(name)
            .value(value)
    }

    pub fn pass_hash() -> QueryBuilder {
        QueryBuilder::new(Target::GetPassHash)
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn bucket(&self) -> Option<Bucket> {
        self.bucket
    }

    /// Format requested on the wire.
    pub fn format(&self) -> Format {
        self.target.wire_format(self.format)
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Total reported by the server, once known.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn extra(&self) -> &IndexMap<String, String> {
        &self.extra
    }

    /// Whether any `filter_*` parameter narrows the result server-side.
    pub fn has_filters(&self) -> bool {
        self.extra
            .iter()
            .any(|(k, v)| k.starts_with("filter_") && !v.is_empty())
    }

    pub fn response(&self) -> &[PrtgObject] {
        &self.response
    }

    pub fn into_response(self) -> Vec<PrtgObject> {
        self.response
    }

    /// Number of objects received so far.
    pub fn accumulated(&self) -> u64 {
        u64::try_from(self.response.len()).unwrap_or(u64::MAX)
    }

    /// Append a decoded page to the response.
    pub fn extend_response(&mut self, objects: Vec<PrtgObject>) {
        self.response.extend(objects);
    }

    /// Replace the response wholesale and mark the query complete.
    /// Used when the result comes from somewhere other than the server.
    pub fn complete_with(&mut self, objects: Vec<PrtgObject>) {
        self.total = Some(u64::try_from(objects.len()).unwrap_or(u64::MAX));
        self.response = objects;
        self.finished = true;
    }

    /// Render the request URL for `endpoint`.
    ///
    /// Order is fixed: credentials, then `start`/`count` when the target
    /// paginates, then extras in insertion order with empty values left out.
    pub fn url(&self, endpoint: &ApiEndpoint) -> Result<Url, Error> {
        let file = format!(
            "{}.{}",
            self.target.path(),
            self.target.extension(self.format)
        );
        let mut url = endpoint.api_url(&file)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in endpoint.credentials().query_pairs() {
                pairs.append_pair(key, value);
            }
            if self.target.paginates() {
                pairs.append_pair("start", &self.cursor.offset.to_string());
                pairs.append_pair("count", &self.cursor.page_size.to_string());
            }
            for (key, value) in &self.extra {
                if !value.is_empty() {
                    pairs.append_pair(key, value);
                }
            }
        }
        Ok(url)
    }

    /// Prepare the cursor for the next page given the server's total.
    ///
    /// `offset` moves to the number of objects received and the next page
    /// shrinks so it never asks past `total_known`. Once everything has
    /// arrived the query is finished and later calls do nothing.
    pub fn increment(&mut self, total_known: u64) {
        if self.finished {
            return;
        }
        let accumulated = self.accumulated();
        self.total = Some(total_known);
        if accumulated >= total_known {
            self.finished = true;
            return;
        }
        self.cursor.offset = accumulated;
        self.cursor.page_size = self.cursor.page_size.min(total_known - accumulated);
    }

    /// Apply the pagination signal of the page just appended. `received` is
    /// the number of objects on that page.
    pub fn advance(&mut self, signal: &PageSignal, received: usize) {
        if self.finished {
            return;
        }
        if signal.list_end == Some(true) {
            let accumulated = self.accumulated();
            self.increment(accumulated);
        } else if let Some(total) = signal.total {
            self.increment(total);
        } else if signal.list_end.is_none() && received == 0 {
            // No signal at all and nothing new: the listing is exhausted.
            let accumulated = self.accumulated();
            self.increment(accumulated);
        } else {
            self.cursor.offset = self.accumulated();
        }
    }

    /// Mark a non-paginating query as complete.
    pub fn finish(&mut self) {
        self.finished = true;
    }
}

/// Log-safe summary; never includes credentials.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if let Some(bucket) = self.bucket {
            write!(f, "({bucket})")?;
        }
        if self.target.paginates() {
            write!(
                f,
                " start={} count={}",
                self.cursor.offset, self.cursor.page_size
            )?;
        }
        Ok(())
    }
}

// ── Builder ─────────────────────────────────────────────────────────

/// Builder for [`Query`]. Parameters are validated in [`QueryBuilder::build`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    target: Target,
    bucket: Option<Bucket>,
    format: Format,
    page_size: u64,
    object_id: Option<i64>,
    property: Option<String>,
    value: Option<String>,
    schema_columns: bool,
    columns: Vec<String>,
    extra: IndexMap<String, String>,
}

impl QueryBuilder {
    fn new(target: Target) -> Self {
        Self {
            target,
            bucket: None,
            format: Format::default(),
            page_size: DEFAULT_PAGE_SIZE,
            object_id: None,
            property: None,
            value: None,
            schema_columns: false,
            columns: Vec::new(),
            extra: IndexMap::new(),
        }
    }

    pub fn bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Objects per page. Zero is bumped to one.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn object_id(mut self, id: i64) -> Self {
        self.object_id = Some(id);
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property = Some(name.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Server-side filter: renders as `filter_{key}={value}`.
    pub fn filter(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra.insert(format!("filter_{key}"), value.into());
        self
    }

    /// Request every column the bucket's schema knows, not just the defaults.
    pub fn with_schema_columns(mut self) -> Self {
        self.schema_columns = true;
        self
    }

    /// Request an additional column.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Free-form extra parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Query, Error> {
        let target = self.target;
        let mut extra = IndexMap::new();

        match target {
            Target::Table => {
                let bucket = self.bucket.ok_or(Error::MissingParameter {
                    target: target.path(),
                    parameter: "content",
                })?;
                extra.insert("content".to_owned(), bucket.to_string());
                extra.insert(
                    "columns".to_owned(),
                    columns_for(bucket, self.schema_columns, &self.columns),
                );
            }
            Target::Status => {}
            Target::GetObjectProperty | Target::SetObjectProperty => {
                let id = self.object_id.ok_or(Error::MissingParameter {
                    target: target.path(),
                    parameter: "id",
                })?;
                let name = self
                    .property
                    .filter(|n| !n.is_empty())
                    .ok_or(Error::MissingParameter {
                        target: target.path(),
                        parameter: "name",
                    })?;
                extra.insert("id".to_owned(), id.to_string());
                extra.insert("name".to_owned(), name);
                if target == Target::SetObjectProperty {
                    let value = self.value.ok_or(Error::MissingParameter {
                        target: target.path(),
                        parameter: "value",
                    })?;
                    extra.insert("value".to_owned(), value);
                } else {
                    extra.insert("show".to_owned(), "text".to_owned());
                }
            }
            Target::GetPassHash => {}
        }

        for (key, value) in self.extra {
            extra.insert(key, value);
        }

        let bucket = match target {
            Target::Status => Some(Bucket::Status),
            _ => self.bucket,
        };

        Ok(Query {
            target,
            bucket,
            format: self.format,
            cursor: Cursor {
                offset: 0,
                page_size: self.page_size,
            },
            finished: false,
            total: None,
            extra,
            response: Vec::new(),
        })
    }
}

fn columns_for(bucket: Bucket, schema_columns: bool, additional: &[String]) -> String {
    let mut columns: Vec<&str> = DEFAULT_COLUMNS.to_vec();
    if schema_columns {
        for spec in bucket.schema() {
            if !columns.contains(&spec.name) {
                columns.push(spec.name);
            }
        }
    }
    for name in additional {
        if !columns.contains(&name.as_str()) {
            columns.push(name);
        }
    }
    columns.join(",")
}
