// ── Client ──
//
// Public entry point. Composes query construction, connection execution
// and the object cache into the operations callers use: cached listings,
// forced refreshes, local updates, explicit remote writes and filtered
// content views.

use std::collections::{HashMap, HashSet};

use prtgly_api::model::{FieldKind, split_tags};
use prtgly_api::{
    Bucket, Connection, FieldValue, HttpTransport, PrtgObject, Query, Target, Transport,
    TransportConfig,
};
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::{CacheFallback, ClientConfig};
use crate::error::CoreError;
use crate::filter::{Attribute, Filter};

/// How `update` combines the new value with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Add to a list attribute, skipping values already present.
    Append,
    /// Replace the attribute's value.
    Replace,
}

/// Cached client for one server.
#[derive(Debug, Clone)]
pub struct Client<T: Transport = HttpTransport> {
    config: ClientConfig,
    connection: Connection<T>,
    cache: Cache,
}

impl Client<HttpTransport> {
    /// Client over reqwest, using the TLS mode from `config`.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            ..TransportConfig::default()
        };
        let transport = HttpTransport::new(&transport)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let connection = Connection::with_transport(transport, config.endpoint())
            .with_retry(config.retry.clone())
            .with_max_pages(config.max_pages);
        let cache = Cache::new(config.cache_path.clone());
        Self {
            config,
            connection,
            cache,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    // ── Query execution ──────────────────────────────────────────────

    /// Run `query`, answering from the cache when possible.
    ///
    /// Unfiltered table and status queries are served from their bucket
    /// once it has been written. On a miss the query goes to the server
    /// and the result is stored without clobbering existing entries.
    /// Anything else always goes to the server.
    pub async fn query(&self, query: &mut Query) -> Result<(), CoreError> {
        if query.is_finished() {
            return Ok(());
        }

        let Some(bucket) = cacheable_bucket(query) else {
            self.connection.execute(query).await?;
            return Ok(());
        };

        match self.cached(bucket) {
            Ok(Some(objects)) => {
                debug!(%bucket, objects = objects.len(), "served from cache");
                query.complete_with(objects);
                return Ok(());
            }
            Ok(None) => debug!(%bucket, "cache miss"),
            Err(e) => self.cache_failed(e)?,
        }

        self.connection.execute(query).await?;

        if let Err(e) = self.cache.write(bucket, query.response(), false) {
            self.cache_failed(e)?;
        }
        Ok(())
    }

    /// Fetch `bucket` from the server, ignoring the cache, and replace the
    /// cached bucket with the result.
    pub async fn refresh(&self, bucket: Bucket) -> Result<Vec<PrtgObject>, CoreError> {
        let mut query = self.listing(bucket)?;
        self.connection.execute(&mut query).await?;
        let objects = query.into_response();

        if let Err(e) = self.cache.write(bucket, &objects, true) {
            self.cache_failed(e)?;
        }
        info!(%bucket, objects = objects.len(), "bucket refreshed");
        Ok(objects)
    }

    // ── Convenience ──────────────────────────────────────────────────

    /// Every object in `bucket`, cached.
    pub async fn table(&self, bucket: Bucket) -> Result<Vec<PrtgObject>, CoreError> {
        let mut query = self.listing(bucket)?;
        self.query(&mut query).await?;
        Ok(query.into_response())
    }

    /// One object from `bucket` by id, cached.
    pub async fn object(&self, bucket: Bucket, id: i64) -> Result<PrtgObject, CoreError> {
        self.table(bucket)
            .await?
            .into_iter()
            .find(|obj| obj.id == id)
            .ok_or_else(|| CoreError::NotFound {
                bucket: bucket.to_string(),
                id,
            })
    }

    /// Server status record, cached in the status bucket.
    pub async fn status(&self) -> Result<PrtgObject, CoreError> {
        self.table(Bucket::Status)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Protocol("status response held no record".into()))
    }

    /// Read one property of one object from the server.
    pub async fn get_object_property(&self, id: i64, name: &str) -> Result<String, CoreError> {
        let mut query = Query::get_object_property(id, name).build()?;
        self.query(&mut query).await?;
        single_result(&query, "getobjectproperty")
    }

    /// Write one property of one object on the server.
    pub async fn set_object_property(
        &self,
        id: i64,
        name: &str,
        value: &str,
    ) -> Result<(), CoreError> {
        let mut query = Query::set_object_property(id, name, value).build()?;
        self.query(&mut query).await?;
        info!(id, property = name, "property written");
        Ok(())
    }

    /// Pass hash for the configured user.
    pub async fn pass_hash(&self) -> Result<String, CoreError> {
        let mut query = Query::pass_hash().build()?;
        self.query(&mut query).await?;
        single_result(&query, "getpasshash")
    }

    // ── Local updates ────────────────────────────────────────────────

    /// Change `attribute` on every object in `objects` and persist them to
    /// the cache. The server is not contacted; see [`Client::push_attribute`].
    ///
    /// `Append` only applies to tags. The value is validated before any
    /// object is touched.
    pub fn update(
        &self,
        objects: &mut [PrtgObject],
        attribute: &Attribute,
        value: &str,
        mode: UpdateMode,
    ) -> Result<(), CoreError> {
        let change = Change::parse(attribute, value, mode)?;

        for obj in objects.iter() {
            change.check(obj)?;
        }

        let mut by_bucket: HashMap<Bucket, Vec<PrtgObject>> = HashMap::new();
        for obj in objects.iter_mut() {
            change.apply(obj);
            if let Some(bucket) = obj.content_type() {
                by_bucket.entry(bucket).or_default().push(obj.clone());
            }
        }

        for (bucket, changed) in by_bucket {
            if let Err(e) = self.cache.upsert(bucket, &changed) {
                self.cache_failed(e)?;
            }
        }
        debug!(attribute = attribute.name(), objects = objects.len(), "objects updated locally");
        Ok(())
    }

    /// Send the current value of `attribute` on `object` to the server.
    pub async fn push_attribute(
        &self,
        object: &PrtgObject,
        attribute: &Attribute,
    ) -> Result<(), CoreError> {
        let value = attribute.value_of(object).ok_or_else(|| {
            CoreError::validation(format!(
                "object {} has no value for '{}'",
                object.id,
                attribute.name()
            ))
        })?;
        self.set_object_property(object.id, attribute.name(), &value)
            .await
    }

    // ── Content views ────────────────────────────────────────────────

    /// Objects in `bucket` accepted by `filter`.
    ///
    /// With `resolve_parents` the result is instead the distinct parent
    /// devices of the matching objects, in first-seen order. Parents that
    /// are not in the devices bucket are skipped.
    pub async fn content(
        &self,
        bucket: Bucket,
        filter: Option<&Filter>,
        resolve_parents: bool,
    ) -> Result<Vec<PrtgObject>, CoreError> {
        let matched: Vec<PrtgObject> = self
            .table(bucket)
            .await?
            .into_iter()
            .filter(|obj| filter.is_none_or(|f| f.accepts(obj)))
            .collect();

        if !resolve_parents {
            return Ok(matched);
        }

        let mut devices: HashMap<i64, PrtgObject> = self
            .table(Bucket::Devices)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let mut seen = HashSet::new();
        let mut parents = Vec::new();
        for obj in &matched {
            let Some(parent_id) = obj.parent() else {
                continue;
            };
            if !seen.insert(parent_id) {
                continue;
            }
            match devices.remove(&parent_id) {
                Some(parent) => parents.push(parent),
                None => debug!(child = obj.id, parent = parent_id, "parent not cached, skipped"),
            }
        }
        Ok(parents)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn listing(&self, bucket: Bucket) -> Result<Query, CoreError> {
        let builder = match bucket {
            Bucket::Status => Query::status(),
            Bucket::Sensors | Bucket::Devices => {
                Query::table(bucket).page_size(self.config.page_size)
            }
        };
        Ok(builder.format(self.config.format).build()?)
    }

    fn cached(&self, bucket: Bucket) -> Result<Option<Vec<PrtgObject>>, CoreError> {
        if !self.cache.is_populated(bucket)? {
            return Ok(None);
        }
        self.cache.get_bucket(bucket).map(Some)
    }

    fn cache_failed(&self, err: CoreError) -> Result<(), CoreError> {
        match self.config.cache_fallback {
            CacheFallback::Fail => Err(err),
            CacheFallback::Bypass => {
                warn!(error = %err, "cache unavailable, continuing without it");
                Ok(())
            }
        }
    }
}

fn cacheable_bucket(query: &Query) -> Option<Bucket> {
    match query.target() {
        Target::Table | Target::Status if !query.has_filters() => query.bucket(),
        _ => None,
    }
}

fn single_result(query: &Query, target: &str) -> Result<String, CoreError> {
    query
        .response()
        .first()
        .and_then(PrtgObject::result)
        .map(str::to_owned)
        .ok_or_else(|| CoreError::Protocol(format!("{target} response held no result")))
}

/// A validated attribute change, ready to apply to objects.
enum Change<'a> {
    AppendTags(Vec<String>),
    ReplaceTags(Vec<String>),
    Name(&'a str),
    Status(&'a str),
    Active(bool),
    Field(&'a str, &'a str),
}

impl<'a> Change<'a> {
    fn parse(attribute: &'a Attribute, value: &'a str, mode: UpdateMode) -> Result<Self, CoreError> {
        if mode == UpdateMode::Append && *attribute != Attribute::Tags {
            return Err(CoreError::validation(format!(
                "append applies to tags only, not '{}'",
                attribute.name()
            )));
        }

        Ok(match attribute {
            Attribute::Tags if mode == UpdateMode::Append => Self::AppendTags(split_tags(value)),
            Attribute::Tags => Self::ReplaceTags(split_tags(value)),
            Attribute::Name => Self::Name(value),
            Attribute::Status => Self::Status(value),
            Attribute::Active => {
                match FieldValue::Text(value.to_owned()).coerce(FieldKind::Bool) {
                    Ok(Some(FieldValue::Bool(b))) => Self::Active(b),
                    _ => {
                        return Err(CoreError::validation(format!(
                            "'{value}' is not a valid value for active"
                        )));
                    }
                }
            }
            Attribute::Field(name) => Self::Field(name, value),
        })
    }

    /// Reject changes that cannot be applied to `obj`.
    fn check(&self, obj: &PrtgObject) -> Result<(), CoreError> {
        let Self::Field(name, _) = self else {
            return Ok(());
        };
        let typed = matches!(*name, "objid" | "parentid" | "type")
            || obj.kind.schema().iter().any(|spec| spec.name == *name);
        if typed {
            return Err(CoreError::validation(format!(
                "'{name}' is a typed {} field and cannot be set locally",
                obj.kind
            )));
        }
        Ok(())
    }

    fn apply(&self, obj: &mut PrtgObject) {
        match self {
            Self::AppendTags(tags) => {
                for tag in tags {
                    if !obj.has_tag(tag) {
                        obj.tags.push(tag.clone());
                    }
                }
            }
            Self::ReplaceTags(tags) => obj.tags.clone_from(tags),
            Self::Name(name) => (*name).clone_into(&mut obj.name),
            Self::Status(status) => (*status).clone_into(&mut obj.status),
            Self::Active(active) => obj.active = *active,
            Self::Field(name, value) => {
                obj.extra
                    .insert((*name).to_owned(), FieldValue::Text((*value).to_owned()));
            }
        }
    }
}
