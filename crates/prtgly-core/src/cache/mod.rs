// ── Durable object cache ──
//
// SQLite-backed store of decoded objects, partitioned by bucket. The
// database file is opened lazily: constructing a `Cache` never touches
// disk. Every call opens its own connection and closes it on return.
// Writers to the same bucket are serialised; readers never wait.

mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use prtgly_api::{Bucket, PrtgObject};
use rusqlite::{Connection, OptionalExtension, params};
use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::error::CoreError;

pub use schema::SCHEMA_VERSION;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the on-disk cache. Cheap to clone; clones share the same
/// writer locks.
#[derive(Debug, Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    path: PathBuf,
    migrated: Mutex<bool>,
    writers: HashMap<Bucket, Mutex<()>>,
}

impl Cache {
    /// A cache stored at `path`. Nothing is created until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                path: path.into(),
                migrated: Mutex::new(false),
                writers: Bucket::iter().map(|b| (b, Mutex::new(()))).collect(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// One object by id.
    pub fn get(&self, bucket: Bucket, id: i64) -> Result<Option<PrtgObject>, CoreError> {
        let conn = self.open()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM objects WHERE bucket = ?1 AND id = ?2",
                params![bucket.as_ref(), id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| self.fail(e))?;
        body.map(|b| self.decode_row(bucket, id, &b)).transpose()
    }

    /// Every object in `bucket`, in insertion order. Empty if the bucket
    /// was never written.
    pub fn get_bucket(&self, bucket: Bucket) -> Result<Vec<PrtgObject>, CoreError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT id, body FROM objects WHERE bucket = ?1 ORDER BY rowid")
            .map_err(|e| self.fail(e))?;
        let rows = stmt
            .query_map(params![bucket.as_ref()], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
            })
            .map_err(|e| self.fail(e))?;

        let mut objects = Vec::new();
        for row in rows {
            let (id, body) = row.map_err(|e| self.fail(e))?;
            objects.push(self.decode_row(bucket, id, &body)?);
        }
        Ok(objects)
    }

    /// Whether `bucket` has been written at least once (possibly with
    /// zero objects).
    pub fn is_populated(&self, bucket: Bucket) -> Result<bool, CoreError> {
        Ok(self.last_written(bucket)?.is_some())
    }

    /// Time of the last write to `bucket`.
    pub fn last_written(&self, bucket: Bucket) -> Result<Option<DateTime<Utc>>, CoreError> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT written_at FROM buckets WHERE bucket = ?1",
                params![bucket.as_ref()],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| self.fail(e))?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| self.fail(format!("bad timestamp for {bucket}: {e}")))
        })
        .transpose()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Persist `objects` under `bucket`.
    ///
    /// With `overwrite` the bucket is replaced by exactly `objects` in one
    /// transaction. Without it, ids already present keep their stored
    /// value. Either way the bucket counts as populated afterwards.
    /// Returns the number of rows written.
    pub fn write(
        &self,
        bucket: Bucket,
        objects: &[PrtgObject],
        overwrite: bool,
    ) -> Result<usize, CoreError> {
        let mode = if overwrite {
            WriteMode::Replace
        } else {
            WriteMode::NoClobber
        };
        let written = self.write_with(bucket, objects, mode)?;
        info!(%bucket, objects = objects.len(), written, overwrite, "cache write");
        Ok(written)
    }

    /// Overwrite each object by id, leaving the rest of the bucket alone.
    ///
    /// Does not mark an unpopulated bucket as populated: a handful of
    /// upserted objects is not a complete listing.
    pub fn upsert(&self, bucket: Bucket, objects: &[PrtgObject]) -> Result<usize, CoreError> {
        let written = self.write_with(bucket, objects, WriteMode::Upsert)?;
        info!(%bucket, written, "cache upsert");
        Ok(written)
    }

    /// Drop every object in `bucket` and forget it was ever written.
    pub fn clear(&self, bucket: Bucket) -> Result<(), CoreError> {
        let _guard = self.writer(bucket);
        let mut conn = self.open()?;
        let tx = conn.transaction().map_err(|e| self.fail(e))?;
        tx.execute("DELETE FROM objects WHERE bucket = ?1", params![bucket.as_ref()])
            .map_err(|e| self.fail(e))?;
        tx.execute("DELETE FROM buckets WHERE bucket = ?1", params![bucket.as_ref()])
            .map_err(|e| self.fail(e))?;
        tx.commit().map_err(|e| self.fail(e))?;
        info!(%bucket, "cache cleared");
        Ok(())
    }

    fn write_with(
        &self,
        bucket: Bucket,
        objects: &[PrtgObject],
        mode: WriteMode,
    ) -> Result<usize, CoreError> {
        if let Some(stray) = objects.iter().find(|o| o.content_type() != Some(bucket)) {
            return Err(CoreError::validation(format!(
                "object {} is a {} and does not belong in the {bucket} bucket",
                stray.id, stray.kind
            )));
        }

        let _guard = self.writer(bucket);
        let mut conn = self.open()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction().map_err(|e| self.fail(e))?;
        if mode == WriteMode::Replace {
            tx.execute("DELETE FROM objects WHERE bucket = ?1", params![bucket.as_ref()])
                .map_err(|e| self.fail(e))?;
        }

        let mut written = 0;
        {
            let mut stmt = tx.prepare(mode.insert_sql()).map_err(|e| self.fail(e))?;
            for obj in objects {
                let body = serde_json::to_string(obj).map_err(|e| self.fail(e))?;
                written += stmt
                    .execute(params![bucket.as_ref(), obj.id, body, now])
                    .map_err(|e| self.fail(e))?;
            }
        }

        let marker = match mode {
            WriteMode::Upsert => "UPDATE buckets SET written_at = ?2 WHERE bucket = ?1",
            WriteMode::NoClobber | WriteMode::Replace => {
                "INSERT INTO buckets (bucket, written_at) VALUES (?1, ?2)
                 ON CONFLICT (bucket) DO UPDATE SET written_at = excluded.written_at"
            }
        };
        tx.execute(marker, params![bucket.as_ref(), now])
            .map_err(|e| self.fail(e))?;
        tx.commit().map_err(|e| self.fail(e))?;
        Ok(written)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn writer(&self, bucket: Bucket) -> Option<MutexGuard<'_, ()>> {
        self.inner
            .writers
            .get(&bucket)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Open a connection, creating the file and schema on first use.
    fn open(&self) -> Result<Connection, CoreError> {
        let mut migrated = self
            .inner
            .migrated
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *migrated {
            drop(migrated);
            return self.connect();
        }

        let path = &self.inner.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.fail(e))?;
        }
        let conn = self.connect()?;
        schema::run_migrations(&conn).map_err(|e| self.fail(e))?;
        *migrated = true;
        debug!(path = %path.display(), "cache schema ready");
        Ok(conn)
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        let conn = Connection::open(&self.inner.path).map_err(|e| self.fail(e))?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| self.fail(e))?;
        conn.execute_batch(schema::CONNECTION_PRAGMAS)
            .map_err(|e| self.fail(e))?;
        Ok(conn)
    }

    fn decode_row(&self, bucket: Bucket, id: i64, body: &str) -> Result<PrtgObject, CoreError> {
        serde_json::from_str(body)
            .map_err(|e| self.fail(format!("undecodable row {bucket}/{id}: {e}")))
    }

    fn fail(&self, reason: impl ToString) -> CoreError {
        CoreError::cache(self.inner.path.clone(), reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Existing ids keep their stored value.
    NoClobber,
    /// The bucket ends up holding exactly the written objects.
    Replace,
    /// Existing ids are overwritten in place; the populated marker is
    /// only refreshed, never created.
    Upsert,
}

impl WriteMode {
    fn insert_sql(self) -> &'static str {
        match self {
            Self::NoClobber => {
                "INSERT OR IGNORE INTO objects (bucket, id, body, written_at) VALUES (?1, ?2, ?3, ?4)"
            }
            Self::Replace => {
                "INSERT OR REPLACE INTO objects (bucket, id, body, written_at) VALUES (?1, ?2, ?3, ?4)"
            }
            Self::Upsert => {
                "INSERT INTO objects (bucket, id, body, written_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (bucket, id) DO UPDATE SET body = excluded.body, written_at = excluded.written_at"
            }
        }
    }
}
