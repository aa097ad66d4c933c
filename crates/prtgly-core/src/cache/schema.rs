// Cache schema and migrations, versioned via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Applied to every connection before use.
pub(super) const CONNECTION_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
";

/// SQL migrations, indexed by version number.
const MIGRATIONS: &[&str] = &[
    // Version 1: objects keyed by (bucket, id), plus one marker row per
    // bucket that has been written at least once.
    r"
    CREATE TABLE IF NOT EXISTS objects (
        bucket     TEXT    NOT NULL,
        id         INTEGER NOT NULL,
        body       TEXT    NOT NULL,
        written_at TEXT    NOT NULL,
        PRIMARY KEY (bucket, id)
    );

    CREATE TABLE IF NOT EXISTS buckets (
        bucket     TEXT PRIMARY KEY,
        written_at TEXT NOT NULL
    );
    ",
];

/// Run all pending migrations.
pub(super) fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    for (version, migration) in (1..).zip(MIGRATIONS) {
        if version > current_version {
            tracing::info!(version, "running cache migration");
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    Ok(())
}
