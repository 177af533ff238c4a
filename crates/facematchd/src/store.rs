//! SQLite-backed identity store.

use facematch_core::codec;
use facematch_core::{Embedding, RawEmbedding, Store, StoreError, StoredRecord};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS identities (
    id         TEXT PRIMARY KEY,
    embedding  NOT NULL,
    created_at TEXT NOT NULL
);
";

/// Identity records in a single SQLite table.
///
/// The `embedding` column is untyped: rows written by this daemon hold a
/// JSON array, rows imported from elsewhere may hold packed `f32` blobs.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(query_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace the embedding for `id`. The original creation time
    /// of an existing row is kept.
    pub fn upsert(&self, id: &str, embedding: &Embedding) -> Result<(), StoreError> {
        let text = codec::encode_text(embedding).map_err(|e| StoreError::Query(e.to_string()))?;
        let created_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);

        self.conn
            .lock()
            .execute(
                "INSERT INTO identities (id, embedding, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET embedding = excluded.embedding",
                params![id, text, created_at],
            )
            .map_err(query_error)?;
        tracing::debug!(id, "identity persisted");
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))
            .map_err(query_error)?;
        Ok(n as usize)
    }
}

impl Store for SqliteStore {
    fn fetch_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, embedding FROM identities ORDER BY created_at, id")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let raw = match row.get_ref(1)? {
                    ValueRef::Text(t) => RawEmbedding::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => RawEmbedding::Bytes(b.to_vec()),
                    // Left for the decoder to reject so the row is reported
                    // and skipped like any other malformed record.
                    ValueRef::Integer(i) => RawEmbedding::Text(i.to_string()),
                    ValueRef::Real(f) => RawEmbedding::Text(f.to_string()),
                    ValueRef::Null => RawEmbedding::Text("null".to_string()),
                };
                Ok(StoredRecord { id, raw })
            })
            .map_err(query_error)?;

        let records = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;
        tracing::debug!(count = records.len(), "fetched identity records");
        Ok(records)
    }
}

fn query_error(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}
