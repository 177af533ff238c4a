//! Reconciliation of the vector index with the durable store.
//!
//! A full sync replaces the index with whatever the store holds. Records
//! that cannot be decoded are skipped one by one; a failed fetch aborts the
//! sync and leaves the published snapshot in place. Registrations are
//! upserted immediately and confirmed (or overwritten) by the next full sync.

use crate::codec::{self, RawEmbedding};
use crate::index::{IndexError, VectorIndex};
use crate::types::{Embedding, SnapshotInfo};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// One identity record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub raw: RawEmbedding,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
}

/// Durable source of identity records.
pub trait Store {
    fn fetch_all(&self) -> Result<Vec<StoredRecord>, StoreError>;
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("store fetch failed: {0}")]
    Fetch(#[from] StoreError),
    #[error("index rebuild failed: {0}")]
    Index(#[from] IndexError),
}

/// Outcome of a completed full sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub version: u64,
}

pub struct SyncCoordinator {
    index: Arc<VectorIndex>,
}

impl SyncCoordinator {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Rebuild the index from every record in `store`.
    pub fn full_sync<S: Store + ?Sized>(&self, store: &S) -> Result<SyncReport, SyncError> {
        let records = match store.fetch_all() {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "sync aborted, keeping current index");
                return Err(e.into());
            }
        };

        let fetched = records.len();
        let dimension = self.index.dimension();
        let mut entries: Vec<(String, Embedding)> = Vec::with_capacity(fetched);
        let mut skipped = 0usize;

        for record in records {
            let embedding = match codec::decode(&record.raw) {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "skipping undecodable record");
                    skipped += 1;
                    continue;
                }
            };
            if embedding.dimension() != dimension {
                tracing::warn!(
                    id = %record.id,
                    expected = dimension,
                    actual = embedding.dimension(),
                    "skipping record with wrong dimension"
                );
                skipped += 1;
                continue;
            }
            entries.push((record.id, embedding));
        }

        let info = self.index.rebuild(entries)?;
        let report = SyncReport {
            fetched,
            indexed: info.size,
            skipped,
            version: info.version,
        };
        tracing::info!(
            fetched = report.fetched,
            indexed = report.indexed,
            skipped = report.skipped,
            version = report.version,
            "full sync complete"
        );
        Ok(report)
    }

    /// Make a newly registered identity searchable right away.
    pub fn register(
        &self,
        id: impl Into<String>,
        embedding: Embedding,
    ) -> Result<SnapshotInfo, IndexError> {
        let id = id.into();
        let info = self.index.upsert(id.clone(), embedding)?;
        tracing::info!(id = %id, size = info.size, version = info.version, "identity registered");
        Ok(info)
    }
}
