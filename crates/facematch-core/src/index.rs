//! In-memory vector index over identity embeddings.
//!
//! The index holds one immutable [`Snapshot`] behind an atomic pointer.
//! Writers build a replacement snapshot off to the side and publish it with
//! a single swap, so concurrent readers see either the old snapshot or the
//! new one in full. Writers are serialized by a mutex; readers never take it.

use crate::types::{Embedding, Neighbor, SnapshotInfo};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding component {index} is not finite")]
    NonFinite { index: usize },
}

/// Immutable point-in-time mapping of identity id to embedding.
///
/// Entries keep the order in which ids were first inserted; this order
/// breaks ties between equidistant neighbors.
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    entries: Vec<(String, Arc<Embedding>)>,
    positions: HashMap<String, usize>,
}

impl Snapshot {
    /// Build from ordered pairs. A repeated id keeps its first position and
    /// takes the last value.
    fn from_entries(entries: Vec<(String, Embedding)>) -> Self {
        let mut snapshot = Snapshot {
            version: 0,
            entries: Vec::with_capacity(entries.len()),
            positions: HashMap::with_capacity(entries.len()),
        };
        for (id, embedding) in entries {
            snapshot.put(id, Arc::new(embedding));
        }
        snapshot
    }

    fn put(&mut self, id: String, embedding: Arc<Embedding>) {
        match self.positions.get(&id) {
            Some(&pos) => self.entries[pos].1 = embedding,
            None => {
                self.positions.insert(id.clone(), self.entries.len());
                self.entries.push((id, embedding));
            }
        }
    }

    /// Copy of this snapshot with one entry inserted or replaced.
    /// Embeddings are shared, not cloned.
    fn with_upsert(&self, id: String, embedding: Arc<Embedding>) -> Self {
        let mut next = Snapshot {
            version: self.version,
            entries: self.entries.clone(),
            positions: self.positions.clone(),
        };
        next.put(id, embedding);
        next
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Embedding> {
        self.positions
            .get(id)
            .map(|&pos| self.entries[pos].1.as_ref())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Embedding)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e.as_ref()))
    }

    /// Up to `k` entries by ascending Euclidean distance to `query`.
    pub(crate) fn nearest(&self, query: &Embedding, k: usize) -> Vec<Neighbor> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (_, e))| (pos, query.euclidean_distance(e)))
            .collect();

        // Stable sort: equal distances stay in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(pos, distance)| Neighbor {
                id: self.entries[pos].0.clone(),
                distance,
            })
            .collect()
    }
}

/// Shared nearest-neighbor index over fixed-dimension embeddings.
pub struct VectorIndex {
    dimension: usize,
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl VectorIndex {
    /// Create an empty index accepting only `dimension`-length embeddings.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            current: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Check that `embedding` could be written to or searched in this index.
    pub fn validate(&self, embedding: &Embedding) -> Result<(), IndexError> {
        if embedding.dimension() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        if let Some(index) = embedding.first_non_finite() {
            return Err(IndexError::NonFinite { index });
        }
        Ok(())
    }

    /// Replace the whole snapshot with `entries`.
    ///
    /// Ids absent from `entries` are removed. If any embedding is invalid the
    /// call fails and the published snapshot is left untouched.
    pub fn rebuild<I>(&self, entries: I) -> Result<SnapshotInfo, IndexError>
    where
        I: IntoIterator<Item = (String, Embedding)>,
    {
        let entries: Vec<(String, Embedding)> = entries.into_iter().collect();
        for (id, embedding) in &entries {
            if let Err(e) = self.validate(embedding) {
                tracing::warn!(id = %id, error = %e, "rebuild rejected");
                return Err(e);
            }
        }

        let mut next = Snapshot::from_entries(entries);

        let _guard = self.writer.lock();
        next.version = self.current.load().version + 1;
        let info = SnapshotInfo {
            version: next.version,
            size: next.len(),
        };
        self.current.store(Arc::new(next));

        tracing::info!(size = info.size, version = info.version, "index rebuilt");
        Ok(info)
    }

    /// Insert or replace one entry, leaving all others as they were.
    pub fn upsert(
        &self,
        id: impl Into<String>,
        embedding: Embedding,
    ) -> Result<SnapshotInfo, IndexError> {
        let id = id.into();
        if let Err(e) = self.validate(&embedding) {
            tracing::warn!(id = %id, error = %e, "upsert rejected");
            return Err(e);
        }
        let embedding = Arc::new(embedding);

        let _guard = self.writer.lock();
        let current = self.current.load();
        let mut next = current.with_upsert(id.clone(), embedding);
        next.version = current.version + 1;
        let info = SnapshotInfo {
            version: next.version,
            size: next.len(),
        };
        self.current.store(Arc::new(next));

        tracing::debug!(id = %id, size = info.size, version = info.version, "index upsert");
        Ok(info)
    }

    /// Up to `k` nearest entries by ascending Euclidean distance.
    ///
    /// An empty index yields an empty result, not an error.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.validate(query)?;
        Ok(self.current.load().nearest(query, k))
    }

    pub fn size(&self) -> usize {
        self.current.load().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.current.load().get(id).is_some()
    }

    pub fn snapshot_info(&self) -> SnapshotInfo {
        let snapshot = self.current.load();
        SnapshotInfo {
            version: snapshot.version,
            size: snapshot.len(),
        }
    }

    /// The currently published snapshot. Holding it keeps it alive across
    /// later rebuilds.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }
}
