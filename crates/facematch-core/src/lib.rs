//! facematch-core — Face identity matching engine.
//!
//! Holds identity embeddings in an atomically swapped in-memory index and
//! turns probe embeddings into thresholded identity decisions. Embedding
//! extraction and durable storage are left to the [`Embedder`] and
//! [`Store`] collaborators.

pub mod batch;
pub mod codec;
pub mod config;
pub mod index;
pub mod resolver;
pub mod sync;
pub mod types;

pub use batch::{BatchRecognizer, Embedder, EmbedderError, RecognizeError};
pub use codec::{DecodeError, RawEmbedding};
pub use config::{ConfigError, MatchConfig};
pub use index::{IndexError, Snapshot, VectorIndex};
pub use resolver::{MatchResolver, Matcher};
pub use sync::{Store, StoreError, StoredRecord, SyncCoordinator, SyncError, SyncReport};
pub use types::{Embedding, MatchResult, Neighbor, Recognition, SnapshotInfo, Verification};
