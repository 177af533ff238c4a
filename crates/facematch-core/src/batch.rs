//! Multi-face recognition for a single image.

use crate::index::IndexError;
use crate::resolver::Matcher;
use crate::types::{Embedding, MatchResult, Recognition};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("image could not be decoded: {0}")]
    InvalidImage(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Produces face embeddings from encoded image bytes.
///
/// "No face" is a successful empty answer, never an error.
pub trait Embedder {
    /// Embedding of the most prominent face, or `None` if no face was found.
    fn embed(&self, image: &[u8]) -> Result<Option<Embedding>, EmbedderError>;

    /// One embedding per detected face, in detection order.
    fn embed_all(&self, image: &[u8]) -> Result<Vec<Embedding>, EmbedderError>;
}

#[derive(Error, Debug)]
pub enum RecognizeError {
    #[error("embedder: {0}")]
    Embedder(#[from] EmbedderError),
    #[error("index: {0}")]
    Index(#[from] IndexError),
}

/// Resolves every face of one image, keeping each identity at most once.
pub struct BatchRecognizer<M> {
    matcher: M,
}

impl<M: Matcher> BatchRecognizer<M> {
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Resolve `queries` in order and return the matches.
    ///
    /// All queries are resolved through [`Matcher::resolve_all`], so a batch
    /// sees one index snapshot. The first query to match an identity claims it; later queries matching
    /// the same identity are dropped even when closer.
    pub fn recognize_batch(
        &self,
        queries: &[Embedding],
        tolerance: f32,
    ) -> Result<Vec<MatchResult>, IndexError> {
        let mut matches = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (i, result) in self
            .matcher
            .resolve_all(queries, tolerance)?
            .into_iter()
            .enumerate()
        {
            let Some(id) = result.identity_id.as_deref() else {
                continue;
            };
            if !seen.insert(id.to_string()) {
                tracing::debug!(face = i, identity = id, "duplicate identity in batch, dropped");
                continue;
            }
            matches.push(result);
        }

        tracing::debug!(
            faces = queries.len(),
            matched = matches.len(),
            "batch recognized"
        );
        Ok(matches)
    }

    /// Embed every face in `image` and recognize them as one batch.
    pub fn recognize_image<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        image: &[u8],
        tolerance: f32,
    ) -> Result<Recognition, RecognizeError> {
        let queries = embedder.embed_all(image)?;
        if queries.is_empty() {
            tracing::info!("no faces detected in image");
        }
        let matches = self.recognize_batch(&queries, tolerance)?;
        Ok(Recognition {
            detected_faces: queries.len(),
            matches,
        })
    }

    /// Embed the most prominent face in `image` and resolve it.
    ///
    /// Returns `None` when the image contains no face.
    pub fn resolve_image<E: Embedder + ?Sized>(
        &self,
        embedder: &E,
        image: &[u8],
        tolerance: f32,
    ) -> Result<Option<MatchResult>, RecognizeError> {
        match embedder.embed(image)? {
            Some(query) => Ok(Some(self.matcher.resolve(&query, tolerance)?)),
            None => Ok(None),
        }
    }
}
