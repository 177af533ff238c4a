//! Nearest-neighbor match decisions with distance thresholding.

use crate::index::{IndexError, Snapshot, VectorIndex};
use crate::types::{Embedding, MatchResult, Verification};
use std::sync::Arc;

/// Whether `distance` falls within `tolerance`. The comparison is inclusive.
///
/// A NaN, infinite or negative tolerance never matches.
pub fn within_tolerance(distance: f32, tolerance: f32) -> bool {
    tolerance.is_finite() && tolerance >= 0.0 && distance <= tolerance
}

/// Confidence score in [0, 1] for a candidate at `distance`.
///
/// Linear in distance: 1.0 at distance 0, falling to 0.0 at `tolerance`.
/// A zero tolerance only accepts exact matches, which score 1.0.
pub fn confidence(distance: f32, tolerance: f32) -> f32 {
    if !within_tolerance(distance, tolerance) {
        return 0.0;
    }
    if tolerance == 0.0 {
        return 1.0;
    }
    ((tolerance - distance) / tolerance).clamp(0.0, 1.0)
}

/// Strategy for resolving one probe embedding to an identity.
pub trait Matcher {
    fn resolve(&self, query: &Embedding, tolerance: f32) -> Result<MatchResult, IndexError>;

    /// Resolve each query in order. Implementations backed by a swappable
    /// index resolve the whole slice against one snapshot.
    fn resolve_all(
        &self,
        queries: &[Embedding],
        tolerance: f32,
    ) -> Result<Vec<MatchResult>, IndexError> {
        queries.iter().map(|q| self.resolve(q, tolerance)).collect()
    }
}

/// Resolves probes against the 1-nearest neighbor of a shared index.
#[derive(Clone)]
pub struct MatchResolver {
    index: Arc<VectorIndex>,
}

impl MatchResolver {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Compare a probe against one known embedding, bypassing the index.
    pub fn verify(
        &self,
        known: &Embedding,
        probe: &Embedding,
        tolerance: f32,
    ) -> Result<Verification, IndexError> {
        let expected = self.index.dimension();
        for e in [known, probe] {
            if e.dimension() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: e.dimension(),
                });
            }
        }

        let distance = known.euclidean_distance(probe);
        Ok(Verification {
            matched: within_tolerance(distance, tolerance),
            distance,
            confidence: confidence(distance, tolerance),
            threshold: tolerance,
        })
    }
}

impl MatchResolver {
    fn resolve_against(
        &self,
        snapshot: &Snapshot,
        query: &Embedding,
        tolerance: f32,
    ) -> Result<MatchResult, IndexError> {
        self.index.validate(query)?;
        let nearest = snapshot.nearest(query, 1).into_iter().next();

        let result = match nearest {
            Some(n) if within_tolerance(n.distance, tolerance) => MatchResult {
                confidence: confidence(n.distance, tolerance),
                distance: n.distance,
                identity_id: Some(n.id),
            },
            Some(n) => MatchResult::no_match(n.distance),
            None => MatchResult::no_match(f32::INFINITY),
        };

        tracing::debug!(
            identity = ?result.identity_id,
            distance = result.distance,
            confidence = result.confidence,
            tolerance,
            snapshot = snapshot.version(),
            "resolved probe"
        );
        Ok(result)
    }
}

impl Matcher for MatchResolver {
    fn resolve(&self, query: &Embedding, tolerance: f32) -> Result<MatchResult, IndexError> {
        self.resolve_against(&self.index.snapshot(), query, tolerance)
    }

    fn resolve_all(
        &self,
        queries: &[Embedding],
        tolerance: f32,
    ) -> Result<Vec<MatchResult>, IndexError> {
        let snapshot = self.index.snapshot();
        queries
            .iter()
            .map(|q| self.resolve_against(&snapshot, q, tolerance))
            .collect()
    }
}
