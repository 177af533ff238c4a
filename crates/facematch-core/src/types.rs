use serde::{Deserialize, Serialize};

/// Face embedding vector (128- or 512-dimensional depending on the embedder).
///
/// Serializes as a bare JSON array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Both embeddings are expected to have the same dimension; callers
    /// validate this before comparing.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Index of the first NaN or infinite component, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.values.iter().position(|v| !v.is_finite())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// One entry of a nearest-neighbor search, ordered by ascending distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// Result of resolving a probe embedding against the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Matched identity, `None` when nothing fell within tolerance.
    pub identity_id: Option<String>,
    /// Distance to the nearest entry; `f32::INFINITY` on an empty index.
    pub distance: f32,
    /// Normalized score in [0, 1]. Always 0 for a non-match.
    pub confidence: f32,
}

impl MatchResult {
    pub fn no_match(distance: f32) -> Self {
        Self {
            identity_id: None,
            distance,
            confidence: 0.0,
        }
    }
}

/// Result of recognizing every face in one image.
///
/// `detected_faces == 0` means the embedder found no face at all, which is
/// distinct from faces being found but none matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub detected_faces: usize,
    pub matches: Vec<MatchResult>,
}

/// One-to-one comparison of a probe against a single known embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub matched: bool,
    pub distance: f32,
    pub confidence: f32,
    pub threshold: f32,
}

/// Point-in-time description of the published index snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    /// Incremented by every successful rebuild or upsert.
    pub version: u64,
    pub size: usize,
}
