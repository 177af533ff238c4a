use crate::store::SqliteStore;
use facematch_core::{
    BatchRecognizer, Embedding, MatchConfig, MatchResolver, MatchResult, SyncCoordinator,
};
use serde::Serialize;
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.facematch.FaceMatch1";
pub const OBJECT_PATH: &str = "/org/facematch/FaceMatch1";

#[derive(Serialize)]
struct RegisterResponse<'a> {
    id: &'a str,
    dimension: usize,
    version: u64,
}

#[derive(Serialize)]
struct RecognizeResponse {
    detected_faces: usize,
    recognized_faces: usize,
    tolerance: f32,
    matches: Vec<MatchResult>,
}

/// D-Bus interface for the FaceMatch daemon.
///
/// Bus name: org.facematch.FaceMatch1
/// Object path: /org/facematch/FaceMatch1
///
/// Embeddings travel as JSON arrays of numbers; replies are JSON documents.
pub struct FaceMatchService {
    config: MatchConfig,
    coordinator: Arc<SyncCoordinator>,
    recognizer: BatchRecognizer<MatchResolver>,
    store: Arc<SqliteStore>,
}

impl FaceMatchService {
    pub fn new(
        config: MatchConfig,
        coordinator: Arc<SyncCoordinator>,
        store: Arc<SqliteStore>,
    ) -> Self {
        let resolver = MatchResolver::new(Arc::clone(coordinator.index()));
        Self {
            config,
            coordinator,
            recognizer: BatchRecognizer::new(resolver),
            store,
        }
    }

    /// Parse and validate an embedding against the index before it is used
    /// or persisted. Out-of-range JSON numbers narrow to infinity and are
    /// rejected here.
    fn parse_embedding(&self, json: &str) -> zbus::fdo::Result<Embedding> {
        let embedding: Embedding = serde_json::from_str(json).map_err(invalid_args)?;
        self.coordinator
            .index()
            .validate(&embedding)
            .map_err(invalid_args)?;
        Ok(embedding)
    }

    async fn do_register(&self, id: &str, embedding: &str) -> zbus::fdo::Result<String> {
        if id.trim().is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("identity id is empty".into()));
        }
        let embedding = self.parse_embedding(embedding)?;

        let store = Arc::clone(&self.store);
        let (owned_id, persisted) = (id.to_string(), embedding.clone());
        tokio::task::spawn_blocking(move || store.upsert(&owned_id, &persisted))
            .await
            .map_err(failed)?
            .map_err(failed)?;

        let info = self
            .coordinator
            .register(id, embedding)
            .map_err(invalid_args)?;

        to_json(&RegisterResponse {
            id,
            dimension: self.config.dimension,
            version: info.version,
        })
    }

    async fn do_sync(&self) -> zbus::fdo::Result<String> {
        let coordinator = Arc::clone(&self.coordinator);
        let store = Arc::clone(&self.store);
        let report = tokio::task::spawn_blocking(move || coordinator.full_sync(store.as_ref()))
            .await
            .map_err(failed)?
            .map_err(failed)?;
        to_json(&report)
    }

    fn do_recognize(&self, embeddings: &str, tolerance: f64) -> zbus::fdo::Result<String> {
        let queries: Vec<Embedding> = serde_json::from_str(embeddings).map_err(invalid_args)?;
        let tolerance = self.config.tolerance_or_default(tolerance as f32);

        let matches = self
            .recognizer
            .recognize_batch(&queries, tolerance)
            .map_err(invalid_args)?;

        tracing::info!(
            detected = queries.len(),
            recognized = matches.len(),
            tolerance,
            "recognize completed"
        );

        to_json(&RecognizeResponse {
            detected_faces: queries.len(),
            recognized_faces: matches.len(),
            tolerance,
            matches,
        })
    }

    fn do_verify(&self, known: &str, probe: &str) -> zbus::fdo::Result<String> {
        let known = self.parse_embedding(known)?;
        let probe = self.parse_embedding(probe)?;
        let verification = self
            .recognizer
            .matcher()
            .verify(&known, &probe, self.config.tolerance)
            .map_err(invalid_args)?;
        to_json(&verification)
    }

    fn do_status(&self) -> zbus::fdo::Result<String> {
        let info = self.coordinator.index().snapshot_info();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dimension": self.config.dimension,
            "tolerance": self.config.tolerance,
            "identities": info.size,
            "snapshot_version": info.version,
        })
        .to_string())
    }
}

#[interface(name = "org.facematch.FaceMatch1")]
impl FaceMatchService {
    /// Persist an identity and make it searchable immediately.
    async fn register(&self, id: &str, embedding: &str) -> zbus::fdo::Result<String> {
        tracing::info!(id, "register requested");
        self.do_register(id, embedding).await
    }

    /// Recognize every face embedding from one image.
    ///
    /// `tolerance <= 0` selects the configured default.
    async fn recognize(&self, embeddings: &str, tolerance: f64) -> zbus::fdo::Result<String> {
        self.do_recognize(embeddings, tolerance)
    }

    /// Compare a probe against one known embedding.
    async fn verify(&self, known: &str, probe: &str) -> zbus::fdo::Result<String> {
        self.do_verify(known, probe)
    }

    /// Rebuild the index from the store.
    async fn sync(&self) -> zbus::fdo::Result<String> {
        tracing::info!("sync requested");
        self.do_sync().await
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        self.do_status()
    }
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(failed)
}

fn invalid_args(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::InvalidArgs(e.to_string())
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    tracing::error!(error = %e, "request failed");
    zbus::fdo::Error::Failed(e.to_string())
}
