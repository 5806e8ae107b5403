//! Top-level typed error surface for the catalogue search engine.
//!
//! Internal plumbing uses `anyhow::Result` with `.context(...)`; these variants
//! are the boundary errors returned from the public C1-C6 entry points and
//! mapped to HTTP responses in `server::routes`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("embedding service unavailable at {endpoint}: {source}")]
    EmbeddingUnavailable {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("embedding response from {endpoint} missing expected fields: {detail}")]
    EmbeddingMalformed { endpoint: String, detail: String },

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index artifacts at {path} are missing or unreadable: {source}")]
    IndexCorrupt {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("schema mismatch: {detail}")]
    SchemaMismatch { detail: String },

    #[error("facet store unavailable: {0}")]
    FacetUnavailable(#[source] anyhow::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
