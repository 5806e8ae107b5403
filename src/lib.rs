//! Catalog Search Engine Library
//!
//! Exposes the hybrid retrieval core (embedding, phonetic encoding, index
//! build/query, facet composition) and the HTTP surface for reuse by the
//! server binary and the auxiliary CLI tools.

pub mod config;
pub mod embedding;
pub mod error;
pub mod facets;
pub mod index;
pub mod phonetic;
pub mod search;
pub mod server;

pub use error::{EngineError, EngineResult};
pub use server::run_server;
