//! Levenshtein distance (shared with the phonetic tolerant-match comparator)
//! and the hybrid query engine (C4).

pub mod engine;
pub mod levenshtein;

pub use engine::{Hit, HybridQuery, HybridSearchEngine, SearchTiming};
