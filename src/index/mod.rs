//! Index artifacts, flat L2 vector store, and the offline build pipeline (C3).

pub mod artifacts;
pub mod builder;
pub mod vector_store;

pub use artifacts::{ArtifactPaths, IndexMeta, ProductRecord};
pub use builder::{build_index, BuildStats};
pub use vector_store::FlatL2Index;
