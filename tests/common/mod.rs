//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.

mod fixtures;
mod server;

pub use fixtures::{sample_catalog, FakeFacetProvider};
pub use server::{FakeEmbeddingServer, TestServer};
