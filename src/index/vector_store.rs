//! Hand-rolled flat (brute-force) L2 vector index.
//!
//! The spec calls for exact nearest-neighbour search, not approximate search,
//! so there is no ANN crate to reach for here (see DESIGN.md): this is a
//! straight linear scan computing squared L2 distance against every row,
//! mirroring faiss's `IndexFlatL2` semantics (squared distance, not sqrt).

use crate::error::EngineError;
use crate::index::artifacts::{read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatL2Index {
    dim: usize,
    rows: Vec<Vec<f32>>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            rows: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. The caller is responsible for dimension consistency;
    /// mismatched rows are rejected.
    pub fn add(&mut self, vector: Vec<f32>) -> Result<(), EngineError> {
        if vector.len() != self.dim {
            return Err(EngineError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.rows.push(vector);
        Ok(())
    }

    /// Returns up to `nprobe` `(distance, row_index)` pairs sorted ascending
    /// by squared L2 distance. Row indices are always non-negative here; the
    /// "-1 means empty slot" convention from the spec does not arise for a
    /// freshly built index, but callers (the query engine) still treat a
    /// negative index defensively as an empty slot per the contract.
    pub fn search(&self, query: &[f32], nprobe: usize) -> Result<Vec<(f32, i64)>, EngineError> {
        if query.len() != self.dim {
            return Err(EngineError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, i64)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (squared_l2(query, row), i as i64))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(nprobe);
        Ok(scored)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json_atomic(path, self)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let index: Self = read_json(path)?;
        for row in &index.rows {
            if row.len() != index.dim {
                return Err(EngineError::IndexCorrupt {
                    path: path.display().to_string(),
                    source: anyhow::anyhow!(
                        "row with {} dims does not match declared dim {}",
                        row.len(),
                        index.dim
                    ),
                });
            }
        }
        Ok(index)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
