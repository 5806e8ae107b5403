//! Embedding client (C1): single-text and batched text-to-vector calls
//! against an external embedding service, with payload-shape fallback,
//! dimension pinning, and an order-preserving bounded-concurrency batch path.

use crate::error::EngineError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default size of the bounded worker pool used by `embed_many`.
pub const DEFAULT_WORKERS: usize = 4;
/// Default HTTP timeout for a single embedding call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for EmbeddingClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct EmbedInputRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Serialize)]
struct EmbedPromptRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize, Default)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
}

/// Establishes and enforces the embedding dimension for a process lifetime.
#[derive(Debug, Default)]
struct DimensionLock(AtomicUsize);

impl DimensionLock {
    /// Returns `Ok(())` if `len` agrees with the first-seen dimension,
    /// establishing it if this is the first call.
    fn check_or_set(&self, len: usize) -> Result<(), EngineError> {
        loop {
            let current = self.0.load(Ordering::SeqCst);
            if current == 0 {
                match self
                    .0
                    .compare_exchange(0, len, Ordering::SeqCst, Ordering::SeqCst)
                {
                    Ok(_) => return Ok(()),
                    Err(_) => continue,
                }
            }
            if current != len {
                return Err(EngineError::DimensionMismatch {
                    expected: current,
                    actual: len,
                });
            }
            return Ok(());
        }
    }

    fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            n => Some(n),
        }
    }
}

/// HTTP client for the external embedding service.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingClientConfig,
    dimension: DimensionLock,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            http,
            config,
            dimension: DimensionLock::default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// The embedding dimension established by the first successful call, if
    /// any has completed yet.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get()
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn post(&self, body: impl Serialize) -> Result<EmbedResponse, EngineError> {
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::EmbeddingUnavailable {
                endpoint: endpoint.clone(),
                source: e.into(),
            })?;

        if !response.status().is_success() {
            return Err(EngineError::EmbeddingUnavailable {
                endpoint: endpoint.clone(),
                source: anyhow::anyhow!("embedding endpoint returned status {}", response.status()),
            });
        }

        response
            .json::<EmbedResponse>()
            .await
            .map_err(|e| EngineError::EmbeddingMalformed {
                endpoint,
                detail: e.to_string(),
            })
    }

    /// Embed a single text. Tries `input`, then `prompt`, then falls back to
    /// the singleton `embeddings` list; fails if none yield a vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        if text.is_empty() {
            return Err(EngineError::InvalidRequest(
                "text must be a non-empty string".to_string(),
            ));
        }

        let endpoint = self.endpoint();

        let mut response = self
            .post(EmbedInputRequest {
                model: &self.config.model,
                input: text,
            })
            .await?;

        let mut vector = response.embedding.take();

        if vector.is_none() {
            response = self
                .post(EmbedPromptRequest {
                    model: &self.config.model,
                    prompt: text,
                })
                .await?;
            vector = response.embedding.take();
        }

        if vector.is_none() {
            vector = response
                .embeddings
                .take()
                .filter(|v| v.len() == 1)
                .map(|mut v| v.remove(0));
        }

        let vector = vector.filter(|v| !v.is_empty()).ok_or_else(|| {
            EngineError::EmbeddingMalformed {
                endpoint: endpoint.clone(),
                detail: "response contained neither 'embedding' nor a singleton 'embeddings' list"
                    .to_string(),
            }
        })?;

        self.dimension.check_or_set(vector.len())?;
        Ok(vector)
    }

    /// Embed many texts with a bounded worker pool, preserving input order in
    /// the output. `on_progress` is invoked once per completed item.
    pub async fn embed_many(
        &self,
        texts: &[String],
        workers: usize,
        mut on_progress: impl FnMut(),
    ) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let workers = workers.max(1);
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut next = 0usize;
        let mut in_flight = futures::stream::FuturesUnordered::new();

        use futures::StreamExt;

        while next < workers.min(texts.len()) {
            in_flight.push(self.embed_indexed(next, &texts[next]));
            next += 1;
        }

        while let Some(result) = in_flight.next().await {
            let (idx, vector) = result?;
            slots[idx] = Some(vector);
            on_progress();

            if next < texts.len() {
                in_flight.push(self.embed_indexed(next, &texts[next]));
                next += 1;
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| EngineError::EmbeddingMalformed {
                    endpoint: self.endpoint(),
                    detail: format!("missing embedding result for index {i}"),
                })
            })
            .collect()
    }

    async fn embed_indexed(
        &self,
        idx: usize,
        text: &str,
    ) -> Result<(usize, Vec<f32>), EngineError> {
        let vector = self.embed(text).await?;
        Ok((idx, vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_lock_establishes_on_first_call() {
        let lock = DimensionLock::default();
        assert!(lock.check_or_set(768).is_ok());
        assert!(lock.check_or_set(768).is_ok());
    }

    #[test]
    fn dimension_lock_rejects_mismatch() {
        let lock = DimensionLock::default();
        lock.check_or_set(768).unwrap();
        let err = lock.check_or_set(512).unwrap_err();
        match err {
            EngineError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 768);
                assert_eq!(actual, 512);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
