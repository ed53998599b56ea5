pub mod encoder;
pub mod provision;


use std::sync::Arc;

use anyhow::anyhow;
use tracing::debug;

use crate::cache::EmbeddingCache;
use crate::{Result, StoreError};

pub use encoder::{HashEncoder, TextEncoder};

/// Embedding width produced by the default model.
pub const EMBEDDING_DIMENSION: usize = 768;

/// Cache-aware façade over a `TextEncoder`.
///
/// Single and batch embedding consult the two-tier cache first; only cache
/// misses reach the encoder, and every vector handed out is L2-normalized
/// so callers may score by dot product.
pub struct Embedder {
    encoder: Arc<dyn TextEncoder>,
    cache: EmbeddingCache,
}

impl Embedder {
    #[inline]
    pub fn new(encoder: Arc<dyn TextEncoder>, cache: EmbeddingCache) -> Self {
        Self { encoder, cache }
    }

    /// Construct with the built-in deterministic encoder.
    #[inline]
    pub fn with_default_encoder(cache: EmbeddingCache) -> Self {
        Self::new(Arc::new(HashEncoder::default()), cache)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }

    /// Embed a single text, via the cache when possible.
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        validate_input(text)?;

        if let Some(cached) = self.cache.get(text).await {
            return Ok(cached);
        }

        let input = [text.to_string()];
        let mut vectors = self
            .encoder
            .encode_batch(&input)
            .await
            .map_err(StoreError::EmbeddingFailed)?;
        let vector = vectors
            .pop()
            .ok_or_else(|| StoreError::EmbeddingFailed(anyhow!("encoder returned no vector")))?;
        let vector = self.check_and_normalize(vector)?;

        self.cache.set(text, &vector).await;
        Ok(vector)
    }

    /// Embed a batch, partitioning into cached and uncached inputs. The
    /// result aligns positionally with `texts`; uncached inputs are encoded
    /// in one pass, preserving order.
    #[inline]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            validate_input(text)?;
        }

        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut uncached_indices = Vec::new();
        let mut uncached_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text).await {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    uncached_indices.push(i);
                    uncached_texts.push(text.clone());
                }
            }
        }

        debug!(
            "Embedding batch: {} cached, {} to encode",
            texts.len() - uncached_texts.len(),
            uncached_texts.len()
        );

        if !uncached_texts.is_empty() {
            let encoded = self
                .encoder
                .encode_batch(&uncached_texts)
                .await
                .map_err(StoreError::EmbeddingFailed)?;
            if encoded.len() != uncached_texts.len() {
                return Err(StoreError::EmbeddingFailed(anyhow!(
                    "encoder returned {} vectors for {} inputs",
                    encoded.len(),
                    uncached_texts.len()
                )));
            }

            for (slot, vector) in uncached_indices.iter().zip(encoded) {
                let vector = self.check_and_normalize(vector)?;
                self.cache.set(&texts[*slot], &vector).await;
                results[*slot] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Number of embeddings currently held in the cache's memory tier.
    #[inline]
    pub fn cached_embeddings(&self) -> usize {
        self.cache.memory_len()
    }

    fn check_and_normalize(&self, mut vector: Vec<f32>) -> Result<Vec<f32>> {
        if vector.len() != self.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension(),
                got: vector.len(),
            });
        }

        let norm = crate::similarity::l2_norm(&vector);
        if norm > 0.0 && (norm - 1.0).abs() > 1e-6 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

fn validate_input(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(StoreError::InvalidInput(
            "cannot embed empty or whitespace-only text".to_string(),
        ));
    }
    Ok(())
}
