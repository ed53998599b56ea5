#[cfg(test)]
mod tests;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::embeddings::EMBEDDING_DIMENSION;

/// The seam between the embedding pipeline and a concrete model evaluator.
///
/// Implementations must produce one vector per input, preserving order.
/// Vectors need not be normalized; the façade normalizes before caching.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Deterministic feature-hashing encoder: each token hashes to one
/// dimension, and a text embeds as the normalized histogram of its tokens.
/// Distinct tokens land on distinct axes (barring hash collisions), so
/// cosine similarity reduces to vocabulary overlap — enough for stable
/// ranking without a neural model. A real ONNX evaluator replaces this
/// behind the same trait.
pub struct HashEncoder {
    dimension: usize,
}

impl HashEncoder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode_one(&self, text: &str) -> Vec<f32> {
        let mut tokens: Vec<String> = tokenize(text);
        if tokens.is_empty() {
            tokens.push(text.trim().to_lowercase());
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in &tokens {
            let slot = (token_seed(token) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }

        normalize_in_place(&mut vector);
        vector
    }
}

impl Default for HashEncoder {
    #[inline]
    fn default() -> Self {
        Self::new(EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl TextEncoder for HashEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode_one(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stable 64-bit seed from a token's SHA-256.
fn token_seed(token: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes([
        digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
    ])
}

fn normalize_in_place(vector: &mut [f32]) {
    let norm = crate::similarity::l2_norm(vector);
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
