
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingOptions;
use crate::embeddings::EMBEDDING_DIMENSION;

/// Optional per-store configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_MODEL_ID: &str = "nomic-embed-text-v1.5";
const DEFAULT_ARTIFACT_URL: &str =
    "https://huggingface.co/nomic-ai/nomic-embed-text-v1.5/resolve/main/onnx/model.onnx";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub model: ModelConfig,
    pub chunking: ChunkingOptions,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub artifact_url: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub max_memory_items: usize,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            chunking: ChunkingOptions::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    #[inline]
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            artifact_url: DEFAULT_ARTIFACT_URL.to_string(),
            dimension: EMBEDDING_DIMENSION,
        }
    }
}

impl Default for CacheConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_memory_items: crate::cache::DEFAULT_MAX_MEMORY_ITEMS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid model id: {0} (cannot be empty)")]
    InvalidModelId(String),
    #[error("Invalid artifact URL: {0}")]
    InvalidArtifactUrl(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidDimension(usize),
    #[error("Invalid cache capacity: {0} (must be between 1 and 1000000)")]
    InvalidCacheCapacity(usize),
    #[error("Invalid chunking options: {0}")]
    InvalidChunking(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreConfig {
    /// Load `config.json` from a store directory, falling back to defaults
    /// when the file is absent.
    #[inline]
    pub async fn load(store_dir: &Path) -> Result<Self, ConfigError> {
        let path = store_dir.join(CONFIG_FILE_NAME);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let config: Self = serde_json::from_slice(&bytes)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `config.json` into a store directory.
    #[inline]
    pub async fn save(&self, store_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let payload = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(store_dir.join(CONFIG_FILE_NAME), payload).await?;
        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.model_id.trim().is_empty() {
            return Err(ConfigError::InvalidModelId(self.model.model_id.clone()));
        }

        if Url::parse(&self.model.artifact_url).is_err() {
            return Err(ConfigError::InvalidArtifactUrl(
                self.model.artifact_url.clone(),
            ));
        }

        if !(64..=4096).contains(&self.model.dimension) {
            return Err(ConfigError::InvalidDimension(self.model.dimension));
        }

        if !(1..=1_000_000).contains(&self.cache.max_memory_items) {
            return Err(ConfigError::InvalidCacheCapacity(
                self.cache.max_memory_items,
            ));
        }

        self.chunking
            .validate()
            .map_err(|e| ConfigError::InvalidChunking(e.to_string()))?;

        Ok(())
    }
}
