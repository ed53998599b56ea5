
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::Result;

/// Default bound for the memory tier.
pub const DEFAULT_MAX_MEMORY_ITEMS: usize = 10_000;

/// Two-tier embedding cache keyed by the SHA-256 of the input text.
///
/// The memory tier is a bounded concurrent map with LRU eviction by access
/// recency; eviction under concurrent access is best-effort and never
/// corrupts entries. The file tier stores one JSON float array per key and
/// survives process restarts. File-tier writes are never fatal.
pub struct EmbeddingCache {
    memory: DashMap<String, MemoryEntry>,
    access_counter: AtomicU64,
    max_memory_items: usize,
    cache_dir: PathBuf,
}

struct MemoryEntry {
    vector: Vec<f32>,
    last_used: u64,
}

impl EmbeddingCache {
    #[inline]
    pub fn new(cache_dir: PathBuf, max_memory_items: usize) -> Self {
        Self {
            memory: DashMap::new(),
            access_counter: AtomicU64::new(0),
            max_memory_items: max_memory_items.max(1),
            cache_dir,
        }
    }

    /// Hex SHA-256 of the UTF-8 text, used as the cache key and file stem.
    #[inline]
    pub fn content_key(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up an embedding: memory first, then the file tier (promoting a
    /// file hit into memory).
    #[inline]
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::content_key(text);

        if let Some(mut entry) = self.memory.get_mut(&key) {
            entry.last_used = self.next_tick();
            return Some(entry.vector.clone());
        }

        let vector = self.read_file_tier(&key).await?;
        self.insert_memory(key, vector.clone());
        Some(vector)
    }

    /// Store an embedding in both tiers. The file write is best-effort.
    #[inline]
    pub async fn set(&self, text: &str, vector: &[f32]) {
        let key = Self::content_key(text);
        self.insert_memory(key.clone(), vector.to_vec());
        self.write_file_tier(&key, vector).await;
    }

    /// Number of entries currently held in memory.
    #[inline]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Drop both tiers.
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.memory.clear();
        if tokio::fs::try_exists(&self.cache_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.cache_dir).await?;
        }
        Ok(())
    }

    fn next_tick(&self) -> u64 {
        self.access_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn insert_memory(&self, key: String, vector: Vec<f32>) {
        let entry = MemoryEntry {
            vector,
            last_used: self.next_tick(),
        };
        self.memory.insert(key, entry);

        // Best-effort LRU eviction; a racing insert may briefly exceed the
        // bound without harm.
        while self.memory.len() > self.max_memory_items {
            let oldest = self
                .memory
                .iter()
                .min_by_key(|e| e.value().last_used)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.memory.remove(&key);
                }
                None => break,
            }
        }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    async fn read_file_tier(&self, key: &str) -> Option<Vec<f32>> {
        let path = self.file_path(key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<Vec<f32>>(&bytes) {
            Ok(vector) => {
                debug!("Embedding cache file hit for {}", key);
                Some(vector)
            }
            Err(e) => {
                warn!("Discarding corrupt cache file {}: {}", path.display(), e);
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn write_file_tier(&self, key: &str, vector: &[f32]) {
        let path = self.file_path(key);
        let dir = self.cache_dir.clone();
        let payload = match serde_json::to_vec(&vector) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            crate::index::durable_replace(&path, &payload)
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Embedding cache file write failed for {}: {}", key, e),
            Err(e) => warn!("Embedding cache file write task failed: {}", e),
        }
    }
}
