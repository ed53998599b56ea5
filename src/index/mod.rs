
use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::record::ChunkRecord;
use crate::{Result, StoreError};

/// File name of the binary index inside a store directory.
pub const INDEX_FILE_NAME: &str = "vector_index.bin";

/// Subdirectory also scanned for chunk records.
pub const DOCUMENTS_SUBDIR: &str = "documents";

const FORMAT_VERSION: u32 = 1;

/// One indexed chunk: its id, embedding, and the record file backing it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub file_path: PathBuf,
}

/// Outcome of `load_or_rebuild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries now present in the index
    pub loaded: usize,
    /// Record files skipped as corrupt or embedding-less
    pub skipped: usize,
    /// Whether the binary index was unusable and a rebuild ran
    pub rebuilt: bool,
}

/// In-memory vector index over the chunk records of one store directory.
///
/// Readers see consistent per-entry snapshots; a single writer per store
/// instance is assumed. Every mutating store operation persists the index
/// through the durable replace pattern.
pub struct VectorIndex {
    entries: DashMap<String, IndexEntry>,
    store_dir: PathBuf,
    index_path: PathBuf,
    dimension: usize,
}

impl VectorIndex {
    #[inline]
    pub fn new(store_dir: &Path, dimension: usize) -> Self {
        Self {
            entries: DashMap::new(),
            store_dir: store_dir.to_path_buf(),
            index_path: store_dir.join(INDEX_FILE_NAME),
            dimension,
        }
    }

    /// Upsert an entry. Never fails for well-formed inputs.
    #[inline]
    pub fn add(&self, id: impl Into<String>, embedding: Vec<f32>, file_path: PathBuf) {
        let id = id.into();
        self.entries.insert(
            id.clone(),
            IndexEntry {
                id,
                embedding,
                file_path,
            },
        );
    }

    /// Remove an entry, reporting whether it was present.
    #[inline]
    pub fn remove(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of all entries.
    #[inline]
    pub fn all(&self) -> Vec<IndexEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// Snapshot of all ids.
    #[inline]
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn clear(&self) {
        self.entries.clear();
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Write the binary index atomically (temp file, fsync, rename).
    #[inline]
    pub async fn persist(&self) -> Result<()> {
        let payload = self.encode();
        let path = self.index_path.clone();

        tokio::task::spawn_blocking(move || durable_replace(&path, &payload))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    StoreError::Cancelled
                } else {
                    StoreError::Io(std::io::Error::other(e))
                }
            })??;

        debug!("Persisted index with {} entries", self.count());
        Ok(())
    }

    /// Restore the index from `vector_index.bin`, rebuilding from the chunk
    /// record files when the binary is missing or fails validation.
    #[inline]
    pub async fn load_or_rebuild(&self) -> Result<LoadReport> {
        match tokio::fs::read(&self.index_path).await {
            Ok(bytes) => match decode(&bytes) {
                Ok(entries) => {
                    self.entries.clear();
                    let loaded = entries.len();
                    for entry in entries {
                        self.entries.insert(entry.id.clone(), entry);
                    }
                    debug!("Loaded {} entries from binary index", loaded);
                    Ok(LoadReport {
                        loaded,
                        skipped: 0,
                        rebuilt: false,
                    })
                }
                Err(e) => {
                    warn!("Binary index invalid ({}), rebuilding from records", e);
                    self.rebuild().await
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.rebuild().await,
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild the index by scanning chunk record files at the store root
    /// and under `documents/`. Corrupt or embedding-less records are logged
    /// and skipped. A fresh binary index is persisted afterwards.
    async fn rebuild(&self) -> Result<LoadReport> {
        self.entries.clear();
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        let mut dirs = vec![self.store_dir.clone()];
        let documents_dir = self.store_dir.join(DOCUMENTS_SUBDIR);
        if tokio::fs::try_exists(&documents_dir).await.unwrap_or(false) {
            dirs.push(documents_dir);
        }

        for dir in dirs {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) => {
                    warn!("Cannot scan {}: {}", dir.display(), e);
                    continue;
                }
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                if !is_record_candidate(&path) {
                    continue;
                }
                match self.load_record_file(&path).await {
                    Ok(true) => loaded += 1,
                    Ok(false) => skipped += 1,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        skipped += 1;
                    }
                }
            }
        }

        info!(
            "Index rebuild complete: {} loaded, {} skipped",
            loaded, skipped
        );

        self.persist().await?;

        Ok(LoadReport {
            loaded,
            skipped,
            rebuilt: true,
        })
    }

    /// Load one record file into the index. Returns false when the record
    /// parses but carries no usable embedding.
    async fn load_record_file(&self, path: &Path) -> Result<bool> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("record")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let record = ChunkRecord::from_json_bytes(&name, &bytes)?;

        if record.embedding.is_empty() || record.embedding.len() != self.dimension {
            debug!(
                "Record {} has no {}-dimension embedding, skipping",
                name, self.dimension
            );
            return Ok(false);
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&record.id)
            .to_string();
        self.add(stem, record.embedding, path.to_path_buf());
        Ok(true)
    }

    /// Read and parse the chunk record a given entry points at. The on-disk
    /// file is authoritative; a missing file yields `None`.
    #[inline]
    pub async fn hydrate(&self, id: &str) -> Result<Option<ChunkRecord>> {
        let Some(entry) = self.get(id) else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(&entry.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Record file {} vanished", entry.file_path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        ChunkRecord::from_json_bytes(id, &bytes).map(Some)
    }

    /// Serialize all entries into the v1 binary layout, ordered by id so the
    /// output is deterministic.
    fn encode(&self) -> Vec<u8> {
        let mut entries = self.all();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let mut buf = Vec::with_capacity(16 + entries.len() * 64);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());

        for entry in &entries {
            write_string(&mut buf, &entry.id);
            write_string(&mut buf, &entry.file_path.to_string_lossy());
            buf.extend_from_slice(&(entry.embedding.len() as u32).to_le_bytes());
            for value in &entry.embedding {
                buf.extend_from_slice(&value.to_le_bytes());
            }
        }

        buf
    }
}

fn is_record_candidate(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
        && path.file_name().and_then(|n| n.to_str()) != Some("config.json")
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Decode a v1 binary index. Any structural problem, including a short
/// read or an unexpected version word, is a `CorruptIndex`.
fn decode(bytes: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut reader = ByteReader::new(bytes);

    let version = reader.read_u32()?;
    if version != FORMAT_VERSION {
        return Err(StoreError::CorruptIndex(format!(
            "unsupported version {version}"
        )));
    }

    let count = reader.read_u32()? as usize;
    let mut entries = Vec::with_capacity(count.min(1 << 20));

    for _ in 0..count {
        let id = reader.read_string()?;
        let file_path = PathBuf::from(reader.read_string()?);
        let dim = reader.read_u32()? as usize;
        let mut embedding = Vec::with_capacity(dim.min(1 << 16));
        for _ in 0..dim {
            embedding.push(f32::from_le_bytes(reader.read_array()?));
        }
        entries.push(IndexEntry {
            id,
            embedding,
            file_path,
        });
    }

    Ok(entries)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| StoreError::CorruptIndex("unexpected end of index file".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StoreError::CorruptIndex(format!("invalid UTF-8 in index: {e}")))
    }
}

/// Write bytes through the durable replace pattern: sibling temp file,
/// fsync, rename over the target.
pub(crate) fn durable_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");

    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    std::fs::rename(&temp_path, path)
}
