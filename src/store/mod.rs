
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cache::EmbeddingCache;
use crate::chunking::{ChunkingOptions, assemble_chunks, detect_boundaries};
use crate::config::StoreConfig;
use crate::embeddings::{Embedder, provision};
use crate::extract::{DocumentKind, ExtractedDocument, ExtractorRegistry};
use crate::index::{DOCUMENTS_SUBDIR, INDEX_FILE_NAME, VectorIndex, durable_replace};
use crate::record::ChunkRecord;
use crate::similarity;
use crate::{Result, StoreError};

/// A search hit: the hydrated chunk record and its cosine score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Aggregate figures for one store directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub records: usize,
    pub index_file_bytes: u64,
}

/// A file-backed vector store: chunk records as per-id JSON files plus an
/// in-memory index with a binary snapshot.
///
/// One instance assumes it is the only writer for its directory; concurrent
/// readers are safe alongside that writer. Every mutating operation
/// persists the index through a serialized durable replace.
pub struct VectorStore {
    root: PathBuf,
    config: StoreConfig,
    index: VectorIndex,
    embedder: Embedder,
    extractors: ExtractorRegistry,
    persist_lock: tokio::sync::Mutex<()>,
}

impl VectorStore {
    /// Create a new store at `path`. The directory must be absent or contain
    /// neither a binary index nor any JSON files.
    #[inline]
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_config(path, StoreConfig::default()).await
    }

    /// Create a new store with explicit configuration.
    #[inline]
    pub async fn create_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        config.validate()?;

        if tokio::fs::try_exists(&root).await? {
            let markers = scan_markers(&root).await?;
            if markers.has_index || markers.has_any_json {
                return Err(StoreError::AlreadyExists(root));
            }
        }
        tokio::fs::create_dir_all(&root).await?;

        let store = Self::assemble(root, config);
        store.persist_index().await?;

        info!("Created store at {}", store.root.display());
        Ok(store)
    }

    /// Open an existing store. The directory must exist and contain either
    /// a binary index or at least one chunk record.
    #[inline]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !tokio::fs::try_exists(&root).await? {
            return Err(StoreError::NotFound(root.display().to_string()));
        }

        let markers = scan_markers(&root).await?;
        if !markers.has_index && !markers.has_record_json {
            return Err(StoreError::NotAStore(root));
        }

        let config = StoreConfig::load(&root).await?;
        let store = Self::assemble(root, config);

        let report = store.index.load_or_rebuild().await?;
        info!(
            "Opened store at {} ({} records{})",
            store.root.display(),
            report.loaded,
            if report.rebuilt { ", index rebuilt" } else { "" }
        );

        Ok(store)
    }

    /// Open the store at `path` when it is valid, create it otherwise.
    #[inline]
    pub async fn create_or_open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();

        if tokio::fs::try_exists(root).await? {
            let markers = scan_markers(root).await?;
            if markers.has_index || markers.has_record_json {
                return Self::open(root).await;
            }
        }
        Self::create(root).await
    }

    /// Delete the store directory. Refuses directories that carry no store
    /// markers, returning `false`; a missing path also returns `false`.
    #[inline]
    pub async fn delete(path: impl AsRef<Path>) -> Result<bool> {
        let root = path.as_ref();

        if !tokio::fs::try_exists(root).await? {
            return Ok(false);
        }

        let markers = scan_markers(root).await?;
        if !markers.has_index && !markers.has_record_json {
            warn!(
                "Refusing to delete {}: not a document store",
                root.display()
            );
            return Ok(false);
        }

        tokio::fs::remove_dir_all(root).await?;
        info!("Deleted store at {}", root.display());
        Ok(true)
    }

    fn assemble(root: PathBuf, config: StoreConfig) -> Self {
        let cache = EmbeddingCache::new(
            provision::default_embedding_cache_dir(),
            config.cache.max_memory_items,
        );
        let index = VectorIndex::new(&root, config.model.dimension);

        Self {
            root,
            index,
            embedder: Embedder::with_default_encoder(cache),
            extractors: ExtractorRegistry::default(),
            config,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[inline]
    pub fn record_count(&self) -> usize {
        self.index.count()
    }

    /// Store a chunk record, assigning an id when absent, and register it
    /// in the index. Re-adding an id overwrites the previous record.
    #[inline]
    pub async fn add(&self, mut record: ChunkRecord) -> Result<String> {
        if record.id.trim().is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }
        record.validate_embedding(self.embedder.dimension())?;

        self.write_record(&record).await?;
        self.persist_index().await?;

        debug!("Added record {}", record.id);
        Ok(record.id)
    }

    /// Fetch a record by id: index lookup and hydrate first, then a direct
    /// scan of the known record locations for index-less files.
    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<ChunkRecord>> {
        if let Some(record) = self.index.hydrate(id).await? {
            return Ok(Some(record));
        }

        for candidate in [
            self.record_path(id),
            self.root.join(DOCUMENTS_SUBDIR).join(format!("{id}.json")),
        ] {
            match tokio::fs::read(&candidate).await {
                Ok(bytes) => return ChunkRecord::from_json_bytes(id, &bytes).map(Some),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }

    /// Remove a record: delete its file, drop the index entry, and persist
    /// the index before returning. Returns whether anything was removed.
    #[inline]
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let file_path = self
            .index
            .get(id)
            .map(|entry| entry.file_path)
            .unwrap_or_else(|| self.record_path(id));

        let file_removed = match tokio::fs::remove_file(&file_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let index_removed = self.index.remove(id);
        if index_removed || file_removed {
            self.persist_index().await?;
            debug!("Removed record {}", id);
        }

        Ok(index_removed || file_removed)
    }

    /// All record ids known to the index, sorted for determinism.
    #[inline]
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids = self.index.ids();
        ids.sort();
        ids
    }

    /// Embed a text and store it as a single chunk record.
    #[inline]
    pub async fn add_text(
        &self,
        content: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<String> {
        let embedding = self.embedder.embed(content).await?;
        let record = ChunkRecord::new(content, metadata).with_embedding(embedding);
        self.add(record).await
    }

    /// Ingest one document file: extract, chunk, embed, and store every
    /// chunk. Returns the new record ids in chunk order.
    #[inline]
    pub async fn add_document(
        &self,
        file_path: impl AsRef<Path>,
        options: Option<&ChunkingOptions>,
    ) -> Result<Vec<String>> {
        let file_path = file_path.as_ref();
        let options = options.unwrap_or(&self.config.chunking);
        options.validate()?;

        let document = self.extractors.extract_file(file_path).await?;
        let chunks = self.chunk_document(&document, options)?;
        if chunks.is_empty() {
            debug!("No chunks produced for {}", file_path.display());
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let source_title = document
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| crate::extract::file_stem(file_path));

        let total_chunks = chunks.len();
        let mut ids = Vec::with_capacity(total_chunks);

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let mut metadata = document.metadata.clone();
            metadata.insert(
                "source_file".to_string(),
                json!(file_path.display().to_string()),
            );
            metadata.insert("source_title".to_string(), json!(source_title));
            metadata.insert("chunk_index".to_string(), json!(chunk.index));
            metadata.insert("total_chunks".to_string(), json!(total_chunks));
            metadata.insert("start_position".to_string(), json!(chunk.start_position));
            metadata.insert("end_position".to_string(), json!(chunk.end_position));
            metadata.insert("word_count".to_string(), json!(chunk.word_count));
            metadata.insert(
                "character_count".to_string(),
                json!(chunk.character_count),
            );
            metadata.insert("has_overlap".to_string(), json!(chunk.has_overlap));

            if document.kind == DocumentKind::Markdown && options.preserve_headers {
                if let Some(header) =
                    crate::extract::markdown::header_context(&document.text, chunk.start_position)
                {
                    metadata.insert("header_context".to_string(), json!(header));
                }
            }
            if document.kind == DocumentKind::Pdf && options.include_page_numbers {
                let page = page_number_at(&document.text, chunk.start_position);
                metadata.insert("page_number".to_string(), json!(page));
            }

            let record = ChunkRecord::new(chunk.content, metadata).with_embedding(embedding);
            ids.push(record.id.clone());
            self.write_record(&record).await?;
        }

        self.persist_index().await?;
        info!(
            "Ingested {} as {} chunks",
            file_path.display(),
            total_chunks
        );
        Ok(ids)
    }

    /// Ingest every supported file under `dir`, recursively. A failing file
    /// is logged and skipped; the batch continues.
    #[inline]
    pub async fn add_documents(
        &self,
        dir: impl AsRef<Path>,
        options: Option<&ChunkingOptions>,
    ) -> Result<Vec<String>> {
        let dir = dir.as_ref();
        if !tokio::fs::try_exists(dir).await? {
            return Err(StoreError::NotFound(dir.display().to_string()));
        }

        let mut all_ids = Vec::new();
        let mut failures = 0usize;
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !self.extractors.supports(&path) {
                    continue;
                }

                match self.add_document(&path, options).await {
                    Ok(ids) => all_ids.extend(ids),
                    Err(e) => {
                        failures += 1;
                        warn!("Skipping {}: {}", path.display(), e);
                    }
                }
            }
        }

        info!(
            "Directory ingest complete: {} chunks, {} files skipped",
            all_ids.len(),
            failures
        );
        Ok(all_ids)
    }

    /// Exact top-k cosine search over the index, hydrating the winners.
    #[inline]
    pub async fn search_vector(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let scored = self.score_top_k(query, k)?;

        let mut results = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            match self.index.hydrate(&id).await? {
                Some(record) => results.push(SearchResult { record, score }),
                None => warn!("Dropping stale index entry {} from results", id),
            }
        }
        Ok(results)
    }

    /// Embed the query text and run a vector search.
    #[inline]
    pub async fn search_text(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let vector = self.embedder.embed(query).await?;
        self.search_vector(&vector, k).await
    }

    /// Like `search_text`, but hydration is deferred: records load from
    /// disk only as the returned stream is polled, so consumers can chain
    /// predicates without materializing every hit.
    #[inline]
    pub async fn search_text_lazy(
        &self,
        query: &str,
        k: usize,
    ) -> Result<impl Stream<Item = Result<SearchResult>> + '_> {
        let vector = self.embedder.embed(query).await?;
        let scored = self.score_top_k(&vector, k)?;

        Ok(futures::stream::iter(scored).filter_map(move |(id, score)| async move {
            match self.index.hydrate(&id).await {
                Ok(Some(record)) => Some(Ok(SearchResult { record, score })),
                Ok(None) => {
                    warn!("Dropping stale index entry {} from results", id);
                    None
                }
                Err(e) => Some(Err(e)),
            }
        }))
    }

    /// Current record count and on-disk index size.
    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let index_file_bytes = match tokio::fs::metadata(self.root.join(INDEX_FILE_NAME)).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        Ok(StoreStats {
            records: self.index.count(),
            index_file_bytes,
        })
    }

    fn score_top_k(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.embedder.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.embedder.dimension(),
                got: query.len(),
            });
        }

        let entries = self.index.all();
        similarity::top_k(
            query,
            entries.iter().map(|e| (e.id.as_str(), e.embedding.as_slice())),
            k,
        )
    }

    fn chunk_document(
        &self,
        document: &ExtractedDocument,
        options: &ChunkingOptions,
    ) -> Result<Vec<crate::chunking::TextChunk>> {
        let boundary_kind = if options.respect_document_structure {
            document.kind
        } else {
            DocumentKind::Text
        };
        let boundaries = detect_boundaries(&document.text, boundary_kind);
        assemble_chunks(&document.text, &boundaries, options)
    }

    /// Serialize a record to its canonical root location and register it in
    /// the index (records without embeddings stay unindexed until one is
    /// attached).
    async fn write_record(&self, record: &ChunkRecord) -> Result<()> {
        let path = self.record_path(&record.id);
        let payload = record.to_json_pretty()?.into_bytes();

        let write_path = path.clone();
        tokio::task::spawn_blocking(move || durable_replace(&write_path, &payload))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    StoreError::Cancelled
                } else {
                    StoreError::Io(std::io::Error::other(e))
                }
            })??;

        if !record.embedding.is_empty() {
            self.index
                .add(record.id.clone(), record.embedding.clone(), path);
        }
        Ok(())
    }

    /// Persist the index under the store's write lock so concurrent
    /// mutations observe the final state.
    async fn persist_index(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        self.index.persist().await
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

struct StoreMarkers {
    has_index: bool,
    has_record_json: bool,
    has_any_json: bool,
}

/// Inspect a directory for store markers: the binary index, chunk record
/// JSON files (root or `documents/`), or any JSON file at all.
async fn scan_markers(root: &Path) -> Result<StoreMarkers> {
    let mut markers = StoreMarkers {
        has_index: tokio::fs::try_exists(root.join(INDEX_FILE_NAME))
            .await
            .unwrap_or(false),
        has_record_json: false,
        has_any_json: false,
    };

    for dir in [root.to_path_buf(), root.join(DOCUMENTS_SUBDIR)] {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            markers.has_any_json = true;
            if path.file_name().and_then(|n| n.to_str()) != Some(crate::config::CONFIG_FILE_NAME) {
                markers.has_record_json = true;
            }
        }
    }

    Ok(markers)
}

/// Page number (1-based) at a character offset of a page-joined text.
fn page_number_at(text: &str, position: usize) -> usize {
    text.chars()
        .take(position)
        .filter(|c| *c == '\u{c}')
        .count()
        + 1
}
