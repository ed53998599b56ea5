
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::{Result, StoreError};

/// Model artifact file name inside the per-model cache directory.
pub const MODEL_FILE_NAME: &str = "model.onnx";

/// Streaming download progress: `(bytes_downloaded, total_bytes, percent)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64, f64) + Send + Sync>;

const DOWNLOAD_BUFFER_SIZE: usize = 64 * 1024;

/// Per-user root for downloaded models (`~/.vectorstore/models`).
#[inline]
pub fn default_models_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vectorstore")
        .join("models")
}

/// Per-user root for the embedding file cache
/// (`~/.vectorstore/cache/embeddings`).
#[inline]
pub fn default_embedding_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vectorstore")
        .join("cache")
        .join("embeddings")
}

/// Manages the on-disk lifecycle of one model artifact: cache lookup and a
/// streaming, atomically-completed download on first use. A partial download
/// only ever exists as a sibling temp file and is discarded on failure, so
/// it can never be mistaken for a valid model.
pub struct ModelProvisioner {
    model_id: String,
    artifact_url: String,
    models_dir: PathBuf,
}

impl ModelProvisioner {
    #[inline]
    pub fn new(model_id: impl Into<String>, artifact_url: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            artifact_url: artifact_url.into(),
            models_dir: default_models_dir(),
        }
    }

    #[inline]
    pub fn with_models_dir(mut self, models_dir: PathBuf) -> Self {
        self.models_dir = models_dir;
        self
    }

    /// Where the artifact lives once provisioned.
    #[inline]
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_id).join(MODEL_FILE_NAME)
    }

    /// Whether the artifact is already on disk.
    #[inline]
    pub fn is_provisioned(&self) -> bool {
        self.model_path().is_file()
    }

    /// Return the cached artifact path, downloading it first if absent.
    /// Download failures propagate as `ModelUnavailable`.
    #[inline]
    pub async fn ensure_model(&self, progress: Option<ProgressCallback>) -> Result<PathBuf> {
        let target = self.model_path();
        if target.is_file() {
            debug!("Model {} already provisioned", self.model_id);
            return Ok(target);
        }

        info!(
            "Downloading model {} from {}",
            self.model_id, self.artifact_url
        );

        let url = self.artifact_url.clone();
        let download_target = target.clone();
        tokio::task::spawn_blocking(move || download_artifact(&url, &download_target, progress))
            .await
            .map_err(|e| {
                if e.is_cancelled() {
                    StoreError::Cancelled
                } else {
                    StoreError::ModelUnavailable(anyhow!(e))
                }
            })?
            .map_err(StoreError::ModelUnavailable)?;

        info!("Model {} provisioned at {}", self.model_id, target.display());
        Ok(target)
    }

    /// A progress callback rendering an indicatif bar on attended
    /// terminals, and nothing otherwise.
    #[inline]
    pub fn terminal_progress() -> ProgressCallback {
        let bar = if console::user_attended_stderr() {
            ProgressBar::no_length().with_style(
                ProgressStyle::with_template("{spinner} {bytes}/{total_bytes} ({percent}%) {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_message("downloading model");

        Arc::new(move |downloaded, total, _pct| {
            if total > 0 && bar.length() != Some(total) {
                bar.set_length(total);
            }
            bar.set_position(downloaded);
            if total > 0 && downloaded >= total {
                bar.finish_and_clear();
            }
        })
    }
}

/// Stream the artifact to a temp file, fsync, then rename into place.
fn download_artifact(
    url: &str,
    target: &Path,
    progress: Option<ProgressCallback>,
) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create model directory {}", parent.display()))?;
    }

    let agent = ureq::Agent::new_with_defaults();
    let mut response = agent
        .get(url)
        .call()
        .with_context(|| format!("request to {url} failed"))?;

    let total: u64 = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let temp_path = target.with_extension("onnx.tmp");
    let result = stream_to_file(&temp_path, response.body_mut().as_reader(), total, progress);

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    std::fs::rename(&temp_path, target).context("cannot move downloaded model into place")?;
    Ok(())
}

fn stream_to_file(
    temp_path: &Path,
    mut reader: impl Read,
    total: u64,
    progress: Option<ProgressCallback>,
) -> anyhow::Result<()> {
    let mut file = std::fs::File::create(temp_path)
        .with_context(|| format!("cannot create {}", temp_path.display()))?;

    let mut buffer = [0u8; DOWNLOAD_BUFFER_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        let n = reader.read(&mut buffer).context("download stream failed")?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).context("write failed")?;
        downloaded += n as u64;

        if let Some(callback) = &progress {
            let percent = if total > 0 {
                downloaded as f64 * 100.0 / total as f64
            } else {
                0.0
            };
            callback(downloaded, total, percent);
        }
    }

    if total > 0 && downloaded < total {
        warn!("Download ended early: {} of {} bytes", downloaded, total);
        return Err(anyhow!(
            "short download: got {downloaded} of {total} bytes"
        ));
    }

    file.sync_all().context("fsync failed")?;
    Ok(())
}
