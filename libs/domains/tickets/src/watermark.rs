//! Sync watermark persistence.
//!
//! The watermark is the `updated_at` of the newest ticket whose processing is
//! settled. It is read once at the start of a run and saved at most once at the end.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{IndexerError, IndexerResult};
use crate::repository::ChunkRepository;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Last saved watermark, `None` before the first successful run
    async fn load(&self) -> IndexerResult<Option<DateTime<Utc>>>;

    async fn save(&self, watermark: DateTime<Utc>) -> IndexerResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkFile {
    last_synced_at: DateTime<Utc>,
    written_at: DateTime<Utc>,
}

/// Watermark kept in a small JSON file
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No watermark file yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: WatermarkFile = serde_json::from_str(&contents).map_err(|e| {
            IndexerError::Internal(format!(
                "Corrupt watermark file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(file.last_synced_at))
    }

    async fn save(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&WatermarkFile {
            last_synced_at: watermark,
            written_at: Utc::now(),
        })?;

        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(path = %self.path.display(), watermark = %watermark, "Saved watermark");
        Ok(())
    }
}

/// Watermark kept in the destination store's sync state table
///
/// Lives next to the chunk rows, so a fresh database starts a full resync.
pub struct StoreWatermark {
    repository: Arc<dyn ChunkRepository>,
}

impl StoreWatermark {
    pub fn new(repository: Arc<dyn ChunkRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl WatermarkStore for StoreWatermark {
    async fn load(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        self.repository.load_sync_watermark().await
    }

    async fn save(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        self.repository.save_sync_watermark(watermark).await?;
        info!(watermark = %watermark, "Saved watermark to store");
        Ok(())
    }
}

/// In-process watermark, for tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct InMemoryWatermarkStore {
    value: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl InMemoryWatermarkStore {
    pub fn new(initial: Option<DateTime<Utc>>) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.value.lock().map(|v| *v).unwrap_or(None)
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn load(&self) -> IndexerResult<Option<DateTime<Utc>>> {
        Ok(self.get())
    }

    async fn save(&self, watermark: DateTime<Utc>) -> IndexerResult<()> {
        let mut value = self
            .value
            .lock()
            .map_err(|_| IndexerError::Internal("watermark lock poisoned".to_string()))?;
        *value = Some(watermark);
        Ok(())
    }
}
