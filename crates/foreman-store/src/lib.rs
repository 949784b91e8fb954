//! Task-file persistence for the Foreman scheduler.
//!
//! The orchestrator persists each task payload when a specification is
//! loaded so operators can inspect and audit the work plan. Persistence is a
//! collaborator behind the [`TaskStore`] trait; the scheduling core never
//! touches the filesystem directly.
//!
//! # Main types
//!
//! - [`TaskStore`] — The persistence seam injected into the engine.
//! - [`FileTaskStore`] — JSON files on disk, one per task id.

use async_trait::async_trait;
use foreman_core::{ForemanError, ForemanResult};
use std::path::PathBuf;

/// Persistence seam for task payloads.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Write the payload for `task_id` and return the storage path.
    async fn persist(&self, task_id: &str, payload: &serde_json::Value)
        -> ForemanResult<PathBuf>;

    /// Read back the payload for `task_id`, if present.
    async fn load(&self, task_id: &str) -> ForemanResult<Option<serde_json::Value>>;

    /// List the ids of all persisted tasks.
    async fn list(&self) -> ForemanResult<Vec<String>>;
}

/// File-based task store (JSON files on disk). Good enough for MVP.
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: PathBuf) -> ForemanResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn task_path(&self, task_id: &str) -> PathBuf {
        // Task ids are caller-supplied; keep them from escaping the store dir.
        let safe: String = task_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn persist(
        &self,
        task_id: &str,
        payload: &serde_json::Value,
    ) -> ForemanResult<PathBuf> {
        let path = self.task_path(task_id);
        let json = serde_json::to_string_pretty(payload)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    async fn load(&self, task_id: &str) -> ForemanResult<Option<serde_json::Value>> {
        let path = self.task_path(task_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let payload = serde_json::from_str(&data)
            .map_err(|e| ForemanError::Store(format!("Failed to parse task file: {e}")))?;
        Ok(Some(payload))
    }

    async fn list(&self) -> ForemanResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
