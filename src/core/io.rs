use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Keyed document store scoped to one base directory.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, key: &str, data: &Value) -> Result<()>;
    /// `Ok(None)` when nothing has been saved under `key` yet.
    async fn load(&self, key: &str) -> Result<Option<Value>>;
    async fn write_text(&self, key: &str, content: &str) -> Result<()>;
}

// --- Native Implementation ---

pub struct NativeStorage {
    base_path: PathBuf,
}

impl NativeStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn json_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // File handle is dropped (closed) on every return path.
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn save(&self, key: &str, data: &Value) -> Result<()> {
        let path = self.json_path(key);
        let content = serde_json::to_string_pretty(data)?;
        self.write_file(&path, content.as_bytes()).await?;
        log::info!("[Persistence] Data saved to {}", path.display());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.json_path(key);
        if !tokio::fs::try_exists(&path).await? {
            log::info!("[Persistence] File not found: {}", path.display());
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::info!("[Persistence] Data loaded from {}", path.display());
        Ok(Some(value))
    }

    async fn write_text(&self, key: &str, content: &str) -> Result<()> {
        let path = self.base_path.join(key);
        self.write_file(&path, content.as_bytes()).await
    }
}
