//! Local file-based inventory backend.
//!
//! This module provides a simple file-based persistence for local
//! development and single-machine portals.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{InventoryError, Result, TerradeckError};

use super::backend::StorageBackend;

/// Default inventory directory name.
pub const INVENTORY_DIR: &str = ".terradeck";

/// Inventory file name.
pub const INVENTORY_FILE: &str = "inventory.json";

/// Local file-based inventory backend.
#[derive(Debug)]
pub struct LocalBackend {
    /// Path to the inventory file.
    path: PathBuf,
}

impl LocalBackend {
    /// Creates a local backend with the default path under the current
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new() -> Result<Self> {
        let path = std::env::current_dir()
            .map_err(|e| TerradeckError::internal(format!("Cannot determine current directory: {e}")))?
            .join(INVENTORY_DIR)
            .join(INVENTORY_FILE);
        Ok(Self { path })
    }

    /// Creates a local backend for a specific inventory file path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the inventory file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensures the parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                debug!("Creating inventory directory: {}", parent.display());
                fs::create_dir_all(parent).await.map_err(|e| {
                    TerradeckError::Inventory(InventoryError::backend(format!(
                        "Failed to create inventory directory: {e}"
                    )))
                })?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            debug!("Inventory file does not exist: {}", self.path.display());
            return Ok(None);
        }

        info!("Loading inventory from: {}", self.path.display());

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::Corrupted {
                message: format!("Failed to read inventory file: {e}"),
            })
        })?;

        Ok(Some(content))
    }

    async fn save(&self, content: &str) -> Result<()> {
        self.ensure_dir().await?;

        debug!("Saving inventory to: {}", self.path.display());

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::backend(format!(
                "Failed to create temp inventory file: {e}"
            )))
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::backend(format!(
                "Failed to write inventory file: {e}"
            )))
        })?;

        file.sync_all().await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::backend(format!(
                "Failed to sync inventory file: {e}"
            )))
        })?;

        // Atomic rename
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            TerradeckError::Inventory(InventoryError::backend(format!(
                "Failed to rename inventory file: {e}"
            )))
        })?;

        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (LocalBackend, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = LocalBackend::with_path(temp_dir.path().join("inventory.json"));
        (backend, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (backend, _temp) = create_test_backend();

        backend.save("{\"resources\":[]}").await.expect("Failed to save");

        let loaded = backend
            .load()
            .await
            .expect("Failed to load")
            .expect("Document should exist");

        assert_eq!(loaded, "{\"resources\":[]}");
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (backend, _temp) = create_test_backend();

        let result = backend.load().await.expect("Load should not fail");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_exists() {
        let (backend, _temp) = create_test_backend();

        assert!(!backend.exists().await.expect("exists check failed"));

        backend.save("{}").await.expect("Failed to save");

        assert!(backend.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let backend = LocalBackend::with_path(temp_dir.path().join("nested/deep/inventory.json"));

        backend.save("{}").await.expect("Failed to save");
        assert!(backend.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let (backend, _temp) = create_test_backend();

        backend.save("{}").await.expect("Failed to save");
        assert!(!backend.path().with_extension("tmp").exists());
    }
}
