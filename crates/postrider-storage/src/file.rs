//! Blob storage for attachment content

use async_trait::async_trait;
use postrider_common::config::StorageConfig;
use postrider_common::{Error, Result};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Blob storage trait.
///
/// Attachment bytes are stored under generated keys; the key doubles
/// as the durable handle kept on the attachment record.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store a blob and return its handle
    async fn store(&self, path: &str, data: &[u8]) -> Result<String>;

    /// Read a blob
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete a blob
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if a blob exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Get blob size
    async fn size(&self, path: &str) -> Result<u64>;
}

/// Local filesystem storage
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage instance from config
    pub fn new(config: &StorageConfig) -> Result<Self> {
        Self::from_path(&config.path)
    }

    /// Create a new local storage instance from a path
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        // Ensure base directory exists
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("Failed to create storage directory: {}", e)))?;

        info!(path = %path.display(), "Initialized local blob storage");

        Ok(Self {
            base_path: path.to_path_buf(),
        })
    }

    /// Get full path for a relative path, with path traversal protection
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        if path.contains("..") {
            return Err(Error::Storage(
                "Path traversal detected: '..' is not allowed".to_string(),
            ));
        }

        if path.starts_with('/') || path.starts_with('\\') {
            return Err(Error::Storage("Absolute paths are not allowed".to_string()));
        }

        let full = self.base_path.join(path);

        let canonical_base = self
            .base_path
            .canonicalize()
            .map_err(|e| Error::Storage(format!("Failed to canonicalize base path: {}", e)))?;

        // For new files the leaf does not exist yet, so canonicalize the
        // closest existing ancestor instead.
        let canonical_full = if full.exists() {
            full.canonicalize()
                .map_err(|e| Error::Storage(format!("Failed to canonicalize path: {}", e)))?
        } else if let Some(parent) = full.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize().map_err(|e| {
                    Error::Storage(format!("Failed to canonicalize parent path: {}", e))
                })?;
                match full.file_name() {
                    Some(filename) => canonical_parent.join(filename),
                    None => return Err(Error::Storage("Invalid file path".to_string())),
                }
            } else {
                full.clone()
            }
        } else {
            full.clone()
        };

        if !canonical_full.starts_with(&canonical_base) {
            return Err(Error::Storage(
                "Path traversal detected: resolved path is outside storage directory".to_string(),
            ));
        }

        Ok(full)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_exists(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn store(&self, path: &str, data: &[u8]) -> Result<String> {
        let full_path = self.full_path(path)?;
        self.ensure_parent_exists(&full_path).await?;

        let mut file = fs::File::create(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create file: {}", e)))?;

        file.write_all(data)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write file: {}", e)))?;

        debug!(path = %path, size = data.len(), "Stored blob");

        Ok(path.to_string())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;

        let mut file = fs::File::open(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to open file: {}", e)))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read file: {}", e)))?;

        Ok(data)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;

        fs::remove_file(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to delete file: {}", e)))?;

        debug!(path = %path, "Deleted blob");

        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(full_path.exists())
    }

    async fn size(&self, path: &str) -> Result<u64> {
        let full_path = self.full_path(path)?;

        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to get file metadata: {}", e)))?;

        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::from_path(temp_dir.path()).unwrap();

        let data = b"%PDF-1.4 fake report";
        let path = storage
            .store("email_attachments/report.pdf", data)
            .await
            .unwrap();
        assert_eq!(path, "email_attachments/report.pdf");

        assert!(storage.exists("email_attachments/report.pdf").await.unwrap());
        assert!(!storage.exists("email_attachments/other.pdf").await.unwrap());

        let read_data = storage.read("email_attachments/report.pdf").await.unwrap();
        assert_eq!(read_data, data);

        let size = storage.size("email_attachments/report.pdf").await.unwrap();
        assert_eq!(size, data.len() as u64);

        storage.delete("email_attachments/report.pdf").await.unwrap();
        assert!(!storage.exists("email_attachments/report.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_prevention() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::from_path(temp_dir.path()).unwrap();

        assert!(storage.store("../../../etc/passwd", b"evil").await.is_err());
        assert!(storage.read("../../../etc/passwd").await.is_err());
        assert!(storage.delete("../../sensitive").await.is_err());
        assert!(storage.exists("../outside").await.is_err());

        assert!(storage.store("/etc/passwd", b"evil").await.is_err());
        assert!(storage.read("/etc/shadow").await.is_err());

        assert!(storage
            .store("email_attachments/safe.pdf", b"ok")
            .await
            .is_ok());
    }
}
