//! Local catalog cache

use crate::Catalog;
use lspkg_errors::{Error, StorageError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Catalog cache manager
#[derive(Debug, Clone)]
pub struct RegistryCache {
    cache_dir: PathBuf,
}

impl RegistryCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the cached catalog file
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.cache_dir.join("registry.json")
    }

    /// Load the catalog from cache
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` when nothing is cached and `InvalidCatalog` when
    /// the cached file does not parse.
    pub async fn load(&self) -> Result<Catalog, Error> {
        let path = self.catalog_path();

        let content = fs::read(&path).await.map_err(|_e| StorageError::PathNotFound {
            path: path.display().to_string(),
        })?;

        Catalog::from_bytes(&content)
    }

    /// Save the catalog to cache
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or the file cannot be written.
    pub async fn save(&self, catalog: &Catalog) -> Result<(), Error> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| StorageError::IoError {
                message: format!("failed to create cache dir: {e}"),
            })?;

        let path = self.catalog_path();
        let json = catalog.to_json()?;

        // Write to temporary file first
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .await
            .map_err(|e| StorageError::IoError {
                message: format!("failed to write cache: {e}"),
            })?;

        fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::AtomicRenameFailed {
                message: format!("failed to rename cache file: {e}"),
            }
        })?;

        tracing::debug!(path = %path.display(), packages = catalog.len(), "saved registry cache");
        Ok(())
    }

    /// Check if cache exists
    pub async fn exists(&self) -> bool {
        fs::metadata(self.catalog_path()).await.is_ok()
    }

    /// Time since the cache was last written, `None` when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the modification time cannot be read.
    pub async fn age(&self) -> Result<Option<Duration>, Error> {
        match fs::metadata(self.catalog_path()).await {
            Ok(metadata) => {
                let modified = metadata.modified().map_err(|e| StorageError::IoError {
                    message: format!("failed to get modification time: {e}"),
                })?;

                let age = std::time::SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default();

                Ok(Some(age))
            }
            Err(_) => Ok(None),
        }
    }

    /// Missing or older than `max_age`
    ///
    /// # Errors
    ///
    /// Returns an error if the modification time cannot be read.
    pub async fn is_stale(&self, max_age: Duration) -> Result<bool, Error> {
        Ok(self.age().await?.is_none_or(|age| age > max_age))
    }

    /// Clear the cache
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), Error> {
        match fs::remove_file(self.catalog_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, self.catalog_path())),
        }
    }
}
