//! Local filesystem object store.
//!
//! Mirrors bucket/key layout on disk for development and testing.
//! Production deployments should use `S3ObjectStore`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {bucket}/
//!     ├── uploaded/         # Files waiting to be parsed
//!     │   └── products.csv
//!     └── parsed/           # Fully processed files
//! ```

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::ObjectLocation;
use crate::storage::{ObjectReader, ObjectStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root_dir: PathBuf,
}

impl LocalObjectStore {
    /// Create a new LocalObjectStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a location, refusing keys that escape the bucket.
    pub fn path(&self, location: &ObjectLocation) -> Result<PathBuf> {
        let relative = Path::new(&location.key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if location.bucket.is_empty() || location.bucket.contains('/') || escapes {
            return Err(AppError::invalid_input(format!(
                "Unsupported object location {location}"
            )));
        }
        Ok(self.root_dir.join(&location.bucket).join(relative))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write an object, creating parent directories.
    pub async fn put(&self, location: &ObjectLocation, bytes: &[u8]) -> Result<()> {
        let path = self.path(location)?;
        self.ensure_dir(&path).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn exists(&self, location: &ObjectLocation) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(location)?).await?)
    }
}

fn not_found_or_io(location: &ObjectLocation, err: std::io::Error) -> AppError {
    if err.kind() == std::io::ErrorKind::NotFound {
        AppError::not_found(&location.bucket, &location.key)
    } else {
        AppError::Io(err)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn open(&self, location: &ObjectLocation) -> Result<ObjectReader> {
        let path = self.path(location)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(location, e))?;
        Ok(Box::pin(file))
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        let source = self.path(from)?;
        let dest = self.path(to)?;
        self.ensure_dir(&dest).await?;
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| not_found_or_io(from, e))?;
        log::debug!("Copied {} to {}", from, to);
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        let path = self.path(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => log::debug!("Deleted {}", location),
            // Same as S3: deleting a missing key is not an error
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Delete of missing {} ignored", location)
            }
            Err(e) => return Err(AppError::Io(e)),
        }
        Ok(())
    }
}
