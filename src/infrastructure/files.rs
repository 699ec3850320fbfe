//! Local-disk FileStore
//!
//! References are paths relative to a root directory; anything that would
//! escape the root is refused.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use log::debug;

use crate::application::ports::{FileStore, FileStoreError};

pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, FileStoreError> {
        let relative = Path::new(reference);
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if reference.is_empty() || escapes {
            return Err(FileStoreError {
                path: reference.to_string(),
                message: "reference must be a relative path inside the store".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, reference: &str) -> bool {
        match self.resolve(reference) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete(&self, reference: &str) -> Result<(), FileStoreError> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted file {}", path.display());
                Ok(())
            }
            // Already gone is as good as deleted
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileStoreError {
                path: reference.to_string(),
                message: e.to_string(),
            }),
        }
    }
}
