use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;

use crate::{content_type_for, Blob, BlobError};

/// Stores files below a root directory, one file per key.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Blob>, BlobError> {
        match fs::read(self.root.join(key)).await {
            Ok(bytes) => Ok(Some(Blob {
                bytes,
                content_type: Some(content_type_for(key).to_string()),
            })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        match fs::remove_file(self.root.join(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
