//! Storage for uploaded files: resumes, company logos and profile pictures.

pub mod local;
pub mod remote;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub use local::LocalStore;
pub use remote::RemoteStore;

/// Contents of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// File store selected at start-up.
#[derive(Clone)]
pub enum BlobStore {
    Local(LocalStore),
    Remote(RemoteStore),
}

impl BlobStore {
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        validate_key(key)?;
        debug!(stage = "blob", backend = self.backend(), key, size = bytes.len(), "storing file");
        match self {
            Self::Local(store) => store.put(key, bytes).await,
            Self::Remote(store) => store.put(key, bytes, content_type_for(key)).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Blob>, BlobError> {
        validate_key(key)?;
        match self {
            Self::Local(store) => store.get(key).await,
            Self::Remote(store) => store.get(key).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        validate_key(key)?;
        match self {
            Self::Local(store) => store.delete(key).await,
            Self::Remote(store) => store.delete(key).await,
        }
    }
}

/// Errors produced by the file stores.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Builds a unique key `{prefix}/{owner}/{random}-{name}` for an upload.
pub fn object_key(prefix: &str, owner: i64, filename: &str) -> String {
    let name = sanitize_filename(filename);
    let token = Uuid::new_v4().simple().to_string();
    format!("{prefix}/{owner}/{}-{name}", &token[..12])
}

/// Reduces a client supplied file name to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Rejects keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), BlobError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        });
    if valid {
        Ok(())
    } else {
        Err(BlobError::InvalidKey(key.to_string()))
    }
}

pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}
