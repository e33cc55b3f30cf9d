//! Signed, expiring file URLs and the multipart form reader used by upload pages.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use metrics::counter;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, warn};

use jobboard_blob::content_type_for;

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::session::CurrentUser;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is malformed")]
    Malformed,
    #[error("link has expired")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
    #[error("failed to initialize signer")]
    Key,
}

/// HMAC-SHA256 signer for `/files/{key}?expires=..&sig=..` links.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Arc<[u8]>,
    ttl_secs: i64,
}

impl UrlSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            secret: Arc::from(secret),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn sign(&self, key: &str, now: DateTime<Utc>) -> Result<String, SignatureError> {
        let expires = now.timestamp().saturating_add(self.ttl_secs);
        let sig = hex::encode(self.mac(key, expires)?);
        Ok(format!("/files/{key}?expires={expires}&sig={sig}"))
    }

    /// Signs an optional stored reference, as held by users, jobs and applications.
    pub fn sign_optional(&self, key: Option<&str>, now: DateTime<Utc>) -> Option<String> {
        key.filter(|key| !key.is_empty())
            .and_then(|key| self.sign(key, now).ok())
    }

    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        sig: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let provided = hex::decode(sig).map_err(|_| SignatureError::Malformed)?;
        let expected = self.mac(key, expires)?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(SignatureError::Mismatch);
        }
        if now.timestamp() >= expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn mac(&self, key: &str, expires: i64) -> Result<Vec<u8>, SignatureError> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|_| SignatureError::Key)?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    #[serde(default)]
    expires: Option<i64>,
    #[serde(default)]
    sig: Option<String>,
}

pub async fn download(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(key): Path<String>,
    Query(query): Query<FileQuery>,
) -> Response {
    let key = key.trim_start_matches('/');
    let (Some(expires), Some(sig)) = (query.expires, query.sig.as_deref()) else {
        counter!("file_downloads_total", "result" => "unsigned").increment(1);
        return ProblemResponse::invalid_link("missing signature").into_response();
    };

    if let Err(err) = state.signer().verify(key, expires, sig, state.now()) {
        counter!("file_downloads_total", "result" => "bad_signature").increment(1);
        warn!(stage = "files", key, error = %err, "rejected file link");
        return ProblemResponse::invalid_link(err.to_string()).into_response();
    }

    match state.service().open_file(current.actor, key).await {
        Ok(blob) => {
            counter!("file_downloads_total", "result" => "ok").increment(1);
            let content_type = blob
                .content_type
                .unwrap_or_else(|| content_type_for(key).to_string());
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CACHE_CONTROL, "private, max-age=300")
                .body(Body::from(blob.bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => {
            counter!("file_downloads_total", "result" => "denied").increment(1);
            if err.domain().is_none() {
                error!(stage = "files", key, error = %err, "failed to load file");
            }
            ProblemResponse::from_service(&err).into_response()
        }
    }
}

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Text fields and files of a submitted multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen.
                    if !filename.is_empty() && !bytes.is_empty() {
                        form.files.insert(
                            name,
                            UploadedFile {
                                filename,
                                bytes: bytes.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// A text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// A text field as submitted, empty when absent.
    pub fn raw(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn parts(url: &str) -> (String, i64, String) {
        let (path, query) = url.split_once('?').expect("query");
        let key = path.trim_start_matches("/files/").to_string();
        let params: HashMap<String, String> =
            serde_urlencoded::from_str(query).expect("query decodes");
        (
            key,
            params["expires"].parse().expect("expires"),
            params["sig"].clone(),
        )
    }

    #[test]
    fn signed_links_verify_until_expiry() {
        let signer = UrlSigner::new(b"secret", 900);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (key, expires, sig) = parts(&signer.sign("resumes/1/abc-cv.pdf", now).expect("sign"));

        assert_eq!(key, "resumes/1/abc-cv.pdf");
        assert_eq!(signer.verify(&key, expires, &sig, now), Ok(()));
        assert_eq!(
            signer.verify(&key, expires, &sig, now + Duration::seconds(900)),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn tampering_is_detected() {
        let signer = UrlSigner::new(b"secret", 900);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let (key, expires, sig) = parts(&signer.sign("resumes/1/abc-cv.pdf", now).expect("sign"));

        assert_eq!(
            signer.verify("resumes/2/abc-cv.pdf", expires, &sig, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            signer.verify(&key, expires + 3600, &sig, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            signer.verify(&key, expires, "zz", now),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            UrlSigner::new(b"other", 900).verify(&key, expires, &sig, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn optional_keys_sign_only_when_present() {
        let signer = UrlSigner::new(b"secret", 900);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert!(signer.sign_optional(None, now).is_none());
        assert!(signer.sign_optional(Some(""), now).is_none());
        assert!(signer
            .sign_optional(Some("logos/1/x.png"), now)
            .expect("signed")
            .starts_with("/files/logos/1/x.png?expires="));
    }
}
