use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::{Blob, BlobError};

/// Client for an S3-style HTTP object store addressed as `{base}/{bucket}/{key}`.
#[derive(Clone)]
pub struct RemoteStore {
    http: Client,
    base_url: Url,
    bucket: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: Url, bucket: impl Into<String>, token: Option<String>, http: Client) -> Self {
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            bucket: bucket.into(),
            token,
        }
    }

    pub async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), BlobError> {
        let response = self
            .request(Method::PUT, key)?
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        ensure_success(response).await.map(|_| ())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Blob>, BlobError> {
        let response = self.request(Method::GET, key)?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Some(Blob {
            bytes,
            content_type,
        }))
    }

    pub async fn delete(&self, key: &str) -> Result<bool, BlobError> {
        let response = self.request(Method::DELETE, key)?.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(response).await.map(|_| true)
    }

    fn request(&self, method: Method, key: &str) -> Result<RequestBuilder, BlobError> {
        let url = self.base_url.join(&format!("{}/{key}", self.bucket))?;
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, BlobError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(BlobError::Status { status, body });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method as MockMethod;

    fn store(server: &MockServer, token: Option<&str>) -> RemoteStore {
        let base = Url::parse(&server.url("/storage")).expect("url");
        RemoteStore::new(
            base,
            "jobboard",
            token.map(str::to_string),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn put_sends_bytes_with_bearer_token() {
        let server = MockServer::start_async().await;
        let store = store(&server, Some("secret"));

        let mock = server
            .mock_async(|when, then| {
                when.method(MockMethod::PUT)
                    .path("/storage/jobboard/resumes/7/cv.pdf")
                    .header("Authorization", "Bearer secret")
                    .header("Content-Type", "application/pdf")
                    .body("%PDF-1.4");
                then.status(201);
            })
            .await;

        store
            .put("resumes/7/cv.pdf", b"%PDF-1.4", "application/pdf")
            .await
            .expect("upload");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_returns_body_and_content_type() {
        let server = MockServer::start_async().await;
        let store = store(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/storage/jobboard/logos/acme.png");
                then.status(200)
                    .header("Content-Type", "image/png")
                    .body("png-bytes");
            })
            .await;

        let blob = store
            .get("logos/acme.png")
            .await
            .expect("download")
            .expect("exists");
        assert_eq!(blob.bytes, b"png-bytes".to_vec());
        assert_eq!(blob.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn missing_objects_are_none() {
        let server = MockServer::start_async().await;
        let store = store(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/storage/jobboard/logos/missing.png");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(MockMethod::DELETE)
                    .path("/storage/jobboard/logos/missing.png");
                then.status(404);
            })
            .await;

        assert!(store.get("logos/missing.png").await.expect("request").is_none());
        assert!(!store.delete("logos/missing.png").await.expect("request"));
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let store = store(&server, None);

        server
            .mock_async(|when, then| {
                when.method(MockMethod::PUT).path("/storage/jobboard/resumes/1/cv.pdf");
                then.status(403).body("forbidden");
            })
            .await;

        let err = store
            .put("resumes/1/cv.pdf", b"data", "application/pdf")
            .await
            .expect_err("should error");
        match err {
            BlobError::Status { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
