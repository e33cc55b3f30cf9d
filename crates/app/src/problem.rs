//! `application/problem+json` bodies for the non-page endpoints (file downloads, session rejections).

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use jobboard_core::DomainError;

use crate::service::ServiceError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    status: u16,
    code: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type: "about:blank",
                title: status.canonical_reason().unwrap_or("Error"),
                status: status.as_u16(),
                code,
                detail: detail.into(),
                errors: Vec::new(),
            },
        }
    }

    /// A file link that is unsigned, expired or tampered with.
    pub fn invalid_link(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "INVALID_LINK", detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", detail)
    }

    /// Maps a domain failure to its status; infrastructure errors stay opaque.
    pub fn from_service(err: &ServiceError) -> Self {
        let Some(domain) = err.domain() else {
            return Self::internal("Something went wrong");
        };
        let status = match domain {
            DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Authentication(_) => StatusCode::UNAUTHORIZED,
            DomainError::Authorization(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
        };
        let mut problem = Self::new(status, domain.code(), domain.to_string());
        if let DomainError::Validation(messages) = domain {
            problem.body.errors = messages.clone();
        }
        problem
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
