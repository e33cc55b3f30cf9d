use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use jobboard_blob::BlobStore;
use jobboard_storage::Database;
use jobboard_util::AppConfig;

use crate::files::{self, UrlSigner};
use crate::graphql::{self, JobBoardSchema};
use crate::service::{Clock, JobBoard};
use crate::session::SessionManager;
use crate::{pages, telemetry};

/// Headroom for multipart framing and the text fields sent next to a file.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    service: JobBoard,
    sessions: SessionManager,
    signer: UrlSigner,
    schema: JobBoardSchema,
    clock: Clock,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, db: Database, files: BlobStore, config: &AppConfig) -> Self {
        let clock: Clock = Arc::new(Utc::now);
        let secret = config.session_secret.as_bytes();
        let service = JobBoard::new(db, files, clock.clone(), config.max_upload_bytes);
        let signer = UrlSigner::new(secret, config.signed_url_ttl_secs);
        let schema = graphql::build_schema(service.clone(), signer.clone(), clock.clone());
        Self {
            metrics,
            service,
            sessions: SessionManager::new(
                secret,
                config.session_ttl_secs,
                config.environment.is_production(),
            ),
            signer,
            schema,
            clock,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Replaces the clock and rebuilds everything that reads it.
    #[cfg(test)]
    pub fn with_clock(mut self, service: JobBoard, clock: Clock) -> Self {
        self.schema = graphql::build_schema(service.clone(), self.signer.clone(), clock.clone());
        self.service = service;
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn service(&self) -> &JobBoard {
        &self.service
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    pub fn schema(&self) -> &JobBoardSchema {
        &self.schema
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);
    Router::new()
        .merge(pages::routes())
        .merge(graphql::routes())
        .route("/files/*key", get(files::download))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
