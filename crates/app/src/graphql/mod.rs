//! GraphQL facade over the job board service.

mod mutation;
mod query;
pub mod types;

use async_graphql::{
    http::GraphiQLSource, Context, EmptySubscription, ErrorExtensions, ID, Schema,
};
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use metrics::counter;
use tracing::error;

use jobboard_core::{Actor, DomainError};

use crate::files::UrlSigner;
use crate::router::AppState;
use crate::service::{Clock, JobBoard, ServiceError};
use crate::session::CurrentUser;

pub use mutation::MutationRoot;
pub use query::QueryRoot;

pub type JobBoardSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

const MAX_QUERY_DEPTH: usize = 10;

/// Schema-wide data available to every resolver.
pub struct GraphQLContext {
    pub service: JobBoard,
    signer: UrlSigner,
    clock: Clock,
}

impl GraphQLContext {
    pub fn sign(&self, key: Option<&str>) -> Option<String> {
        self.signer.sign_optional(key, (self.clock)())
    }
}

pub fn build_schema(service: JobBoard, signer: UrlSigner, clock: Clock) -> JobBoardSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(GraphQLContext {
            service,
            signer,
            clock,
        })
        .limit_depth(MAX_QUERY_DEPTH)
        .finish()
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/graphql", get(graphiql).post(execute))
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn execute(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let kind = if request.query.trim_start().starts_with("mutation") {
        "mutation"
    } else {
        "query"
    };
    counter!("graphql_requests_total", "kind" => kind).increment(1);
    Json(state.schema().execute(request.data(current.actor)).await)
}

pub(crate) fn board<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a GraphQLContext> {
    ctx.data::<GraphQLContext>()
}

/// The caller attached to the request; anonymous when none was attached.
pub(crate) fn actor(ctx: &Context<'_>) -> Actor {
    ctx.data_opt::<Actor>().copied().unwrap_or_default()
}

/// Parses a numeric id; anything else names no record.
pub(crate) fn parse_id(id: &ID) -> Option<i64> {
    id.0.trim().parse().ok()
}

/// Query errors carry the failure category in `extensions.code`.
pub(crate) fn to_graphql_error(err: ServiceError) -> async_graphql::Error {
    let (code, message) = match err.domain() {
        Some(domain) => (domain.code(), domain.to_string()),
        None => {
            error!(stage = "graphql", error = %err, "resolver failed");
            ("INTERNAL", "Internal server error".to_string())
        }
    };
    async_graphql::Error::new(message).extend_with(|_, extensions| extensions.set("code", code))
}

/// Mutation payloads list messages instead of raising.
pub(crate) fn error_messages(err: ServiceError) -> Vec<String> {
    match err {
        ServiceError::Domain(domain) => domain.messages(),
        other => {
            error!(stage = "graphql", error = %other, "mutation failed");
            vec!["Internal server error".to_string()]
        }
    }
}

pub(crate) fn not_found(what: &str) -> ServiceError {
    DomainError::not_found(format!("{what} not found")).into()
}
