//! Server-rendered pages backed by the job board service.

mod admin;
mod auth;
mod employer;
mod jobs;
pub mod views;

use askama::Template;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;

use jobboard_core::DomainError;

use crate::flash::{self, Flash};
use crate::router::AppState;
use crate::service::{ServiceError, ServiceResult};
use crate::session::CurrentUser;

use self::views::{ErrorPage, Layout};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::index))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/profile", get(auth::profile).post(auth::update_profile))
        .route("/jobs/list", get(jobs::list))
        .route("/jobs/new", get(employer::new_job_form).post(employer::create_job))
        .route("/jobs/apply/:id", get(jobs::apply_form).post(jobs::apply))
        .route("/jobs/:id", get(jobs::detail))
        .route("/jobs/:id/edit", get(employer::edit_job_form).post(employer::update_job))
        .route("/jobs/:id/delete", post(employer::delete_job))
        .route("/jobs/:id/applications", get(employer::job_applications))
        .route("/applications/:id/update", post(employer::update_status))
        .route("/my_applications", get(jobs::my_applications))
        .route("/my_jobs", get(employer::my_jobs))
        .route("/admin", get(admin::dashboard))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/new", post(admin::create_user))
        .route("/admin/users/:id/edit", get(admin::edit_user_form).post(admin::update_user))
        .route("/admin/users/:id/delete", post(admin::delete_user))
        .route("/admin/jobs", get(admin::jobs))
        .route("/admin/applications", get(admin::applications))
}

pub type PageResult = Result<Response, PageError>;

/// Ways a page request ends without rendering its own template.
#[derive(Debug)]
pub enum PageError {
    Redirect { to: String, flashes: Vec<Flash> },
    NotFound(String),
    Internal,
}

impl PageError {
    pub fn redirect(to: impl Into<String>, flash: Flash) -> Self {
        Self::Redirect {
            to: to.into(),
            flashes: vec![flash],
        }
    }

    pub fn login_required() -> Self {
        Self::redirect("/login", Flash::info("Please login to access this page."))
    }

    /// Maps a service failure; validation and conflict messages return to `back`.
    pub fn from_service(err: ServiceError, back: &str) -> Self {
        match err {
            ServiceError::Domain(DomainError::Authentication(_)) => Self::login_required(),
            ServiceError::Domain(DomainError::Authorization(message)) => {
                Self::redirect("/", Flash::danger(message))
            }
            ServiceError::Domain(DomainError::Validation(messages)) => Self::Redirect {
                to: back.to_string(),
                flashes: messages.into_iter().map(Flash::danger).collect(),
            },
            ServiceError::Domain(DomainError::Conflict(message)) => {
                Self::redirect(back, Flash::new(flash::Level::Warning, message))
            }
            ServiceError::Domain(DomainError::NotFound(message)) => Self::NotFound(message),
            other => {
                error!(stage = "pages", error = %other, "request failed");
                Self::Internal
            }
        }
    }

    pub fn bad_form(err: MultipartError, back: &str) -> Self {
        Self::redirect(back, Flash::danger(format!("Could not read the form: {err}")))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            Self::Redirect { to, flashes } => {
                let jar = flash::push(CookieJar::new(), flashes);
                (jar, Redirect::to(&to)).into_response()
            }
            Self::NotFound(message) => error_page(StatusCode::NOT_FOUND, message),
            Self::Internal => error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong. Please try again later.".to_string(),
            ),
        }
    }
}

fn error_page(status: StatusCode, message: String) -> Response {
    let page = ErrorPage {
        layout: Layout::new(
            status.canonical_reason().unwrap_or("Error"),
            &CurrentUser::anonymous(),
            Vec::new(),
        ),
        status: status.as_u16(),
        message,
    };
    match page.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(_) => status.into_response(),
    }
}

/// Consumes pending flash messages into a page layout.
pub fn layout(title: &str, current: &CurrentUser, jar: CookieJar) -> (CookieJar, Layout) {
    let (jar, flashes) = flash::take(jar);
    (jar, Layout::new(title, current, flashes))
}

pub fn render<T: Template>(jar: CookieJar, template: T) -> PageResult {
    let body = template.render().map_err(|err| {
        error!(stage = "pages", error = %err, "failed to render template");
        PageError::Internal
    })?;
    Ok((jar, Html(body)).into_response())
}

/// Passes `result` through, deleting `upload` first when the submission it was stored for failed.
pub async fn discard_upload_on_error<T>(
    state: &AppState,
    upload: Option<&str>,
    result: ServiceResult<T>,
) -> ServiceResult<T> {
    if let (Err(_), Some(key)) = (&result, upload) {
        state.service().discard_upload(key).await;
    }
    result
}

/// Redirects with flash messages appended to the jar.
pub fn redirect_with(jar: CookieJar, to: &str, flashes: Vec<Flash>) -> PageResult {
    Ok((flash::push(jar, flashes), Redirect::to(to)).into_response())
}
