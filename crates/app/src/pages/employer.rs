use axum::{
    extract::{Multipart, Path, State},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use jobboard_core::{
    policy, ApplicationId, ApplicationScope, Job, JobId, JobInput, JobUpdate, UploadKind,
};

use super::views::{ApplicationRow, ApplicationsPage, JobCard, JobFormPage, JobListPage, Layout};
use super::{discard_upload_on_error, layout, redirect_with, render, PageError, PageResult};
use crate::files::FormData;
use crate::flash::Flash;
use crate::router::AppState;
use crate::session::CurrentUser;

pub async fn my_jobs(State(state): State<AppState>, current: CurrentUser, jar: CookieJar) -> PageResult {
    let jobs = state
        .service()
        .my_jobs(current.actor)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("My jobs", &current, jar);
    render(
        jar,
        JobListPage {
            layout,
            heading: "My job postings".to_string(),
            jobs: jobs
                .iter()
                .map(|job| JobCard::new(job, state.signer(), now))
                .collect(),
            location: String::new(),
            category: String::new(),
            company: String::new(),
            show_filters: false,
            manage: true,
        },
    )
}

fn job_form(layout: Layout, heading: &str, action: String, job: Option<&Job>) -> JobFormPage {
    JobFormPage {
        layout,
        heading: heading.to_string(),
        action,
        title: job.map(|job| job.title.clone()).unwrap_or_default(),
        description: job.map(|job| job.description.clone()).unwrap_or_default(),
        salary: job.and_then(|job| job.salary.clone()).unwrap_or_default(),
        location: job.map(|job| job.location.clone()).unwrap_or_default(),
        category: job.map(|job| job.category.clone()).unwrap_or_default(),
        company: job.map(|job| job.company.clone()).unwrap_or_default(),
        submit_label: if job.is_some() { "Update job" } else { "Post job" }.to_string(),
    }
}

pub async fn new_job_form(current: CurrentUser, jar: CookieJar) -> PageResult {
    policy::authorize_job_creation(current.actor)
        .map_err(|err| PageError::from_service(err.into(), "/"))?;
    let (jar, layout) = layout("Post a job", &current, jar);
    render(
        jar,
        job_form(layout, "Post a new job", "/jobs/new".to_string(), None),
    )
}

async fn store_logo(
    state: &AppState,
    current: &CurrentUser,
    form: &mut FormData,
    back: &str,
) -> Result<Option<String>, PageError> {
    let Some(file) = form.take_file("company_logo") else {
        return Ok(None);
    };
    state
        .service()
        .store_upload(current.actor, UploadKind::CompanyLogo, &file.filename, &file.bytes)
        .await
        .map(Some)
        .map_err(|err| PageError::from_service(err, back))
}

pub async fn create_job(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let back = "/jobs/new";
    policy::authorize_job_creation(current.actor)
        .map_err(|err| PageError::from_service(err.into(), back))?;
    let mut form = FormData::read(multipart)
        .await
        .map_err(|err| PageError::bad_form(err, back))?;
    let company_logo = store_logo(&state, &current, &mut form, back).await?;

    let input = JobInput {
        title: form.raw("title"),
        description: form.raw("description"),
        salary: form.text("salary"),
        location: form.raw("location"),
        category: form.raw("category"),
        company: form.raw("company"),
        company_logo: company_logo.clone(),
    };
    let result = state.service().create_job(current.actor, input, None).await;
    let job = discard_upload_on_error(&state, company_logo.as_deref(), result)
        .await
        .map_err(|err| PageError::from_service(err, back))?;

    redirect_with(
        jar,
        &format!("/jobs/{}", job.id),
        vec![Flash::success("Your job has been posted!")],
    )
}

/// Loads a posting the caller may edit.
async fn editable_job(state: &AppState, current: &CurrentUser, id: JobId) -> Result<Job, PageError> {
    let job = state
        .service()
        .get_job(id)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?
        .ok_or_else(|| PageError::NotFound("Job not found".to_string()))?;
    policy::authorize_job_action(current.actor, &job, policy::JobAction::Update)
        .map_err(|err| PageError::from_service(err.into(), "/"))?;
    Ok(job)
}

pub async fn edit_job_form(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
) -> PageResult {
    let job = editable_job(&state, &current, id).await?;
    let (jar, layout) = layout("Edit job", &current, jar);
    render(
        jar,
        job_form(layout, "Edit job", format!("/jobs/{id}/edit"), Some(&job)),
    )
}

pub async fn update_job(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
    multipart: Multipart,
) -> PageResult {
    let back = format!("/jobs/{id}/edit");
    editable_job(&state, &current, id).await?;
    let mut form = FormData::read(multipart)
        .await
        .map_err(|err| PageError::bad_form(err, &back))?;
    let company_logo = store_logo(&state, &current, &mut form, &back).await?;

    // The form always submits every field; a blank salary clears it.
    let update = JobUpdate {
        title: Some(form.raw("title")),
        description: Some(form.raw("description")),
        salary: Some(form.raw("salary")),
        location: Some(form.raw("location")),
        category: Some(form.raw("category")),
        company: Some(form.raw("company")),
        company_logo: company_logo.clone(),
    };
    let result = state.service().update_job(current.actor, id, update).await;
    discard_upload_on_error(&state, company_logo.as_deref(), result)
        .await
        .map_err(|err| PageError::from_service(err, &back))?;

    redirect_with(
        jar,
        &format!("/jobs/{id}"),
        vec![Flash::success("Your job has been updated!")],
    )
}

pub async fn delete_job(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
) -> PageResult {
    state
        .service()
        .delete_job(current.actor, id)
        .await
        .map_err(|err| PageError::from_service(err, &format!("/jobs/{id}")))?;

    let to = if current.actor.is_admin() { "/admin/jobs" } else { "/my_jobs" };
    redirect_with(jar, to, vec![Flash::success("Your job has been deleted!")])
}

pub async fn job_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
) -> PageResult {
    let service = state.service();
    let applications = service
        .list_application_details(current.actor, ApplicationScope::ForJob(id))
        .await
        .map_err(|err| PageError::from_service(err, &format!("/jobs/{id}")))?;
    let job = service
        .get_job(id)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?
        .ok_or_else(|| PageError::NotFound("Job not found".to_string()))?;

    let now = state.now();
    let (jar, layout) = layout("Applications", &current, jar);
    render(
        jar,
        ApplicationsPage {
            layout,
            heading: format!("Applications for {}", job.title),
            applications: applications
                .iter()
                .map(|details| ApplicationRow::new(details, state.signer(), now))
                .collect(),
            show_applicant: true,
            can_review: true,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<ApplicationId>,
    Form(form): Form<StatusForm>,
) -> PageResult {
    let application = state
        .service()
        .update_application_status(current.actor, id, &form.status)
        .await
        .map_err(|err| PageError::from_service(err, "/my_jobs"))?;

    redirect_with(
        jar,
        &format!("/jobs/{}/applications", application.job_id),
        vec![Flash::success(format!(
            "Application status updated to {}",
            application.status.label()
        ))],
    )
}
