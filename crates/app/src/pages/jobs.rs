use axum::extract::{Multipart, Path, Query, State};
use axum_extra::extract::cookie::CookieJar;

use jobboard_core::{policy, ApplicationScope, JobFilter, JobId, Role, UploadKind};

use super::views::{
    ApplicationRow, ApplicationsPage, ApplyPage, IndexPage, JobCard, JobDetailPage, JobListPage,
};
use super::{discard_upload_on_error, layout, redirect_with, render, PageError, PageResult};
use crate::files::FormData;
use crate::flash::Flash;
use crate::router::AppState;
use crate::session::CurrentUser;

pub async fn index(State(state): State<AppState>, current: CurrentUser, jar: CookieJar) -> PageResult {
    let service = state.service();
    let jobs = service
        .featured_jobs()
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;
    let categories = service
        .job_categories()
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("Home", &current, jar);
    render(
        jar,
        IndexPage {
            layout,
            jobs: jobs
                .iter()
                .map(|job| JobCard::new(job, state.signer(), now))
                .collect(),
            categories,
        },
    )
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Query(filter): Query<JobFilter>,
) -> PageResult {
    let filter = filter.normalized();
    let jobs = state
        .service()
        .list_jobs(filter.clone())
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("Jobs", &current, jar);
    render(
        jar,
        JobListPage {
            layout,
            heading: "Browse jobs".to_string(),
            jobs: jobs
                .iter()
                .map(|job| JobCard::new(job, state.signer(), now))
                .collect(),
            location: filter.location.unwrap_or_default(),
            category: filter.category.unwrap_or_default(),
            company: filter.company.unwrap_or_default(),
            show_filters: true,
            manage: false,
        },
    )
}

pub async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
) -> PageResult {
    let service = state.service();
    let job = service
        .get_job(id)
        .await
        .map_err(|err| PageError::from_service(err, "/jobs/list"))?
        .ok_or_else(|| PageError::NotFound("Job not found".to_string()))?;

    let principal = current.actor.principal();
    let can_manage = principal.is_some_and(|p| p.is_admin() || p.user_id == job.poster_id);
    let can_apply = current.actor.role() == Some(Role::JobSeeker);
    let has_applied = service
        .has_applied(current.actor, job.id)
        .await
        .map_err(|err| PageError::from_service(err, "/jobs/list"))?;
    let application_count = if can_manage {
        service
            .application_count(job.id)
            .await
            .map_err(|err| PageError::from_service(err, "/jobs/list"))?
    } else {
        0
    };

    let (jar, layout) = layout(&job.title, &current, jar);
    render(
        jar,
        JobDetailPage {
            layout,
            job: JobCard::new(&job, state.signer(), state.now()),
            description: job.description.clone(),
            can_manage,
            can_apply,
            has_applied,
            application_count,
        },
    )
}

pub async fn apply_form(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
) -> PageResult {
    let back = format!("/jobs/{id}");
    let principal = current
        .actor
        .principal()
        .ok_or_else(PageError::login_required)?;
    if principal.role != Role::JobSeeker {
        return Err(PageError::redirect(
            "/",
            Flash::danger("Only job seekers can apply for jobs"),
        ));
    }

    let service = state.service();
    let job = service
        .get_job(id)
        .await
        .map_err(|err| PageError::from_service(err, &back))?
        .ok_or_else(|| PageError::NotFound("Job not found".to_string()))?;
    if service
        .has_applied(current.actor, job.id)
        .await
        .map_err(|err| PageError::from_service(err, &back))?
    {
        return redirect_with(
            jar,
            &back,
            vec![Flash::info("You have already applied to this job.")],
        );
    }

    let (jar, layout) = layout("Apply", &current, jar);
    render(
        jar,
        ApplyPage {
            layout,
            job: JobCard::new(&job, state.signer(), state.now()),
        },
    )
}

pub async fn apply(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<JobId>,
    multipart: Multipart,
) -> PageResult {
    let back = format!("/jobs/apply/{id}");
    let mut form = FormData::read(multipart)
        .await
        .map_err(|err| PageError::bad_form(err, &back))?;
    let service = state.service();

    // Nothing is stored on behalf of callers who may not apply.
    policy::authorize_application_submission(current.actor)
        .map_err(|err| PageError::from_service(err.into(), &back))?;
    if service
        .has_applied(current.actor, id)
        .await
        .map_err(|err| PageError::from_service(err, &back))?
    {
        return redirect_with(
            jar,
            &format!("/jobs/{id}"),
            vec![Flash::info("You have already applied to this job.")],
        );
    }

    let resume_path = match form.take_file("resume") {
        Some(file) => Some(
            service
                .store_upload(current.actor, UploadKind::Resume, &file.filename, &file.bytes)
                .await
                .map_err(|err| PageError::from_service(err, &back))?,
        ),
        None => None,
    };

    let result = service
        .create_application(current.actor, id, resume_path.clone())
        .await;
    let application = discard_upload_on_error(&state, resume_path.as_deref(), result)
        .await
        .map_err(|err| PageError::from_service(err, &back))?;

    redirect_with(
        jar,
        &format!("/jobs/{}", application.job_id),
        vec![Flash::success("Your application has been submitted!")],
    )
}

pub async fn my_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> PageResult {
    let applications = state
        .service()
        .list_application_details(current.actor, ApplicationScope::Mine)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("My applications", &current, jar);
    render(
        jar,
        ApplicationsPage {
            layout,
            heading: "My applications".to_string(),
            applications: applications
                .iter()
                .map(|details| ApplicationRow::new(details, state.signer(), now))
                .collect(),
            show_applicant: false,
            can_review: false,
        },
    )
}
