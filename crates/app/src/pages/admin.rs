use axum::{
    extract::{Path, State},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use jobboard_core::{ApplicationScope, JobFilter, NewUser, Role, UserId, UserUpdate};

use super::views::{
    AdminDashboardPage, AdminUserFormPage, AdminUsersPage, ApplicationRow, ApplicationsPage,
    CountRow, JobCard, JobListPage, RoleOption, UserRow,
};
use super::{layout, redirect_with, render, PageError, PageResult};
use crate::flash::Flash;
use crate::router::AppState;
use crate::session::CurrentUser;

/// Authentication first, then the admin role.
fn require_admin(current: &CurrentUser) -> Result<(), PageError> {
    let principal = current
        .actor
        .authenticated()
        .map_err(|err| PageError::from_service(err.into(), "/"))?;
    if principal.is_admin() {
        Ok(())
    } else {
        Err(PageError::redirect(
            "/",
            Flash::danger("You do not have permission to access this page."),
        ))
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> PageResult {
    let stats = state
        .service()
        .dashboard_stats(current.actor)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let (jar, layout) = layout("Admin dashboard", &current, jar);
    render(
        jar,
        AdminDashboardPage {
            layout,
            total_users: stats.total_users(),
            total_jobs: stats.jobs,
            total_applications: stats.total_applications(),
            users_by_role: stats
                .users
                .iter()
                .map(|entry| CountRow {
                    label: entry.role.label(),
                    count: entry.count,
                })
                .collect(),
            applications_by_status: stats
                .applications
                .iter()
                .map(|entry| CountRow {
                    label: entry.status.label(),
                    count: entry.count,
                })
                .collect(),
        },
    )
}

pub async fn users(State(state): State<AppState>, current: CurrentUser, jar: CookieJar) -> PageResult {
    let users = state
        .service()
        .list_users(current.actor)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let me = current.actor.user_id();
    let (jar, layout) = layout("Users", &current, jar);
    render(
        jar,
        AdminUsersPage {
            layout,
            users: users.iter().map(|user| UserRow::new(user, me)).collect(),
            roles: RoleOption::all(),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct NewUserForm {
    username: String,
    email: String,
    password: String,
    role: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Form(form): Form<NewUserForm>,
) -> PageResult {
    let back = "/admin/users";
    require_admin(&current)?;
    let role = form
        .role
        .parse::<Role>()
        .map_err(|err| PageError::from_service(err.into(), back))?;

    let user = state
        .service()
        .create_user(
            current.actor,
            NewUser {
                username: form.username,
                email: form.email,
                password: form.password,
                role,
                profile_picture: None,
            },
        )
        .await
        .map_err(|err| PageError::from_service(err, back))?;

    redirect_with(
        jar,
        back,
        vec![Flash::success(format!("User {} has been created.", user.username))],
    )
}

pub async fn edit_user_form(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<UserId>,
) -> PageResult {
    require_admin(&current)?;
    let user = state
        .service()
        .get_user(id)
        .await
        .map_err(|err| PageError::from_service(err, "/admin/users"))?
        .ok_or_else(|| PageError::NotFound("User not found".to_string()))?;

    let (jar, layout) = layout("Edit user", &current, jar);
    render(
        jar,
        AdminUserFormPage {
            layout,
            id: user.id,
            username: user.username,
            email: user.email,
            roles: RoleOption::all_selecting(user.role),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct EditUserForm {
    username: String,
    email: String,
    role: String,
    #[serde(default)]
    password: String,
}

pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<UserId>,
    Form(form): Form<EditUserForm>,
) -> PageResult {
    let back = format!("/admin/users/{id}/edit");
    require_admin(&current)?;
    let role = form
        .role
        .parse::<Role>()
        .map_err(|err| PageError::from_service(err.into(), &back))?;
    // Blank keeps the current password.
    let password = Some(form.password).filter(|password| !password.is_empty());

    let user = state
        .service()
        .update_user(
            current.actor,
            id,
            UserUpdate {
                username: Some(form.username),
                email: Some(form.email),
                password,
                role: Some(role),
                profile_picture: None,
            },
        )
        .await
        .map_err(|err| PageError::from_service(err, &back))?;

    redirect_with(
        jar,
        "/admin/users",
        vec![Flash::success(format!("User {} has been updated.", user.username))],
    )
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<UserId>,
) -> PageResult {
    state
        .service()
        .delete_user(current.actor, id)
        .await
        .map_err(|err| PageError::from_service(err, "/admin/users"))?;

    redirect_with(
        jar,
        "/admin/users",
        vec![Flash::success("User has been deleted.")],
    )
}

pub async fn jobs(State(state): State<AppState>, current: CurrentUser, jar: CookieJar) -> PageResult {
    require_admin(&current)?;
    let jobs = state
        .service()
        .list_jobs(JobFilter::default())
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("All jobs", &current, jar);
    render(
        jar,
        JobListPage {
            layout,
            heading: "All job postings".to_string(),
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

pub async fn applications(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> PageResult {
    let applications = state
        .service()
        .list_application_details(current.actor, ApplicationScope::All)
        .await
        .map_err(|err| PageError::from_service(err, "/"))?;

    let now = state.now();
    let (jar, layout) = layout("All applications", &current, jar);
    render(
        jar,
        ApplicationsPage {
            layout,
            heading: "All applications".to_string(),
            applications: applications
                .iter()
                .map(|details| ApplicationRow::new(details, state.signer(), now))
                .collect(),
            show_applicant: true,
            can_review: true,
        },
    )
}
