//! Template structs and the display rows they render.

use askama::Template;
use chrono::{DateTime, Utc};

use jobboard_core::{ApplicationStatus, Job, Role, User};
use jobboard_storage::{ApplicationDetails, CategoryCount};

use crate::flash::Flash;
use crate::files::UrlSigner;
use crate::session::CurrentUser;

/// Navigation state shared by every page.
pub struct Layout {
    pub title: String,
    pub signed_in: bool,
    pub username: String,
    pub is_admin: bool,
    pub is_employer: bool,
    pub is_seeker: bool,
    pub flashes: Vec<Flash>,
}

impl Layout {
    pub fn new(title: impl Into<String>, current: &CurrentUser, flashes: Vec<Flash>) -> Self {
        let role = current.actor.role();
        Self {
            title: title.into(),
            signed_in: current.user.is_some(),
            username: current
                .user
                .as_ref()
                .map(|user| user.username.clone())
                .unwrap_or_default(),
            is_admin: role == Some(Role::Admin),
            is_employer: role.is_some_and(Role::can_post_jobs),
            is_seeker: role == Some(Role::JobSeeker),
            flashes,
        }
    }
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %d, %Y").to_string()
}

pub struct JobCard {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub category: String,
    pub salary: String,
    pub posted: String,
    pub logo_url: String,
    pub summary: String,
}

impl JobCard {
    pub fn new(job: &Job, signer: &UrlSigner, now: DateTime<Utc>) -> Self {
        let mut summary: String = job.description.chars().take(160).collect();
        if job.description.chars().count() > 160 {
            summary.push_str("...");
        }
        Self {
            id: job.id,
            title: job.title.clone(),
            company: job.company.clone(),
            location: job.location.clone(),
            category: job.category.clone(),
            salary: job.salary.clone().unwrap_or_default(),
            posted: format_date(job.posted_at),
            logo_url: signer
                .sign_optional(job.company_logo.as_deref(), now)
                .unwrap_or_default(),
            summary,
        }
    }
}

pub struct ApplicationRow {
    pub id: i64,
    pub job_id: i64,
    pub job_title: String,
    pub job_company: String,
    pub job_location: String,
    pub applicant: String,
    pub applicant_email: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub applied: String,
    pub resume_url: String,
    pub statuses: Vec<StatusOption>,
}

impl ApplicationRow {
    pub fn new(details: &ApplicationDetails, signer: &UrlSigner, now: DateTime<Utc>) -> Self {
        let application = &details.application;
        Self {
            id: application.id,
            job_id: application.job_id,
            job_title: details.job_title.clone(),
            job_company: details.job_company.clone(),
            job_location: details.job_location.clone(),
            applicant: details.applicant_username.clone(),
            applicant_email: details.applicant_email.clone(),
            status: application.status.as_str(),
            status_label: application.status.label(),
            applied: format_date(application.applied_at),
            resume_url: signer
                .sign_optional(application.resume_path.as_deref(), now)
                .unwrap_or_default(),
            statuses: StatusOption::all(application.status),
        }
    }
}

pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl StatusOption {
    fn all(current: ApplicationStatus) -> Vec<Self> {
        ApplicationStatus::ALL
            .into_iter()
            .map(|status| Self {
                value: status.as_str(),
                label: status.label(),
                selected: status == current,
            })
            .collect()
    }
}

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: &'static str,
    pub joined: String,
    pub is_self: bool,
}

impl UserRow {
    pub fn new(user: &User, current: Option<i64>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.label(),
            joined: format_date(user.created_at),
            is_self: current == Some(user.id),
        }
    }
}

pub struct RoleOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

impl RoleOption {
    pub fn for_registration() -> Vec<Self> {
        [Role::JobSeeker, Role::Employer]
            .into_iter()
            .map(Self::from)
            .collect()
    }

    pub fn all() -> Vec<Self> {
        Role::ALL.into_iter().map(Self::from).collect()
    }

    pub fn all_selecting(current: Role) -> Vec<Self> {
        Role::ALL
            .into_iter()
            .map(|role| Self {
                selected: role == current,
                ..Self::from(role)
            })
            .collect()
    }
}

impl From<Role> for RoleOption {
    fn from(role: Role) -> Self {
        Self {
            value: role.as_str(),
            label: role.label(),
            selected: false,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub layout: Layout,
    pub jobs: Vec<JobCard>,
    pub categories: Vec<CategoryCount>,
}

#[derive(Template)]
#[template(path = "jobs.html")]
pub struct JobListPage {
    pub layout: Layout,
    pub heading: String,
    pub jobs: Vec<JobCard>,
    pub location: String,
    pub category: String,
    pub company: String,
    pub show_filters: bool,
    pub manage: bool,
}

#[derive(Template)]
#[template(path = "job_detail.html")]
pub struct JobDetailPage {
    pub layout: Layout,
    pub job: JobCard,
    pub description: String,
    pub can_manage: bool,
    pub can_apply: bool,
    pub has_applied: bool,
    pub application_count: i64,
}

#[derive(Template)]
#[template(path = "job_form.html")]
pub struct JobFormPage {
    pub layout: Layout,
    pub heading: String,
    pub action: String,
    pub title: String,
    pub description: String,
    pub salary: String,
    pub location: String,
    pub category: String,
    pub company: String,
    pub submit_label: String,
}

#[derive(Template)]
#[template(path = "apply.html")]
pub struct ApplyPage {
    pub layout: Layout,
    pub job: JobCard,
}

#[derive(Template)]
#[template(path = "applications.html")]
pub struct ApplicationsPage {
    pub layout: Layout,
    pub heading: String,
    pub applications: Vec<ApplicationRow>,
    pub show_applicant: bool,
    pub can_review: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub layout: Layout,
    pub next: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage {
    pub layout: Layout,
    pub roles: Vec<RoleOption>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub role: &'static str,
    pub picture_url: String,
}

#[derive(Template)]
#[template(path = "admin_users.html")]
pub struct AdminUsersPage {
    pub layout: Layout,
    pub users: Vec<UserRow>,
    pub roles: Vec<RoleOption>,
}

#[derive(Template)]
#[template(path = "admin_user_form.html")]
pub struct AdminUserFormPage {
    pub layout: Layout,
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<RoleOption>,
}

pub struct CountRow {
    pub label: &'static str,
    pub count: i64,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
pub struct AdminDashboardPage {
    pub layout: Layout,
    pub total_users: i64,
    pub total_jobs: i64,
    pub total_applications: i64,
    pub users_by_role: Vec<CountRow>,
    pub applications_by_status: Vec<CountRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub layout: Layout,
    pub status: u16,
    pub message: String,
}
