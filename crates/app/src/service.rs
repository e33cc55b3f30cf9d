//! Authorization-checked domain operations shared by the page and GraphQL facades.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use jobboard_blob::{object_key, Blob, BlobError, BlobStore};
use jobboard_core::{
    credential::{self, CredentialError},
    policy::{self, JobAction},
    validation, Actor, Application, ApplicationId, ApplicationScope, ApplicationStatus,
    DomainError, Job, JobFilter, JobId, JobInput, JobUpdate, NewUser, Principal, Role, UploadKind,
    User, UserId, UserUpdate,
};
use jobboard_storage::{
    ApplicationDetails, ApplicationError, ApplicationFilter, CategoryCount, Database, JobError,
    NewApplicationRecord, NewJobRecord, NewUserRecord, RoleCount, StatusCount, UserChanges,
    UserError,
};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Number of postings shown on the landing page.
pub const FEATURED_JOBS: u32 = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("user storage failure: {0}")]
    Users(UserError),
    #[error("job storage failure: {0}")]
    Jobs(JobError),
    #[error("application storage failure: {0}")]
    Applications(ApplicationError),
    #[error("file storage failure: {0}")]
    Files(#[from] BlobError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// The domain error, when this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(err) => Some(err),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::Validation(_)) => "validation",
            Self::Domain(DomainError::Authentication(_)) => "authentication",
            Self::Domain(DomainError::Authorization(_)) => "authorization",
            Self::Domain(DomainError::NotFound(_)) => "not_found",
            Self::Domain(DomainError::Conflict(_)) => "conflict",
            _ => "internal",
        }
    }
}

impl From<UserError> for ServiceError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::DuplicateEmail => DomainError::validation("Email already in use").into(),
            UserError::DuplicateUsername => {
                DomainError::validation("Username already taken").into()
            }
            other => Self::Users(other),
        }
    }
}

impl From<JobError> for ServiceError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Duplicate => {
                DomainError::Conflict("You have already posted this job".to_string()).into()
            }
            JobError::MissingPoster => DomainError::not_found("User not found").into(),
            other => Self::Jobs(other),
        }
    }
}

impl From<ApplicationError> for ServiceError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Duplicate => {
                DomainError::Conflict("You have already applied to this job".to_string()).into()
            }
            ApplicationError::MissingReference => DomainError::not_found("Job not found").into(),
            other => Self::Applications(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Moderation totals for the admin dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub users: Vec<RoleCount>,
    pub jobs: i64,
    pub applications: Vec<StatusCount>,
}

impl DashboardStats {
    pub fn total_users(&self) -> i64 {
        self.users.iter().map(|entry| entry.count).sum()
    }

    pub fn total_applications(&self) -> i64 {
        self.applications.iter().map(|entry| entry.count).sum()
    }
}

// Argon2 runs on the blocking pool.
async fn hash_password(password: String) -> ServiceResult<String> {
    Ok(tokio::task::spawn_blocking(move || credential::hash_password(&password)).await??)
}

async fn verify_password(password: &str, stored_hash: Option<String>) -> ServiceResult<bool> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || {
        credential::verify_password_or_dummy(&password, stored_hash.as_deref())
    })
    .await?)
}

fn record<T>(op: &'static str, result: ServiceResult<T>) -> ServiceResult<T> {
    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.label(),
    };
    counter!("domain_operations_total", "op" => op, "result" => outcome).increment(1);
    if let Err(err) = &result {
        if err.domain().is_none() {
            warn!(stage = "service", op, error = %err, "operation failed");
        }
    }
    result
}

/// The job board's domain operations. Every call takes the acting identity explicitly.
#[derive(Clone)]
pub struct JobBoard {
    db: Database,
    files: BlobStore,
    clock: Clock,
    max_upload_bytes: usize,
}

impl JobBoard {
    pub fn new(db: Database, files: BlobStore, clock: Clock, max_upload_bytes: usize) -> Self {
        Self {
            db,
            files,
            clock,
            max_upload_bytes,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Turns a session's user id into an actor; unknown ids become anonymous.
    pub async fn resolve_user(&self, user_id: UserId) -> ServiceResult<Option<User>> {
        Ok(self.db.users().fetch(user_id).await?)
    }

    // ---- users -------------------------------------------------------------

    pub async fn create_user(&self, actor: Actor, input: NewUser) -> ServiceResult<User> {
        record("create_user", self.create_user_inner(actor, input).await)
    }

    async fn create_user_inner(&self, actor: Actor, input: NewUser) -> ServiceResult<User> {
        policy::authorize_user_creation(actor, input.role)?;
        validation::validate_new_user(&input)?;

        let password_hash = hash_password(input.password.clone()).await?;
        let user = self
            .db
            .users()
            .insert(&NewUserRecord {
                username: input.username.trim(),
                email: input.email.trim(),
                password_hash: &password_hash,
                role: input.role,
                profile_picture: input.profile_picture.as_deref(),
                created_at: self.now(),
            })
            .await?;

        info!(stage = "service", user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Verifies credentials; `identity` is an email address or a username.
    pub async fn authenticate(&self, identity: &str, password: &str) -> ServiceResult<User> {
        let row = self.db.users().fetch_by_identity(identity).await?;
        // Unknown identities still pay for a hash check.
        let stored_hash = row.as_ref().map(|row| row.password_hash.clone());
        let matches = verify_password(password, stored_hash).await?;
        let verified = row.filter(|_| matches);

        let result = match verified {
            Some(row) => Ok(row.into_domain()),
            None => Err(DomainError::Authentication(
                "Invalid email or password".to_string(),
            )
            .into()),
        };
        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("auth_login_total", "result" => outcome).increment(1);
        result
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<Option<User>> {
        Ok(self.db.users().fetch(id).await?)
    }

    pub async fn list_users(&self, actor: Actor) -> ServiceResult<Vec<User>> {
        policy::authorize_user_listing(actor)?;
        Ok(self.db.users().list().await?)
    }

    pub async fn update_user(
        &self,
        actor: Actor,
        id: UserId,
        update: UserUpdate,
    ) -> ServiceResult<User> {
        record("update_user", self.update_user_inner(actor, id, update).await)
    }

    async fn update_user_inner(
        &self,
        actor: Actor,
        id: UserId,
        update: UserUpdate,
    ) -> ServiceResult<User> {
        policy::authorize_user_update(actor, id, update.role.is_some())?;
        validation::validate_user_update(&update)?;
        if let Some(role) = update.role {
            self.check_role_change(id, role).await?;
        }

        let password_hash = match update.password.clone() {
            Some(password) => Some(hash_password(password).await?),
            None => None,
        };
        let changes = UserChanges {
            username: update.username.as_deref().map(str::trim),
            email: update.email.as_deref().map(str::trim),
            password_hash: password_hash.as_deref(),
            role: update.role,
            profile_picture: update.profile_picture.as_deref(),
        };
        self.db
            .users()
            .update(id, &changes)
            .await?
            .ok_or_else(|| DomainError::not_found("User not found").into())
    }

    /// A role change must not strand the user's postings or applications.
    async fn check_role_change(&self, id: UserId, role: Role) -> ServiceResult<()> {
        let Some(current) = self.get_user(id).await? else {
            return Ok(());
        };
        if current.role == role {
            return Ok(());
        }
        if !role.can_post_jobs() && !self.db.jobs().list_by_poster(id).await?.is_empty() {
            return Err(DomainError::validation(
                "Cannot change the role of a user who still owns job postings",
            )
            .into());
        }
        if role != Role::JobSeeker
            && !self
                .db
                .applications()
                .list(ApplicationFilter::Applicant(id))
                .await?
                .is_empty()
        {
            return Err(DomainError::validation(
                "Cannot change the role of a user who has submitted applications",
            )
            .into());
        }
        Ok(())
    }

    /// Admin-only totals of users, postings and applications.
    pub async fn dashboard_stats(&self, actor: Actor) -> ServiceResult<DashboardStats> {
        let principal = actor.authenticated()?;
        if !principal.is_admin() {
            return Err(DomainError::forbidden("Only administrators can view the dashboard").into());
        }
        Ok(DashboardStats {
            users: self.db.users().role_counts().await?,
            jobs: self.db.jobs().count().await?,
            applications: self.db.applications().status_counts().await?,
        })
    }

    /// Removes an account with everything it owns.
    pub async fn delete_user(&self, actor: Actor, id: UserId) -> ServiceResult<()> {
        record("delete_user", self.delete_user_inner(actor, id).await)
    }

    async fn delete_user_inner(&self, actor: Actor, id: UserId) -> ServiceResult<()> {
        let principal = policy::authorize_user_removal(actor, id)?;
        if !self.db.users().delete(id).await? {
            return Err(DomainError::not_found("User not found").into());
        }
        info!(stage = "service", user_id = id, by = principal.user_id, "user deleted");
        Ok(())
    }

    // ---- jobs --------------------------------------------------------------

    pub async fn list_jobs(&self, filter: JobFilter) -> ServiceResult<Vec<Job>> {
        Ok(self.db.jobs().list(&filter.normalized(), None).await?)
    }

    pub async fn featured_jobs(&self) -> ServiceResult<Vec<Job>> {
        Ok(self
            .db
            .jobs()
            .list(&JobFilter::default(), Some(FEATURED_JOBS))
            .await?)
    }

    pub async fn job_categories(&self) -> ServiceResult<Vec<CategoryCount>> {
        Ok(self.db.jobs().category_counts().await?)
    }

    pub async fn get_job(&self, id: JobId) -> ServiceResult<Option<Job>> {
        Ok(self.db.jobs().fetch(id).await?)
    }

    async fn require_job(&self, id: JobId) -> ServiceResult<Job> {
        self.get_job(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Job not found").into())
    }

    /// Postings owned by `user_id`; public, as on the poster's profile.
    pub async fn jobs_posted_by(&self, user_id: UserId) -> ServiceResult<Vec<Job>> {
        Ok(self.db.jobs().list_by_poster(user_id).await?)
    }

    /// The acting employer's own postings.
    pub async fn my_jobs(&self, actor: Actor) -> ServiceResult<Vec<Job>> {
        let principal = actor.authenticated()?;
        if !principal.role.can_post_jobs() {
            return Err(DomainError::forbidden("Only employers can manage job postings").into());
        }
        self.jobs_posted_by(principal.user_id).await
    }

    pub async fn application_count(&self, job_id: JobId) -> ServiceResult<i64> {
        Ok(self.db.applications().count_for_job(job_id).await?)
    }

    /// Posts a job owned by the actor, or by `owner` when an admin posts on someone's behalf.
    pub async fn create_job(
        &self,
        actor: Actor,
        input: JobInput,
        owner: Option<UserId>,
    ) -> ServiceResult<Job> {
        record("create_job", self.create_job_inner(actor, input, owner).await)
    }

    async fn create_job_inner(
        &self,
        actor: Actor,
        input: JobInput,
        owner: Option<UserId>,
    ) -> ServiceResult<Job> {
        let principal = policy::authorize_job_creation(actor)?;
        let poster_id = self.resolve_job_owner(principal, owner).await?;
        let input = validation::validate_job_input(input)?;

        let job = self
            .db
            .jobs()
            .insert(&NewJobRecord {
                title: input.title.trim(),
                description: input.description.trim(),
                salary: input.salary.as_deref(),
                location: input.location.trim(),
                category: input.category.trim(),
                company: input.company.trim(),
                company_logo: input.company_logo.as_deref(),
                posted_at: self.now(),
                poster_id,
            })
            .await?;

        info!(stage = "service", job_id = job.id, poster_id, "job posted");
        Ok(job)
    }

    async fn resolve_job_owner(
        &self,
        principal: Principal,
        owner: Option<UserId>,
    ) -> ServiceResult<UserId> {
        let Some(owner) = owner.filter(|owner| *owner != principal.user_id) else {
            return Ok(principal.user_id);
        };
        if !principal.is_admin() {
            return Err(DomainError::forbidden(
                "Only administrators can post jobs for another user",
            )
            .into());
        }
        let user = self
            .get_user(owner)
            .await?
            .ok_or_else(|| DomainError::not_found("User not found"))?;
        if !user.role.can_post_jobs() {
            return Err(DomainError::validation("Job owner must be an employer or admin").into());
        }
        Ok(user.id)
    }

    pub async fn update_job(&self, actor: Actor, id: JobId, update: JobUpdate) -> ServiceResult<Job> {
        record("update_job", self.update_job_inner(actor, id, update).await)
    }

    async fn update_job_inner(
        &self,
        actor: Actor,
        id: JobId,
        update: JobUpdate,
    ) -> ServiceResult<Job> {
        actor.authenticated()?;
        let job = self.require_job(id).await?;
        policy::authorize_job_action(actor, &job, JobAction::Update)?;
        let update = validation::validate_job_update(update)?;

        self.db
            .jobs()
            .update(&update.apply_to(&job))
            .await?
            .ok_or_else(|| DomainError::not_found("Job not found").into())
    }

    /// Deletes a posting together with its applications.
    pub async fn delete_job(&self, actor: Actor, id: JobId) -> ServiceResult<()> {
        record("delete_job", self.delete_job_inner(actor, id).await)
    }

    async fn delete_job_inner(&self, actor: Actor, id: JobId) -> ServiceResult<()> {
        actor.authenticated()?;
        let job = self.require_job(id).await?;
        let principal = policy::authorize_job_action(actor, &job, JobAction::Delete)?;
        if !self.db.jobs().delete(id).await? {
            return Err(DomainError::not_found("Job not found").into());
        }
        info!(stage = "service", job_id = id, by = principal.user_id, "job deleted");
        Ok(())
    }

    // ---- applications ------------------------------------------------------

    pub async fn create_application(
        &self,
        actor: Actor,
        job_id: JobId,
        resume_path: Option<String>,
    ) -> ServiceResult<Application> {
        record(
            "create_application",
            self.create_application_inner(actor, job_id, resume_path).await,
        )
    }

    async fn create_application_inner(
        &self,
        actor: Actor,
        job_id: JobId,
        resume_path: Option<String>,
    ) -> ServiceResult<Application> {
        let principal = policy::authorize_application_submission(actor)?;
        let job = self.require_job(job_id).await?;

        if self
            .db
            .applications()
            .find(job.id, principal.user_id)
            .await?
            .is_some()
        {
            return Err(
                DomainError::Conflict("You have already applied to this job".to_string()).into(),
            );
        }

        let resume_path = resume_path
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty());
        if let Some(path) = &resume_path {
            validation::check_upload_extension(UploadKind::Resume, path)?;
            check_resume_owner(path, principal.user_id)?;
        }

        // The unique index still guards against a concurrent duplicate.
        let application = self
            .db
            .applications()
            .insert(&NewApplicationRecord {
                job_id: job.id,
                applicant_id: principal.user_id,
                status: ApplicationStatus::Pending,
                resume_path: resume_path.as_deref(),
                applied_at: self.now(),
            })
            .await?;

        info!(
            stage = "service",
            application_id = application.id,
            job_id = job.id,
            applicant_id = principal.user_id,
            "application submitted"
        );
        Ok(application)
    }

    /// Returns `None` for unknown ids; otherwise requires applicant, job owner or admin.
    pub async fn get_application(
        &self,
        actor: Actor,
        id: ApplicationId,
    ) -> ServiceResult<Option<Application>> {
        actor.authenticated()?;
        let Some(application) = self.db.applications().fetch(id).await? else {
            return Ok(None);
        };
        let job = self.require_job(application.job_id).await?;
        policy::authorize_application_view(actor, &application, &job)?;
        Ok(Some(application))
    }

    pub async fn update_application_status(
        &self,
        actor: Actor,
        id: ApplicationId,
        status: &str,
    ) -> ServiceResult<Application> {
        record(
            "update_application_status",
            self.update_status_inner(actor, id, status).await,
        )
    }

    async fn update_status_inner(
        &self,
        actor: Actor,
        id: ApplicationId,
        status: &str,
    ) -> ServiceResult<Application> {
        actor.authenticated()?;
        let application = self.require_application(id).await?;
        let job = self.require_job(application.job_id).await?;
        policy::authorize_status_change(actor, &job)?;
        let status: ApplicationStatus = status.parse()?;

        let updated = self
            .db
            .applications()
            .update_status(application.id, status)
            .await?
            .ok_or_else(|| DomainError::not_found("Application not found"))?;
        info!(stage = "service", application_id = id, status = %status, "application status changed");
        Ok(updated)
    }

    pub async fn delete_application(&self, actor: Actor, id: ApplicationId) -> ServiceResult<()> {
        record("delete_application", self.delete_application_inner(actor, id).await)
    }

    async fn delete_application_inner(&self, actor: Actor, id: ApplicationId) -> ServiceResult<()> {
        actor.authenticated()?;
        let application = self.require_application(id).await?;
        let job = self.require_job(application.job_id).await?;
        policy::authorize_application_removal(actor, &application, &job)?;
        if !self.db.applications().delete(id).await? {
            return Err(DomainError::not_found("Application not found").into());
        }
        Ok(())
    }

    async fn require_application(&self, id: ApplicationId) -> ServiceResult<Application> {
        self.db
            .applications()
            .fetch(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Application not found").into())
    }

    pub async fn list_applications(
        &self,
        actor: Actor,
        scope: ApplicationScope,
    ) -> ServiceResult<Vec<Application>> {
        let filter = self.authorize_scope(actor, scope).await?;
        Ok(self.db.applications().list(filter).await?)
    }

    /// Same as [`Self::list_applications`], joined with job and applicant names.
    pub async fn list_application_details(
        &self,
        actor: Actor,
        scope: ApplicationScope,
    ) -> ServiceResult<Vec<ApplicationDetails>> {
        let filter = self.authorize_scope(actor, scope).await?;
        Ok(self.db.applications().list_details(filter).await?)
    }

    /// Applications submitted by `user_id`, visible to that user and admins.
    pub async fn applications_of(
        &self,
        actor: Actor,
        user_id: UserId,
    ) -> ServiceResult<Vec<Application>> {
        let principal = actor.authenticated()?;
        if principal.user_id != user_id && !principal.is_admin() {
            return Err(DomainError::forbidden("Not authorized to view these applications").into());
        }
        Ok(self
            .db
            .applications()
            .list(ApplicationFilter::Applicant(user_id))
            .await?)
    }

    async fn authorize_scope(
        &self,
        actor: Actor,
        scope: ApplicationScope,
    ) -> ServiceResult<ApplicationFilter> {
        let principal = actor.authenticated()?;
        let job = match scope {
            ApplicationScope::ForJob(job_id) => Some(self.require_job(job_id).await?),
            _ => None,
        };
        policy::authorize_application_listing(actor, scope, job.as_ref())?;
        Ok(match scope {
            ApplicationScope::Mine => ApplicationFilter::Applicant(principal.user_id),
            ApplicationScope::ForJob(job_id) => ApplicationFilter::Job(job_id),
            ApplicationScope::All => ApplicationFilter::Everything,
        })
    }

    /// Whether the actor already applied; anonymous callers never have.
    pub async fn has_applied(&self, actor: Actor, job_id: JobId) -> ServiceResult<bool> {
        let Some(user_id) = actor.user_id() else {
            return Ok(false);
        };
        Ok(self
            .db
            .applications()
            .find(job_id, user_id)
            .await?
            .is_some())
    }

    // ---- files -------------------------------------------------------------

    /// Validates and stores an upload, returning its storage key.
    pub async fn store_upload(
        &self,
        actor: Actor,
        kind: UploadKind,
        filename: &str,
        bytes: &[u8],
    ) -> ServiceResult<String> {
        let principal = actor.authenticated()?;
        validation::check_upload_extension(kind, filename)?;
        if bytes.is_empty() {
            return Err(DomainError::validation("Uploaded file is empty").into());
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(DomainError::validation(format!(
                "File is too large. Maximum size is {} MB",
                self.max_upload_bytes / (1024 * 1024)
            ))
            .into());
        }

        let key = object_key(kind.prefix(), principal.user_id, filename);
        self.files.put(&key, bytes).await?;
        info!(stage = "service", key = %key, size = bytes.len(), "file stored");
        Ok(key)
    }

    /// Loads a stored file. Resumes are restricted to the applicant, the job owner and admins.
    pub async fn open_file(&self, actor: Actor, key: &str) -> ServiceResult<Blob> {
        let kind = UploadKind::from_key(key).ok_or_else(|| DomainError::not_found("File not found"))?;
        if !kind.is_public() {
            self.authorize_resume(actor, key).await?;
        }
        self.files
            .get(key)
            .await?
            .ok_or_else(|| DomainError::not_found("File not found").into())
    }

    async fn authorize_resume(&self, actor: Actor, key: &str) -> ServiceResult<()> {
        let principal = actor.authenticated()?;
        if principal.is_admin() {
            return Ok(());
        }
        // A key can be attached to several applications; any one that grants access suffices.
        for application in self.db.applications().list_by_resume(key).await? {
            let job = self.require_job(application.job_id).await?;
            if policy::authorize_application_view(actor, &application, &job).is_ok() {
                return Ok(());
            }
        }
        Err(DomainError::forbidden("You do not have permission to access this resume").into())
    }

    /// Best-effort removal of an upload whose form submission failed.
    pub async fn discard_upload(&self, key: &str) {
        match self.files.delete(key).await {
            Ok(_) => info!(stage = "service", key, "upload discarded"),
            Err(err) => warn!(stage = "service", key, error = %err, "failed to discard upload"),
        }
    }
}

/// Resumes must be keys this applicant uploaded: `resumes/<user id>/<name>`.
fn check_resume_owner(path: &str, user_id: UserId) -> Result<(), DomainError> {
    let own_prefix = format!("{}/{}/", UploadKind::Resume.prefix(), user_id);
    let owned = path
        .strip_prefix(&own_prefix)
        .is_some_and(|name| !name.is_empty() && !name.contains(['/', '\\']));
    if owned {
        Ok(())
    } else {
        Err(DomainError::forbidden("You can only attach a resume you uploaded"))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use jobboard_core::Role;

    fn is_authz(err: &ServiceError) -> bool {
        matches!(err, ServiceError::Domain(DomainError::Authorization(_)))
    }

    #[tokio::test]
    async fn hiring_scenario_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;

        let employer = board
            .create_user(admin, new_user("hiring_manager", Role::Employer))
            .await
            .expect("admin creates employer");
        let employer = Actor::user(employer.id, employer.role);
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;

        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("employer posts job");
        assert_eq!(job.salary.as_deref(), Some("$70,000"));

        let application = board
            .create_application(seeker, job.id, None)
            .await
            .expect("seeker applies");
        assert_eq!(application.status, ApplicationStatus::Pending);

        board
            .update_application_status(employer, application.id, "shortlisted")
            .await
            .expect("owner shortlists");

        let mine = board
            .list_applications(seeker, ApplicationScope::Mine)
            .await
            .expect("list mine");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, ApplicationStatus::Shortlisted);
    }

    #[tokio::test]
    async fn anonymous_job_creation_fails_authentication_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;

        let mut input = job_input("Engineer", "Remote");
        input.title = "x".into();
        let err = board
            .create_job(Actor::Anonymous, input, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Authentication(_))));
    }

    #[tokio::test]
    async fn job_seekers_cannot_post_and_strangers_cannot_edit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, owner) = seed_user(&board, "owner", Role::Employer).await;
        let (_, rival) = seed_user(&board, "rival", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;

        let err = board
            .create_job(seeker, job_input("Engineer", "Remote"), None)
            .await
            .unwrap_err();
        assert!(is_authz(&err));

        let job = board
            .create_job(owner, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        let err = board
            .update_job(
                rival,
                job.id,
                JobUpdate {
                    title: Some("Hijacked title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(is_authz(&err));
        let err = board.delete_job(rival, job.id).await.unwrap_err();
        assert!(is_authz(&err));

        let updated = board
            .update_job(
                owner,
                job.id,
                JobUpdate {
                    title: Some("Senior Engineer".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("owner edits");
        assert_eq!(updated.title, "Senior Engineer");
        assert_eq!(updated.posted_at, job.posted_at);
    }

    #[tokio::test]
    async fn duplicate_applications_conflict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");

        board
            .create_application(seeker, job.id, None)
            .await
            .expect("first application");
        let err = board
            .create_application(seeker, job.id, None)
            .await
            .unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::Conflict("You have already applied to this job".into()))
        );
        assert!(board.has_applied(seeker, job.id).await.expect("query"));
        assert!(!board.has_applied(Actor::Anonymous, job.id).await.expect("query"));
    }

    #[tokio::test]
    async fn application_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (seeker_user, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;

        let err = board.create_application(seeker, 404, None).await.unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::not_found("Job not found")));

        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        let err = board.create_application(employer, job.id, None).await.unwrap_err();
        assert!(is_authz(&err));

        let err = board
            .create_application(seeker, job.id, Some(format!("resumes/{}/cv.exe", seeker_user.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let application = board
            .create_application(seeker, job.id, Some(format!("resumes/{}/cv.pdf", seeker_user.id)))
            .await
            .expect("apply");

        let err = board
            .update_application_status(seeker, application.id, "hired")
            .await
            .unwrap_err();
        assert!(is_authz(&err));
        let err = board
            .update_application_status(employer, application.id, "archived")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        let err = board
            .update_application_status(employer, 9_999, "hired")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_scopes_are_enforced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, other) = seed_user(&board, "globex", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        board.create_application(seeker, job.id, None).await.expect("apply");

        let for_job = board
            .list_application_details(employer, ApplicationScope::ForJob(job.id))
            .await
            .expect("owner lists");
        assert_eq!(for_job.len(), 1);
        assert_eq!(for_job[0].applicant_username, "seeker");

        assert!(is_authz(
            &board
                .list_applications(other, ApplicationScope::ForJob(job.id))
                .await
                .unwrap_err()
        ));
        assert!(is_authz(
            &board
                .list_applications(seeker, ApplicationScope::All)
                .await
                .unwrap_err()
        ));
        assert_eq!(
            board
                .list_applications(admin, ApplicationScope::All)
                .await
                .expect("admin lists")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn list_jobs_filters_and_orders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let first = board
            .create_job(employer, job_input("Remote Engineer", "Remote - US"), None)
            .await
            .expect("post");
        board
            .create_job(employer, job_input("Office Engineer", "Lisbon"), None)
            .await
            .expect("post");
        let third = board
            .create_job(employer, job_input("Remote Designer", "remote"), None)
            .await
            .expect("post");

        let jobs = board
            .list_jobs(JobFilter {
                location: Some("Remote".into()),
                category: Some(" ".into()),
                company: None,
            })
            .await
            .expect("list");
        let ids: Vec<_> = jobs.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);

        let categories = board.job_categories().await.expect("categories");
        assert_eq!(categories[0].category, "Engineering");
        assert_eq!(categories[0].count, 3);
    }

    #[tokio::test]
    async fn registration_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;

        let err = board
            .create_user(Actor::Anonymous, new_user("sneaky", Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Authentication(_))));

        board
            .create_user(Actor::Anonymous, new_user("jane", Role::JobSeeker))
            .await
            .expect("self registration");
        let mut duplicate = new_user("jane2", Role::JobSeeker);
        duplicate.email = "jane@example.com".into();
        let err = board.create_user(Actor::Anonymous, duplicate).await.unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::validation("Email already in use"))
        );

        let user = board
            .authenticate("jane@example.com", PASSWORD)
            .await
            .expect("login by email");
        assert_eq!(user.username, "jane");
        board.authenticate("jane", PASSWORD).await.expect("login by username");
        let err = board.authenticate("jane@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Authentication(_))));
    }

    #[tokio::test]
    async fn user_management_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (root, admin) = seed_user(&board, "root", Role::Admin).await;
        let (user, actor) = seed_user(&board, "jane", Role::JobSeeker).await;

        let err = board
            .update_user(
                actor,
                user.id,
                UserUpdate {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(is_authz(&err));

        let renamed = board
            .update_user(
                actor,
                user.id,
                UserUpdate {
                    username: Some("jane_doe".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("self update");
        assert_eq!(renamed.username, "jane_doe");

        assert!(is_authz(&board.list_users(actor).await.unwrap_err()));
        assert!(is_authz(&board.delete_user(admin, root.id).await.unwrap_err()));
        board.delete_user(admin, user.id).await.expect("admin deletes");
        assert!(board.get_user(user.id).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn admin_posts_on_behalf_of_employers_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (employer, employer_actor) = seed_user(&board, "acme", Role::Employer).await;
        let (seeker, _) = seed_user(&board, "seeker", Role::JobSeeker).await;

        let job = board
            .create_job(admin, job_input("Engineer", "Remote"), Some(employer.id))
            .await
            .expect("admin posts for employer");
        assert_eq!(job.poster_id, employer.id);

        let err = board
            .create_job(admin, job_input("Analyst", "Remote"), Some(seeker.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let err = board
            .create_job(employer_actor, job_input("Analyst", "Remote"), Some(seeker.id))
            .await
            .unwrap_err();
        assert!(is_authz(&err));
    }

    #[tokio::test]
    async fn deleting_a_job_removes_its_applications() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        let application = board.create_application(seeker, job.id, None).await.expect("apply");

        board.delete_job(employer, job.id).await.expect("delete");
        let err = board
            .update_application_status(employer, application.id, "hired")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        assert!(board
            .list_applications(seeker, ApplicationScope::Mine)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn resumes_are_private_to_the_parties_involved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, stranger) = seed_user(&board, "globex", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");

        let err = board
            .store_upload(seeker, UploadKind::Resume, "cv.exe", b"MZ")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let key = board
            .store_upload(seeker, UploadKind::Resume, "My CV.pdf", b"%PDF")
            .await
            .expect("upload");
        board
            .create_application(seeker, job.id, Some(key.clone()))
            .await
            .expect("apply");

        for actor in [seeker, employer, admin] {
            let blob = board.open_file(actor, &key).await.expect("allowed");
            assert_eq!(blob.bytes, b"%PDF".to_vec());
        }
        assert!(is_authz(&board.open_file(stranger, &key).await.unwrap_err()));
        assert!(matches!(
            board.open_file(Actor::Anonymous, &key).await.unwrap_err(),
            ServiceError::Domain(DomainError::Authentication(_))
        ));

        let logo = board
            .store_upload(employer, UploadKind::CompanyLogo, "logo.png", b"png")
            .await
            .expect("logo upload");
        board.open_file(Actor::Anonymous, &logo).await.expect("logos are public");
    }

    #[tokio::test]
    async fn applications_only_accept_the_applicants_own_resume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, victim) = seed_user(&board, "victim", Role::JobSeeker).await;
        let (me, attacker) = seed_user(&board, "attacker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");

        let stolen = board
            .store_upload(victim, UploadKind::Resume, "cv.pdf", b"%PDF victim")
            .await
            .expect("victim upload");
        let err = board
            .create_application(attacker, job.id, Some(stolen.clone()))
            .await
            .unwrap_err();
        assert!(is_authz(&err));

        for sneaky in [
            format!("resumes/{}/../{}/cv.pdf", me.id, me.id + 1),
            format!("resumes/{}/", me.id),
            format!("logos/{}/cv.pdf", me.id),
        ] {
            let err = board
                .create_application(attacker, job.id, Some(sneaky.clone()))
                .await
                .unwrap_err();
            assert!(err.domain().is_some(), "{sneaky} should be rejected");
        }
        assert!(!board.has_applied(attacker, job.id).await.expect("query"));
        assert!(is_authz(&board.open_file(attacker, &stolen).await.unwrap_err()));
    }

    #[tokio::test]
    async fn resume_shared_by_two_applications_is_visible_to_both_owners() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, first_owner) = seed_user(&board, "acme", Role::Employer).await;
        let (_, second_owner) = seed_user(&board, "globex", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let first = board
            .create_job(first_owner, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        let second = board
            .create_job(second_owner, job_input("Designer", "Remote"), None)
            .await
            .expect("post");

        let key = board
            .store_upload(seeker, UploadKind::Resume, "cv.pdf", b"%PDF")
            .await
            .expect("upload");
        board
            .create_application(seeker, first.id, Some(key.clone()))
            .await
            .expect("apply first");
        board
            .create_application(seeker, second.id, Some(key.clone()))
            .await
            .expect("apply second");

        board.open_file(first_owner, &key).await.expect("first owner reads");
        board.open_file(second_owner, &key).await.expect("second owner reads");
    }

    #[tokio::test]
    async fn role_changes_cannot_orphan_postings_or_applications() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (employer, employer_actor) = seed_user(&board, "acme", Role::Employer).await;
        let (seeker, seeker_actor) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let (idle, _) = seed_user(&board, "idle", Role::Employer).await;
        let job = board
            .create_job(employer_actor, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        board
            .create_application(seeker_actor, job.id, None)
            .await
            .expect("apply");

        let demote = UserUpdate {
            role: Some(Role::JobSeeker),
            ..Default::default()
        };
        let err = board
            .update_user(admin, employer.id, demote.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let err = board
            .update_user(
                admin,
                seeker.id,
                UserUpdate {
                    role: Some(Role::Employer),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        let promoted = board
            .update_user(
                admin,
                employer.id,
                UserUpdate {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .expect("employers with postings may become admins");
        assert_eq!(promoted.role, Role::Admin);

        let demoted = board
            .update_user(admin, idle.id, demote)
            .await
            .expect("employers without postings may be demoted");
        assert_eq!(demoted.role, Role::JobSeeker);
    }

    #[tokio::test]
    async fn password_changes_are_hashed_and_unknown_logins_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (user, _) = seed_user(&board, "jane", Role::JobSeeker).await;

        board
            .update_user(
                admin,
                user.id,
                UserUpdate {
                    password: Some("N3w!password".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("admin resets password");
        board
            .authenticate("jane@example.com", "N3w!password")
            .await
            .expect("new password works");
        assert!(board.authenticate("jane@example.com", PASSWORD).await.is_err());

        let err = board.authenticate("ghost@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(
            err.domain(),
            Some(&DomainError::Authentication("Invalid email or password".into()))
        );
    }

    #[tokio::test]
    async fn dashboard_counts_are_admin_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, admin) = seed_user(&board, "root", Role::Admin).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let (_, seeker) = seed_user(&board, "seeker", Role::JobSeeker).await;
        let job = board
            .create_job(employer, job_input("Engineer", "Remote"), None)
            .await
            .expect("post");
        board.create_application(seeker, job.id, None).await.expect("apply");

        assert!(is_authz(&board.dashboard_stats(employer).await.unwrap_err()));
        assert!(matches!(
            board.dashboard_stats(Actor::Anonymous).await.unwrap_err(),
            ServiceError::Domain(DomainError::Authentication(_))
        ));

        let stats = board.dashboard_stats(admin).await.expect("admin reads stats");
        assert_eq!(stats.total_users(), 3);
        assert_eq!(stats.jobs, 1);
        assert_eq!(stats.total_applications(), 1);
        assert_eq!(stats.applications[0].status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn discarded_uploads_are_removed_from_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let board = setup_board(dir.path()).await;
        let (_, employer) = seed_user(&board, "acme", Role::Employer).await;
        let key = board
            .store_upload(employer, UploadKind::CompanyLogo, "logo.png", b"png")
            .await
            .expect("upload");
        assert!(dir.path().join(&key).exists());

        board.discard_upload(&key).await;
        assert!(!dir.path().join(&key).exists());
        // Already gone: still quiet.
        board.discard_upload(&key).await;
    }
}
