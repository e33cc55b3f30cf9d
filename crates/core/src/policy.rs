//! Role and ownership rules.
//!
//! Every check resolves authentication first, so an anonymous caller always
//! receives [`DomainError::Authentication`] before any role is inspected.

use crate::error::DomainError;
use crate::types::{Application, ApplicationScope, Job, Role, UserId};

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(self) -> bool {
        matches!(self.role, Role::Admin)
    }

    fn owns(self, job: &Job) -> bool {
        job.poster_id == self.user_id
    }
}

/// Identity on whose behalf a domain operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    User(Principal),
}

impl Actor {
    pub fn user(user_id: UserId, role: Role) -> Self {
        Self::User(Principal { user_id, role })
    }

    pub fn principal(self) -> Option<Principal> {
        match self {
            Self::Anonymous => None,
            Self::User(principal) => Some(principal),
        }
    }

    pub fn user_id(self) -> Option<UserId> {
        self.principal().map(|principal| principal.user_id)
    }

    pub fn role(self) -> Option<Role> {
        self.principal().map(|principal| principal.role)
    }

    pub fn is_admin(self) -> bool {
        self.principal().is_some_and(Principal::is_admin)
    }

    /// Fails with an authentication error for anonymous callers.
    pub fn authenticated(self) -> Result<Principal, DomainError> {
        self.principal()
            .ok_or_else(DomainError::authentication_required)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Update,
    Delete,
    ReviewApplications,
}

impl JobAction {
    fn denial(self) -> &'static str {
        match self {
            Self::Update => "Not authorized to update this job",
            Self::Delete => "Not authorized to delete this job",
            Self::ReviewApplications => "Not authorized to view applications for this job",
        }
    }
}

pub fn authorize_job_creation(actor: Actor) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.role.can_post_jobs() {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Only employers can post jobs"))
    }
}

/// Owner or admin.
pub fn authorize_job_action(
    actor: Actor,
    job: &Job,
    action: JobAction,
) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin() || principal.owns(job) {
        Ok(principal)
    } else {
        Err(DomainError::forbidden(action.denial()))
    }
}

pub fn authorize_application_submission(actor: Actor) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if matches!(principal.role, Role::JobSeeker) {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Only job seekers can apply for jobs"))
    }
}

/// The applicant, the owner of the job applied to, or an admin.
pub fn authorize_application_view(
    actor: Actor,
    application: &Application,
    job: &Job,
) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin()
        || principal.owns(job)
        || application.applicant_id == principal.user_id
    {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Not authorized to view this application"))
    }
}

pub fn authorize_status_change(actor: Actor, job: &Job) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin() || principal.owns(job) {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Not authorized to update this application"))
    }
}

pub fn authorize_application_removal(
    actor: Actor,
    application: &Application,
    job: &Job,
) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin()
        || principal.owns(job)
        || application.applicant_id == principal.user_id
    {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Not authorized to delete this application"))
    }
}

/// `job` must be the posting named by [`ApplicationScope::ForJob`].
pub fn authorize_application_listing(
    actor: Actor,
    scope: ApplicationScope,
    job: Option<&Job>,
) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    match scope {
        ApplicationScope::Mine => Ok(principal),
        ApplicationScope::ForJob(_) => match job {
            Some(job) if principal.is_admin() || principal.owns(job) => Ok(principal),
            _ => Err(DomainError::forbidden(
                JobAction::ReviewApplications.denial(),
            )),
        },
        ApplicationScope::All if principal.is_admin() => Ok(principal),
        ApplicationScope::All => Err(DomainError::forbidden(
            "Only administrators can list all applications",
        )),
    }
}

/// Anyone may register as a job seeker or employer; admins are created by admins.
pub fn authorize_user_creation(actor: Actor, role: Role) -> Result<(), DomainError> {
    if matches!(role, Role::Admin) && !actor.is_admin() {
        return match actor {
            Actor::Anonymous => Err(DomainError::authentication_required()),
            Actor::User(_) => Err(DomainError::forbidden(
                "Only administrators can create admin accounts",
            )),
        };
    }
    Ok(())
}

pub fn authorize_user_listing(actor: Actor) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(DomainError::forbidden("Only administrators can list users"))
    }
}

/// Self or admin; only admins may change roles.
pub fn authorize_user_update(
    actor: Actor,
    target: UserId,
    changes_role: bool,
) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if principal.is_admin() {
        return Ok(principal);
    }
    if principal.user_id != target {
        return Err(DomainError::forbidden("Not authorized to update this user"));
    }
    if changes_role {
        return Err(DomainError::forbidden("Only administrators can change roles"));
    }
    Ok(principal)
}

pub fn authorize_user_removal(actor: Actor, target: UserId) -> Result<Principal, DomainError> {
    let principal = actor.authenticated()?;
    if !principal.is_admin() {
        return Err(DomainError::forbidden("Only administrators can delete users"));
    }
    if principal.user_id == target {
        return Err(DomainError::forbidden("You cannot delete your own account"));
    }
    Ok(principal)
}
