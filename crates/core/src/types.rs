use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::DomainError;

pub type UserId = i64;
pub type JobId = i64;
pub type ApplicationId = i64;

/// Role assigned to an account at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    JobSeeker,
    Employer,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::JobSeeker, Role::Employer, Role::Admin];

    /// Returns the canonical database representation for the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobSeeker => "job_seeker",
            Self::Employer => "employer",
            Self::Admin => "admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::JobSeeker => "Job Seeker",
            Self::Employer => "Employer",
            Self::Admin => "Admin",
        }
    }

    /// Employers and admins may own job postings.
    pub fn can_post_jobs(self) -> bool {
        matches!(self, Self::Employer | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "job_seeker" => Ok(Self::JobSeeker),
            "employer" => Ok(Self::Employer),
            "admin" => Ok(Self::Admin),
            other => Err(DomainError::validation(format!(
                "Invalid role '{other}'. Must be one of: job_seeker, employer, admin"
            ))),
        }
    }
}

/// Review state of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Shortlisted,
    Rejected,
    Hired,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewed,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Hired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Shortlisted => "shortlisted",
            Self::Rejected => "rejected",
            Self::Hired => "hired",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Reviewed => "Reviewed",
            Self::Shortlisted => "Shortlisted",
            Self::Rejected => "Rejected",
            Self::Hired => "Hired",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|status| status.as_str()).collect();
                DomainError::validation(format!(
                    "Invalid status. Must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub salary: Option<String>,
    pub location: String,
    pub category: String,
    pub company: String,
    pub company_logo: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub poster_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub resume_path: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 72, message = "Password must be between 8 and 72 characters"))]
    pub password: String,
    pub role: Role,
    pub profile_picture: Option<String>,
}

/// Partial update of an account; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Validate)]
pub struct UserUpdate {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 72, message = "Password must be between 8 and 72 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    pub profile_picture: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.profile_picture.is_none()
    }
}

/// Input for posting a job.
#[derive(Debug, Clone, Validate)]
pub struct JobInput {
    #[validate(length(min = 5, max = 100, message = "Job title must be between 5 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 20, max = 5000, message = "Description must be between 20 and 5000 characters"))]
    pub description: String,
    pub salary: Option<String>,
    #[validate(length(min = 2, max = 100, message = "Location must be between 2 and 100 characters"))]
    pub location: String,
    #[validate(length(min = 2, max = 50, message = "Category must be between 2 and 50 characters"))]
    pub category: String,
    #[validate(length(min = 2, max = 100, message = "Company name must be between 2 and 100 characters"))]
    pub company: String,
    pub company_logo: Option<String>,
}

/// Partial update of a posting. An empty salary string clears the salary.
#[derive(Debug, Clone, Default, Validate)]
pub struct JobUpdate {
    #[validate(length(min = 5, max = 100, message = "Job title must be between 5 and 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 20, max = 5000, message = "Description must be between 20 and 5000 characters"))]
    pub description: Option<String>,
    pub salary: Option<String>,
    #[validate(length(min = 2, max = 100, message = "Location must be between 2 and 100 characters"))]
    pub location: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Category must be between 2 and 50 characters"))]
    pub category: Option<String>,
    #[validate(length(min = 2, max = 100, message = "Company name must be between 2 and 100 characters"))]
    pub company: Option<String>,
    pub company_logo: Option<String>,
}

impl JobUpdate {
    /// Applies the patch on top of an existing posting.
    pub fn apply_to(self, job: &Job) -> Job {
        let salary = match self.salary {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value),
            None => job.salary.clone(),
        };
        Job {
            id: job.id,
            title: self.title.unwrap_or_else(|| job.title.clone()),
            description: self.description.unwrap_or_else(|| job.description.clone()),
            salary,
            location: self.location.unwrap_or_else(|| job.location.clone()),
            category: self.category.unwrap_or_else(|| job.category.clone()),
            company: self.company.unwrap_or_else(|| job.company.clone()),
            company_logo: self.company_logo.or_else(|| job.company_logo.clone()),
            posted_at: job.posted_at,
            poster_id: job.poster_id,
        }
    }
}

/// Optional substring filters for job listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl JobFilter {
    /// Drops blank filters and trims the remaining ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }
        Self {
            location: clean(self.location),
            category: clean(self.category),
            company: clean(self.company),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.category.is_none() && self.company.is_none()
    }
}

/// Which applications a listing request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationScope {
    /// Applications submitted by the acting user.
    Mine,
    /// Applications received by one posting.
    ForJob(JobId),
    /// Every application in the system.
    All,
}

/// Kinds of uploaded files and the extensions each accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Resume,
    CompanyLogo,
    ProfilePicture,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Resume => &["pdf", "doc", "docx"],
            Self::CompanyLogo | Self::ProfilePicture => &["png", "jpg", "jpeg"],
        }
    }

    /// Key prefix under which files of this kind are stored.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Resume => "resumes",
            Self::CompanyLogo => "logos",
            Self::ProfilePicture => "profiles",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let prefix = key.split('/').next()?;
        [Self::Resume, Self::CompanyLogo, Self::ProfilePicture]
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
    }

    /// Whether files of this kind may be fetched without a session.
    pub fn is_public(self) -> bool {
        !matches!(self, Self::Resume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn role_round_trips_through_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn status_parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(
            " Shortlisted ".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Shortlisted
        );
        let err = "archived".parse::<ApplicationStatus>().unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Invalid status. Must be one of: pending, reviewed, shortlisted, rejected, hired"
                .to_string()]
        );
    }

    #[test]
    fn filter_normalization_drops_blanks() {
        let filter = JobFilter {
            location: Some("  Remote ".into()),
            category: Some("   ".into()),
            company: None,
        }
        .normalized();
        assert_eq!(filter.location.as_deref(), Some("Remote"));
        assert!(filter.category.is_none());
        assert!(!filter.is_empty());
    }

    #[test]
    fn job_update_applies_partial_changes() {
        let job = Job {
            id: 7,
            title: "Backend Engineer".into(),
            description: "Build and operate the job board API".into(),
            salary: Some("$100,000".into()),
            location: "Remote".into(),
            category: "Engineering".into(),
            company: "Acme".into(),
            company_logo: None,
            posted_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            poster_id: 3,
        };
        let updated = JobUpdate {
            title: Some("Senior Backend Engineer".into()),
            salary: Some(String::new()),
            ..Default::default()
        }
        .apply_to(&job);

        assert_eq!(updated.title, "Senior Backend Engineer");
        assert_eq!(updated.salary, None);
        assert_eq!(updated.location, "Remote");
        assert_eq!(updated.poster_id, 3);
    }

    #[test]
    fn upload_kind_resolves_from_key_prefix() {
        assert_eq!(UploadKind::from_key("resumes/4/a.pdf"), Some(UploadKind::Resume));
        assert_eq!(UploadKind::from_key("logos/x.png"), Some(UploadKind::CompanyLogo));
        assert_eq!(UploadKind::from_key("other/x.png"), None);
        assert!(!UploadKind::Resume.is_public());
        assert!(UploadKind::ProfilePicture.is_public());
    }
}
