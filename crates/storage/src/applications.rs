use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use jobboard_core::{Application, ApplicationId, ApplicationStatus, JobId, UserId};

use crate::{classify, to_rfc3339, Violation};

const APPLICATION_COLUMNS: &str =
    "id, job_id, applicant_id, status, resume_path, applied_at";

/// Repository for job applications.
#[derive(Clone)]
pub struct ApplicationRepository {
    pub(crate) pool: SqlitePool,
}

impl ApplicationRepository {
    pub async fn insert(
        &self,
        record: &NewApplicationRecord<'_>,
    ) -> Result<Application, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "INSERT INTO applications (job_id, applicant_id, status, resume_path, applied_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(record.job_id)
        .bind(record.applicant_id)
        .bind(record.status.as_str())
        .bind(record.resume_path)
        .bind(to_rfc3339(record.applied_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match classify(&err) {
            Some(Violation::Unique(_)) => ApplicationError::Duplicate,
            Some(Violation::ForeignKey) => ApplicationError::MissingReference,
            None => ApplicationError::Database(err),
        })?;

        Ok(row.into_domain())
    }

    pub async fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApplicationRow::into_domain))
    }

    /// Returns the application `applicant_id` submitted for `job_id`, if any.
    pub async fn find(
        &self,
        job_id: JobId,
        applicant_id: UserId,
    ) -> Result<Option<Application>, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ? AND applicant_id = ?"
        ))
        .bind(job_id)
        .bind(applicant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApplicationRow::into_domain))
    }

    /// Applications that reference a stored resume, oldest first.
    pub async fn list_by_resume(
        &self,
        resume_path: &str,
    ) -> Result<Vec<Application>, ApplicationError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE resume_path = ? ORDER BY id ASC"
        ))
        .bind(resume_path)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApplicationRow::into_domain).collect())
    }

    /// Lists applications newest first, narrowed by `filter`.
    pub async fn list(&self, filter: ApplicationFilter) -> Result<Vec<Application>, ApplicationError> {
        let (applicant_id, job_id) = filter.bindings();
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications \
             WHERE (?1 IS NULL OR applicant_id = ?1) \
               AND (?2 IS NULL OR job_id = ?2) \
             ORDER BY applied_at DESC, id DESC"
        ))
        .bind(applicant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApplicationRow::into_domain).collect())
    }

    /// Same as [`Self::list`] but joined with job and applicant columns for display.
    pub async fn list_details(
        &self,
        filter: ApplicationFilter,
    ) -> Result<Vec<ApplicationDetails>, ApplicationError> {
        let (applicant_id, job_id) = filter.bindings();
        let rows = sqlx::query_as::<_, ApplicationDetailsRow>(
            "SELECT a.id, a.job_id, a.applicant_id, a.status, a.resume_path, a.applied_at, \
                    j.title AS job_title, j.company AS job_company, j.location AS job_location, \
                    u.username AS applicant_username, u.email AS applicant_email \
               FROM applications AS a \
               JOIN jobs AS j ON j.id = a.job_id \
               JOIN users AS u ON u.id = a.applicant_id \
              WHERE (?1 IS NULL OR a.applicant_id = ?1) \
                AND (?2 IS NULL OR a.job_id = ?2) \
              ORDER BY a.applied_at DESC, a.id DESC",
        )
        .bind(applicant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApplicationDetailsRow::into_domain).collect())
    }

    pub async fn count_for_job(&self, job_id: JobId) -> Result<i64, ApplicationError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM applications WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of applications per status, in workflow order. Statuses without rows are omitted.
    pub async fn status_counts(&self) -> Result<Vec<StatusCount>, ApplicationError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM applications GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        let mut counts: Vec<StatusCount> = rows
            .into_iter()
            .filter_map(|(status, count)| {
                status.parse().ok().map(|status| StatusCount { status, count })
            })
            .collect();
        counts.sort_by_key(|entry| {
            ApplicationStatus::ALL
                .iter()
                .position(|status| *status == entry.status)
        });
        Ok(counts)
    }

    /// Sets the status. Returns `None` for unknown ids.
    pub async fn update_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, ApplicationError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "UPDATE applications SET status = ? WHERE id = ? RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ApplicationRow::into_domain))
    }

    pub async fn delete(&self, id: ApplicationId) -> Result<bool, ApplicationError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Restricts application listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationFilter {
    Applicant(UserId),
    Job(JobId),
    Everything,
}

impl ApplicationFilter {
    fn bindings(self) -> (Option<UserId>, Option<JobId>) {
        match self {
            Self::Applicant(id) => (Some(id), None),
            Self::Job(id) => (None, Some(id)),
            Self::Everything => (None, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: i64,
}

/// Parameters required to insert an application.
pub struct NewApplicationRecord<'a> {
    pub job_id: JobId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub resume_path: Option<&'a str>,
    pub applied_at: DateTime<Utc>,
}

/// Application joined with the fields pages display next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDetails {
    pub application: Application,
    pub job_title: String,
    pub job_company: String,
    pub job_location: String,
    pub applicant_username: String,
    pub applicant_email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    job_id: i64,
    applicant_id: i64,
    status: String,
    resume_path: Option<String>,
    applied_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_domain(self) -> Application {
        Application {
            id: self.id,
            job_id: self.job_id,
            applicant_id: self.applicant_id,
            status: self.status.parse().unwrap_or(ApplicationStatus::Pending),
            resume_path: self.resume_path,
            applied_at: self.applied_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationDetailsRow {
    #[sqlx(flatten)]
    application: ApplicationRow,
    job_title: String,
    job_company: String,
    job_location: String,
    applicant_username: String,
    applicant_email: String,
}

impl ApplicationDetailsRow {
    fn into_domain(self) -> ApplicationDetails {
        ApplicationDetails {
            application: self.application.into_domain(),
            job_title: self.job_title,
            job_company: self.job_company,
            job_location: self.job_location,
            applicant_username: self.applicant_username,
            applicant_email: self.applicant_email,
        }
    }
}

/// Errors that can occur while reading or mutating applications.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("applicant already applied to this job")]
    Duplicate,
    #[error("job or applicant does not exist")]
    MissingReference,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ApplicationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, setup_db, user};
    use crate::NewJobRecord;
    use jobboard_core::{Job, Role};

    async fn job(db: &crate::Database, poster_id: UserId, title: &str) -> Job {
        db.jobs()
            .insert(&NewJobRecord {
                title,
                description: "Plenty of detail about this role",
                salary: None,
                location: "Remote",
                category: "Engineering",
                company: "Acme",
                company_logo: None,
                posted_at: at(0),
                poster_id,
            })
            .await
            .expect("insert job")
    }

    fn record(job_id: JobId, applicant_id: UserId, minute: i64) -> NewApplicationRecord<'static> {
        NewApplicationRecord {
            job_id,
            applicant_id,
            status: ApplicationStatus::Pending,
            resume_path: Some("resumes/1/cv.pdf"),
            applied_at: at(minute),
        }
    }

    #[tokio::test]
    async fn second_application_for_same_job_is_duplicate() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let posting = job(&db, employer.id, "Backend Engineer").await;

        let first = db.applications().insert(&record(posting.id, seeker.id, 1)).await.expect("insert");
        assert_eq!(first.status, ApplicationStatus::Pending);

        let err = db.applications().insert(&record(posting.id, seeker.id, 2)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Duplicate));
    }

    #[tokio::test]
    async fn insert_for_missing_job_is_reported() {
        let db = setup_db().await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let err = db.applications().insert(&record(42, seeker.id, 1)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::MissingReference));
    }

    #[tokio::test]
    async fn listings_and_details_follow_the_filter() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let sam = user(&db, "sam", Role::JobSeeker).await;
        let kim = user(&db, "kim", Role::JobSeeker).await;
        let first = job(&db, employer.id, "Backend Engineer").await;
        let second = job(&db, employer.id, "Frontend Engineer").await;

        let a1 = db.applications().insert(&record(first.id, sam.id, 1)).await.expect("insert");
        let a2 = db.applications().insert(&record(second.id, sam.id, 2)).await.expect("insert");
        let a3 = db.applications().insert(&record(first.id, kim.id, 3)).await.expect("insert");

        let mine: Vec<_> = db
            .applications()
            .list(ApplicationFilter::Applicant(sam.id))
            .await
            .expect("list")
            .into_iter()
            .map(|app| app.id)
            .collect();
        assert_eq!(mine, vec![a2.id, a1.id]);

        let for_job = db
            .applications()
            .list_details(ApplicationFilter::Job(first.id))
            .await
            .expect("details");
        assert_eq!(for_job.len(), 2);
        assert_eq!(for_job[0].application.id, a3.id);
        assert_eq!(for_job[0].applicant_username, "kim");
        assert_eq!(for_job[0].job_title, "Backend Engineer");

        let everything = db.applications().list(ApplicationFilter::Everything).await.expect("list");
        assert_eq!(everything.len(), 3);
        assert_eq!(db.applications().count_for_job(first.id).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn status_update_and_lookup_by_resume() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let posting = job(&db, employer.id, "Backend Engineer").await;
        let app = db.applications().insert(&record(posting.id, seeker.id, 1)).await.expect("insert");

        let updated = db
            .applications()
            .update_status(app.id, ApplicationStatus::Hired)
            .await
            .expect("update")
            .expect("exists");
        assert_eq!(updated.status, ApplicationStatus::Hired);

        let by_resume = db
            .applications()
            .list_by_resume("resumes/1/cv.pdf")
            .await
            .expect("query");
        assert_eq!(by_resume.len(), 1);
        assert_eq!(by_resume[0].id, app.id);
        assert!(db
            .applications()
            .list_by_resume("resumes/9/other.pdf")
            .await
            .expect("query")
            .is_empty());

        assert!(db
            .applications()
            .update_status(999, ApplicationStatus::Hired)
            .await
            .expect("update")
            .is_none());
    }

    #[tokio::test]
    async fn deleting_a_job_cascades_to_its_applications() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let posting = job(&db, employer.id, "Backend Engineer").await;
        let app = db.applications().insert(&record(posting.id, seeker.id, 1)).await.expect("insert");

        assert!(db.jobs().delete(posting.id).await.expect("delete"));
        assert!(db.applications().fetch(app.id).await.expect("fetch").is_none());
    }

    #[tokio::test]
    async fn deleting_the_applicant_removes_their_applications() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let posting = job(&db, employer.id, "Backend Engineer").await;
        db.applications().insert(&record(posting.id, seeker.id, 1)).await.expect("insert");

        db.users().delete(seeker.id).await.expect("delete");
        assert_eq!(db.applications().count_for_job(posting.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn shared_resume_lists_every_application_in_id_order() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let seeker = user(&db, "sam", Role::JobSeeker).await;
        let first = job(&db, employer.id, "Backend Engineer").await;
        let second = job(&db, employer.id, "Frontend Engineer").await;
        let a2 = db.applications().insert(&record(second.id, seeker.id, 1)).await.expect("insert");
        let a1 = db.applications().insert(&record(first.id, seeker.id, 2)).await.expect("insert");

        let ids: Vec<_> = db
            .applications()
            .list_by_resume("resumes/1/cv.pdf")
            .await
            .expect("query")
            .into_iter()
            .map(|app| app.id)
            .collect();
        assert_eq!(ids, vec![a2.id, a1.id]);
    }

    #[tokio::test]
    async fn status_counts_follow_workflow_order() {
        let db = setup_db().await;
        let employer = user(&db, "acme", Role::Employer).await;
        let sam = user(&db, "sam", Role::JobSeeker).await;
        let kim = user(&db, "kim", Role::JobSeeker).await;
        let posting = job(&db, employer.id, "Backend Engineer").await;
        let hired = db.applications().insert(&record(posting.id, sam.id, 1)).await.expect("insert");
        db.applications().insert(&record(posting.id, kim.id, 2)).await.expect("insert");
        db.applications()
            .update_status(hired.id, ApplicationStatus::Hired)
            .await
            .expect("update");

        let counts = db.applications().status_counts().await.expect("counts");
        assert_eq!(
            counts,
            vec![
                StatusCount { status: ApplicationStatus::Pending, count: 1 },
                StatusCount { status: ApplicationStatus::Hired, count: 1 },
            ]
        );
    }
}
