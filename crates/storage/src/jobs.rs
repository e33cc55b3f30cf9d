use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use jobboard_core::{Job, JobFilter, JobId, UserId};

use crate::{classify, to_rfc3339, Violation};

const JOB_COLUMNS: &str = "id, title, description, salary, location, category, company, \
                           company_logo, posted_at, poster_id";

/// Repository for job postings.
#[derive(Clone)]
pub struct JobRepository {
    pub(crate) pool: SqlitePool,
}

impl JobRepository {
    pub async fn insert(&self, record: &NewJobRecord<'_>) -> Result<Job, JobError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO jobs \
             (title, description, salary, location, category, company, company_logo, posted_at, poster_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(record.title)
        .bind(record.description)
        .bind(record.salary)
        .bind(record.location)
        .bind(record.category)
        .bind(record.company)
        .bind(record.company_logo)
        .bind(to_rfc3339(record.posted_at))
        .bind(record.poster_id)
        .fetch_one(&self.pool)
        .await
        .map_err(JobError::from_write)?;

        Ok(row.into_domain())
    }

    pub async fn fetch(&self, id: JobId) -> Result<Option<Job>, JobError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(JobRow::into_domain))
    }

    /// Lists postings matching every present filter, newest first.
    ///
    /// Filters are case-insensitive substring matches; `limit` of `None`
    /// returns every match.
    pub async fn list(&self, filter: &JobFilter, limit: Option<u32>) -> Result<Vec<Job>, JobError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE (?1 IS NULL OR instr(lower(location), lower(?1)) > 0) \
               AND (?2 IS NULL OR instr(lower(category), lower(?2)) > 0) \
               AND (?3 IS NULL OR instr(lower(company), lower(?3)) > 0) \
             ORDER BY posted_at DESC, id DESC \
             LIMIT ?4"
        ))
        .bind(filter.location.as_deref())
        .bind(filter.category.as_deref())
        .bind(filter.company.as_deref())
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(JobRow::into_domain).collect())
    }

    /// Postings owned by one user, newest first.
    pub async fn list_by_poster(&self, poster_id: UserId) -> Result<Vec<Job>, JobError> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE poster_id = ? ORDER BY posted_at DESC, id DESC"
        ))
        .bind(poster_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(JobRow::into_domain).collect())
    }

    /// Persists every editable column of `job`. Returns `None` for unknown ids.
    pub async fn update(&self, job: &Job) -> Result<Option<Job>, JobError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE jobs \
             SET title = ?, description = ?, salary = ?, location = ?, category = ?, \
                 company = ?, company_logo = ? \
             WHERE id = ? \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.salary)
        .bind(&job.location)
        .bind(&job.category)
        .bind(&job.company)
        .bind(&job.company_logo)
        .bind(job.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(JobError::from_write)?;

        Ok(row.map(JobRow::into_domain))
    }

    /// Deletes a posting; its applications go with it.
    pub async fn delete(&self, id: JobId) -> Result<bool, JobError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, JobError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of postings per category, most common first.
    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>, JobError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM jobs \
             GROUP BY category ORDER BY count DESC, category ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Parameters required to insert a posting.
pub struct NewJobRecord<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub salary: Option<&'a str>,
    pub location: &'a str,
    pub category: &'a str,
    pub company: &'a str,
    pub company_logo: Option<&'a str>,
    pub posted_at: DateTime<Utc>,
    pub poster_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    title: String,
    description: String,
    salary: Option<String>,
    location: String,
    category: String,
    company: String,
    company_logo: Option<String>,
    posted_at: DateTime<Utc>,
    poster_id: i64,
}

impl JobRow {
    fn into_domain(self) -> Job {
        Job {
            id: self.id,
            title: self.title,
            description: self.description,
            salary: self.salary,
            location: self.location,
            category: self.category,
            company: self.company,
            company_logo: self.company_logo,
            posted_at: self.posted_at,
            poster_id: self.poster_id,
        }
    }
}

/// Errors that can occur while reading or mutating postings.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("an identical posting already exists")]
    Duplicate,
    #[error("posting owner does not exist")]
    MissingPoster,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl JobError {
    fn from_write(err: sqlx::Error) -> Self {
        match classify(&err) {
            Some(Violation::Unique(_)) => Self::Duplicate,
            Some(Violation::ForeignKey) => Self::MissingPoster,
            None => Self::Database(err),
        }
    }
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}
