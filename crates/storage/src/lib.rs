mod applications;
mod jobs;
mod users;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

pub use applications::{
    ApplicationDetails, ApplicationError, ApplicationFilter, ApplicationRepository,
    NewApplicationRecord, StatusCount,
};
pub use jobs::{CategoryCount, JobError, JobRepository, NewJobRecord};
pub use users::{NewUserRecord, RoleCount, UserChanges, UserError, UserRepository, UserRow};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// Pragmas are attached to the connect options so that every pooled
    /// connection enforces foreign keys, which the cascading deletes rely on.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for account records.
    pub fn users(&self) -> UserRepository {
        UserRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for job postings.
    pub fn jobs(&self) -> JobRepository {
        JobRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for job applications.
    pub fn applications(&self) -> ApplicationRepository {
        ApplicationRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Constraint violations reported by SQLite, keyed by extended result code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Violation {
    /// `SQLITE_CONSTRAINT_UNIQUE`; carries the failing message (`table.column`).
    Unique(String),
    /// `SQLITE_CONSTRAINT_FOREIGNKEY`.
    ForeignKey,
}

pub(crate) fn classify(err: &sqlx::Error) -> Option<Violation> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    match db_err.code().as_deref() {
        Some("2067") | Some("1555") => Some(Violation::Unique(db_err.message().to_string())),
        Some("787") => Some(Violation::ForeignKey),
        _ => None,
    }
}

pub(crate) fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
