use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use jobboard_core::{Role, User, UserId};

use crate::{classify, to_rfc3339, Violation};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, profile_picture, created_at";

/// Repository for account records.
#[derive(Clone)]
pub struct UserRepository {
    pub(crate) pool: SqlitePool,
}

impl UserRepository {
    /// Inserts a new account and returns it.
    pub async fn insert(&self, record: &NewUserRecord<'_>) -> Result<User, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash, role, profile_picture, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(record.username)
        .bind(record.email)
        .bind(record.password_hash)
        .bind(record.role.as_str())
        .bind(record.profile_picture)
        .bind(to_rfc3339(record.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(UserError::from_insert)?;

        Ok(row.into_domain())
    }

    pub async fn fetch(&self, id: UserId) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_domain))
    }

    /// Looks an account up by email, or by username when `identity` has no `@`.
    ///
    /// The raw row is returned so callers can verify the stored hash.
    pub async fn fetch_by_identity(&self, identity: &str) -> Result<Option<UserRow>, UserError> {
        let column = if identity.contains('@') {
            "email"
        } else {
            "username"
        };
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?"
        ))
        .bind(identity.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lists every account, oldest first.
    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRow::into_domain).collect())
    }

    /// Number of accounts holding each role, in [`Role::ALL`] order, zeros included.
    pub async fn role_counts(&self) -> Result<Vec<RoleCount>, UserError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
                .fetch_all(&self.pool)
                .await?;
        Ok(Role::ALL
            .into_iter()
            .map(|role| RoleCount {
                role,
                count: rows
                    .iter()
                    .filter(|(stored, _)| stored.as_str() == role.as_str())
                    .map(|(_, count)| count)
                    .sum(),
            })
            .collect())
    }

    /// Applies the non-empty fields of `changes`. Returns `None` for unknown ids.
    pub async fn update(
        &self,
        id: UserId,
        changes: &UserChanges<'_>,
    ) -> Result<Option<User>, UserError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users \
             SET username = COALESCE(?, username), \
                 email = COALESCE(?, email), \
                 password_hash = COALESCE(?, password_hash), \
                 role = COALESCE(?, role), \
                 profile_picture = COALESCE(?, profile_picture) \
             WHERE id = ? \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(Role::as_str))
        .bind(changes.profile_picture)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(UserError::from_insert)?;

        Ok(row.map(UserRow::into_domain))
    }

    /// Deletes an account together with its postings and applications.
    pub async fn delete(&self, id: UserId) -> Result<bool, UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

/// Parameters required to insert an account.
pub struct NewUserRecord<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub profile_picture: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Column changes for [`UserRepository::update`]; `None` keeps the stored value.
#[derive(Default)]
pub struct UserChanges<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub role: Option<Role>,
    pub profile_picture: Option<&'a str>,
}

/// Raw `users` row including the credential hash.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    /// Converts the row into the domain record, dropping the hash.
    pub fn into_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            // Unknown roles degrade to the least privileged one.
            role: self.role.parse().unwrap_or(Role::JobSeeker),
            profile_picture: self.profile_picture,
            created_at: self.created_at,
        }
    }
}

/// Errors that can occur while reading or mutating accounts.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("email address is already registered")]
    DuplicateEmail,
    #[error("username is already taken")]
    DuplicateUsername,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl UserError {
    fn from_insert(err: sqlx::Error) -> Self {
        match classify(&err) {
            Some(Violation::Unique(message)) if message.contains("users.email") => {
                Self::DuplicateEmail
            }
            Some(Violation::Unique(_)) => Self::DuplicateUsername,
            _ => Self::Database(err),
        }
    }
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}
