use std::{env, fmt, net::SocketAddr, path::PathBuf};

use super::{
    non_empty_var, server_bind_address, DEFAULT_DATABASE_URL, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_UPLOAD_DIR,
};

const DEVELOPMENT_SESSION_SECRET: &str = "jobboard-development-session-secret";
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 15 * 60;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Where uploaded files (resumes, logos, profile pictures) are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files live under `UPLOAD_DIR` on the local disk.
    Local,
    /// Files are pushed to an HTTP object store.
    Remote {
        base_url: String,
        bucket: String,
        token: Option<String>,
    },
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote { .. } => "remote",
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let kind = non_empty_var("STORAGE_BACKEND").unwrap_or_else(|| "local".to_string());
        match kind.as_str() {
            "local" => Ok(Self::Local),
            "remote" => {
                let base_url =
                    non_empty_var("OBJECT_STORE_URL").ok_or(ConfigError::Missing("OBJECT_STORE_URL"))?;
                let bucket = non_empty_var("OBJECT_STORE_BUCKET")
                    .ok_or(ConfigError::Missing("OBJECT_STORE_BUCKET"))?;
                Ok(Self::Remote {
                    base_url,
                    bucket,
                    token: non_empty_var("OBJECT_STORE_TOKEN"),
                })
            }
            other => Err(ConfigError::InvalidStorageBackend(other.to_string())),
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_secs: u64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub signed_url_ttl_secs: u64,
    pub storage: StorageBackend,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let session_secret = match non_empty_var("SESSION_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                return Err(ConfigError::Missing("SESSION_SECRET"))
            }
            None => DEVELOPMENT_SESSION_SECRET.to_string(),
        };

        Ok(Self {
            bind_addr,
            environment,
            database_url: non_empty_var("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            session_secret,
            session_ttl_secs: parse_number("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            upload_dir: non_empty_var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: parse_number("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            signed_url_ttl_secs: parse_number("SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS)?,
            storage: StorageBackend::from_env()?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(default),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    Missing(&'static str),
    InvalidNumber { name: &'static str, value: String },
    InvalidStorageBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::Missing(name) => write!(f, "{name} must be set"),
            Self::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer (got {value})")
            }
            Self::InvalidStorageBackend(value) => write!(
                f,
                "STORAGE_BACKEND must be either 'local' or 'remote' (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
