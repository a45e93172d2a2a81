//! Environment-driven configuration.
//!
//! # Invariants
//! - Malformed values are errors, never silently replaced by defaults.
//! - Admin credentials come only from configuration.

use crate::ai::{AiSettings, ReportLanguage};
use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "IUSTIME_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "IUSTIME_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "IUSTIME_LOG_DIR";
pub const ENV_GEMINI_API_KEY: &str = "IUSTIME_GEMINI_API_KEY";
pub const ENV_GEMINI_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
pub const ENV_AI_MODEL: &str = "IUSTIME_AI_MODEL";
pub const ENV_AI_ENDPOINT: &str = "IUSTIME_AI_ENDPOINT";
pub const ENV_AI_TIMEOUT_SECS: &str = "IUSTIME_AI_TIMEOUT_SECS";
pub const ENV_REPORT_LANGUAGE: &str = "IUSTIME_REPORT_LANGUAGE";
pub const ENV_ADMIN_EMAIL: &str = "IUSTIME_ADMIN_EMAIL";
pub const ENV_ADMIN_PASSWORD: &str = "IUSTIME_ADMIN_PASSWORD";

const DEFAULT_DB_FILE: &str = "iustime.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    InvalidLogLevel(String),
    InvalidLanguage(String),
    /// Only one of the admin email and password is set.
    IncompleteAdminCredentials,
    /// First run needs admin credentials to seed the account.
    MissingAdminCredentials,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { key, value } => {
                write!(f, "`{key}` must be a positive integer, got `{value}`")
            }
            Self::InvalidLogLevel(value) => write!(f, "unsupported log level `{value}`"),
            Self::InvalidLanguage(value) => write!(f, "unsupported report language `{value}`"),
            Self::IncompleteAdminCredentials => write!(
                f,
                "`{ENV_ADMIN_EMAIL}` and `{ENV_ADMIN_PASSWORD}` must be set together"
            ),
            Self::MissingAdminCredentials => write!(
                f,
                "no user exists yet; set `{ENV_ADMIN_EMAIL}` and `{ENV_ADMIN_PASSWORD}`"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Credentials for the first admin account.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl Debug for AdminCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// File logging is off when unset.
    pub log_dir: Option<PathBuf>,
    pub ai: AiSettings,
    pub admin: Option<AdminCredentials>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join("iustime").join(DEFAULT_DB_FILE),
            log_level: default_log_level(),
            log_dir: None,
            ai: AiSettings::default(),
            admin: None,
        }
    }
}

impl CoreConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves every setting through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level =
                normalize_level(&level).map_err(|_| ConfigError::InvalidLogLevel(level))?;
        }
        config.log_dir = get(ENV_LOG_DIR).map(PathBuf::from);

        config.ai.api_key = get(ENV_GEMINI_API_KEY).or_else(|| get(ENV_GEMINI_API_KEY_FALLBACK));
        if let Some(model) = get(ENV_AI_MODEL) {
            config.ai.model = model;
        }
        if let Some(endpoint) = get(ENV_AI_ENDPOINT) {
            config.ai.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get(ENV_AI_TIMEOUT_SECS) {
            config.ai.timeout = Duration::from_secs(parse_positive(ENV_AI_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = get(ENV_REPORT_LANGUAGE) {
            config.ai.language = raw
                .parse::<ReportLanguage>()
                .map_err(|_| ConfigError::InvalidLanguage(raw))?;
        }

        config.admin = match (get(ENV_ADMIN_EMAIL), get(ENV_ADMIN_PASSWORD)) {
            (Some(email), Some(password)) => Some(AdminCredentials { email, password }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteAdminCredentials),
        };

        Ok(config)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin = Some(AdminCredentials {
            email: email.into(),
            password: password.into(),
        });
        self
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}
