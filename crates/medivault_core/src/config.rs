//! Process configuration loaded from `MEDIVAULT_*` environment variables.
//!
//! # Responsibility
//! - Resolve database path, bind address, logging and session settings.
//! - Report malformed values instead of silently falling back.
//!
//! # Invariants
//! - Unset or empty variables resolve to documented defaults.
//! - `log_dir`, when set, is an absolute path.

use crate::logging::{default_log_level, normalize_level};
use ::config::{Config, Environment, Map};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "MEDIVAULT";
pub const ENV_DB_PATH: &str = "MEDIVAULT_DB_PATH";
pub const ENV_BIND_ADDR: &str = "MEDIVAULT_BIND_ADDR";
pub const ENV_LOG_LEVEL: &str = "MEDIVAULT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "MEDIVAULT_LOG_DIR";
pub const ENV_SESSION_TTL_HOURS: &str = "MEDIVAULT_SESSION_TTL_HOURS";

const DEFAULT_DB_FILE_NAME: &str = "medivault.sqlite3";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4000";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const MAX_SESSION_TTL_HOURS: i64 = 720;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The environment could not be read or deserialized.
    Load(String),
    /// A value was read but is out of range or malformed.
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }

    /// Offending variable, when known.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::Load(_) => None,
            Self::Invalid { key, .. } => Some(key),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(message) => write!(f, "failed to load configuration: {message}"),
            Self::Invalid { key, message } => write!(f, "invalid {key}: {message}"),
        }
    }
}

impl Error for ConfigError {}

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Load(err.to_string())
    }
}

/// Untrusted values as read from the environment.
#[derive(Debug, Deserialize)]
struct RawAppConfig {
    db_path: Option<String>,
    bind_addr: String,
    log_level: Option<String>,
    log_dir: Option<String>,
    session_ttl_hours: i64,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_level: &'static str,
    /// `None` means log to stderr.
    pub log_dir: Option<PathBuf>,
    pub session_ttl_hours: u32,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(environment())
    }

    /// Loads configuration from an explicit variable map instead of the
    /// process environment. Keys use the same `MEDIVAULT_*` names.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(environment().source(Some(map)))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let raw: RawAppConfig = Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("session_ttl_hours", DEFAULT_SESSION_TTL_HOURS)?
            .add_source(source)
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawAppConfig) -> Result<Self, ConfigError> {
        let db_path = non_blank(raw.db_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let bind_raw = raw.bind_addr.trim();
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|err| {
            ConfigError::invalid(
                ENV_BIND_ADDR,
                format!("`{bind_raw}` is not a socket address: {err}"),
            )
        })?;

        let log_level = match non_blank(raw.log_level) {
            Some(level) => normalize_level(&level)
                .map_err(|err| ConfigError::invalid(ENV_LOG_LEVEL, err.to_string()))?,
            None => default_log_level(),
        };

        let log_dir = match non_blank(raw.log_dir) {
            Some(dir) => {
                let path = PathBuf::from(&dir);
                if !path.is_absolute() {
                    return Err(ConfigError::invalid(
                        ENV_LOG_DIR,
                        format!("must be an absolute path, got `{dir}`"),
                    ));
                }
                Some(path)
            }
            None => None,
        };

        if !(1..=MAX_SESSION_TTL_HOURS).contains(&raw.session_ttl_hours) {
            return Err(ConfigError::invalid(
                ENV_SESSION_TTL_HOURS,
                format!(
                    "expected 1..={MAX_SESSION_TTL_HOURS}, got {}",
                    raw.session_ttl_hours
                ),
            ));
        }
        let session_ttl_hours = u32::try_from(raw.session_ttl_hours)
            .map_err(|err| ConfigError::invalid(ENV_SESSION_TTL_HOURS, err.to_string()))?;

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_dir,
            session_ttl_hours,
        })
    }

    /// Session lifetime in milliseconds.
    pub fn session_ttl_ms(&self) -> i64 {
        i64::from(self.session_ttl_hours) * 60 * 60 * 1000
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).ignore_empty(true)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{
        AppConfig, ConfigError, ENV_BIND_ADDR, ENV_DB_PATH, ENV_LOG_DIR, ENV_LOG_LEVEL,
        ENV_SESSION_TTL_HOURS,
    };

    fn no_vars() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_vars(no_vars()).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
        assert_eq!(config.session_ttl_hours, 24);
        assert!(config.log_dir.is_none());
        assert!(config.db_path.ends_with("medivault.sqlite3"));
    }

    #[test]
    fn empty_and_blank_values_are_treated_as_unset() {
        let config =
            AppConfig::from_vars([(ENV_BIND_ADDR, ""), (ENV_DB_PATH, "   ")]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
        assert!(config.db_path.ends_with("medivault.sqlite3"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = AppConfig::from_vars([(ENV_BIND_ADDR, "nope")]).unwrap_err();
        assert_eq!(err.key(), Some(ENV_BIND_ADDR));

        let err = AppConfig::from_vars([(ENV_LOG_LEVEL, "loud")]).unwrap_err();
        assert_eq!(err.key(), Some(ENV_LOG_LEVEL));

        let err = AppConfig::from_vars([(ENV_LOG_DIR, "relative/logs")]).unwrap_err();
        assert_eq!(err.key(), Some(ENV_LOG_DIR));

        let err = AppConfig::from_vars([(ENV_SESSION_TTL_HOURS, "0")]).unwrap_err();
        assert_eq!(err.key(), Some(ENV_SESSION_TTL_HOURS));

        let err = AppConfig::from_vars([(ENV_SESSION_TTL_HOURS, "9000")]).unwrap_err();
        assert_eq!(err.key(), Some(ENV_SESSION_TTL_HOURS));
    }

    #[test]
    fn non_numeric_ttl_fails_to_load() {
        let err = AppConfig::from_vars([(ENV_SESSION_TTL_HOURS, "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)), "{err:?}");
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let config = AppConfig::from_vars([("PATH", "/usr/bin"), ("OTHER_BIND_ADDR", "nope")])
            .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:4000");
    }

    #[test]
    fn session_ttl_converts_to_millis() {
        let config =
            AppConfig::from_vars([(ENV_SESSION_TTL_HOURS, "2"), (ENV_LOG_LEVEL, "WARN")]).unwrap();
        assert_eq!(config.session_ttl_ms(), 2 * 60 * 60 * 1000);
        assert_eq!(config.log_level, "warn");
    }
}
