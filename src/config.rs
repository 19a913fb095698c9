//! Runtime configuration resolved from the environment.
//!
//! Every knob has an environment variable; the CLI layers its flags on top via
//! [`PrefsConfig::with_data_dir`] and [`PrefsConfig::with_remote_kind`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const APP_IDENTIFIER: &str = "com.eisenhower.matrix";

pub const ENV_DATA_DIR: &str = "MATRIX_PREFS_DATA_DIR";
pub const ENV_REMOTE: &str = "MATRIX_PREFS_REMOTE";
pub const ENV_REMOTE_DB: &str = "MATRIX_PREFS_REMOTE_DB";
pub const ENV_REST_URL: &str = "MATRIX_PREFS_REST_URL";
pub const ENV_REST_API_KEY: &str = "MATRIX_PREFS_REST_API_KEY";
pub const ENV_REST_ACCESS_TOKEN: &str = "MATRIX_PREFS_REST_ACCESS_TOKEN";
pub const ENV_REST_TABLE: &str = "MATRIX_PREFS_REST_TABLE";
pub const ENV_REST_TIMEOUT_MS: &str = "MATRIX_PREFS_REST_TIMEOUT_MS";
pub const ENV_LOG_MAX_SIZE_BYTES: &str = "MATRIX_PREFS_LOG_MAX_SIZE_BYTES";
pub const ENV_LOG_MAX_FILES: &str = "MATRIX_PREFS_LOG_MAX_FILES";

pub const DEFAULT_REST_TABLE: &str = "user_preferences";
const DEFAULT_REST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LOG_MAX_SIZE_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_LOG_MAX_FILES: usize = 5;

const LOCAL_CACHE_FILE: &str = "preferences.json";
const REMOTE_DB_FILE: &str = "preferences.sqlite3";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown remote backend `{0}` (expected disabled, sqlite or rest)")]
    UnknownRemote(String),
    #[error("{0} must be set when the rest remote is selected")]
    MissingVar(&'static str),
    #[error("{var} is not a valid number: {value}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("failed to resolve application data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Disabled,
    Sqlite,
    Rest,
}

impl FromStr for RemoteKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "disabled" | "off" | "none" => Ok(RemoteKind::Disabled),
            "sqlite" => Ok(RemoteKind::Sqlite),
            "rest" => Ok(RemoteKind::Rest),
            other => Err(ConfigError::UnknownRemote(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub table: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteConfig {
    Disabled,
    Sqlite { db_path: PathBuf },
    Rest(RestConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub max_size_bytes: usize,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_LOG_MAX_SIZE_BYTES,
            max_files: DEFAULT_LOG_MAX_FILES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefsConfig {
    pub data_dir: PathBuf,
    pub remote: RemoteConfig,
    pub log: LogConfig,
}

impl PrefsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let kind = lookup(ENV_REMOTE)
            .map(|v| v.parse::<RemoteKind>())
            .transpose()?
            .unwrap_or(RemoteKind::Disabled);
        let remote = remote_from_lookup(kind, &data_dir, &lookup)?;

        let log = LogConfig {
            max_size_bytes: parse_number(&lookup, ENV_LOG_MAX_SIZE_BYTES)?
                .unwrap_or(DEFAULT_LOG_MAX_SIZE_BYTES),
            max_files: parse_number(&lookup, ENV_LOG_MAX_FILES)?.unwrap_or(DEFAULT_LOG_MAX_FILES),
        };

        Ok(Self {
            data_dir,
            remote,
            log,
        })
    }

    /// Point at another data directory. A SQLite remote that was using the
    /// default location follows the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let RemoteConfig::Sqlite { db_path } = &mut self.remote {
            if db_path == &self.data_dir.join(REMOTE_DB_FILE) {
                *db_path = dir.join(REMOTE_DB_FILE);
            }
        }
        self.data_dir = dir;
        self
    }

    pub fn with_remote_kind(self, kind: RemoteKind) -> Result<Self, ConfigError> {
        self.with_remote_kind_from(kind, |name| std::env::var(name).ok())
    }

    pub fn with_remote_kind_from<F>(mut self, kind: RemoteKind, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.remote = remote_from_lookup(kind, &self.data_dir, &lookup)?;
        Ok(self)
    }

    pub fn local_cache_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_CACHE_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn remote_from_lookup<F>(
    kind: RemoteKind,
    data_dir: &Path,
    lookup: &F,
) -> Result<RemoteConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match kind {
        RemoteKind::Disabled => Ok(RemoteConfig::Disabled),
        RemoteKind::Sqlite => {
            let db_path = lookup(ENV_REMOTE_DB)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(REMOTE_DB_FILE));
            Ok(RemoteConfig::Sqlite { db_path })
        }
        RemoteKind::Rest => {
            let base_url = lookup(ENV_REST_URL)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(ENV_REST_URL))?;
            let api_key = lookup(ENV_REST_API_KEY)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(ENV_REST_API_KEY))?;
            let timeout_ms =
                parse_number::<u64, _>(lookup, ENV_REST_TIMEOUT_MS)?.unwrap_or(DEFAULT_REST_TIMEOUT_MS);
            Ok(RemoteConfig::Rest(RestConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                access_token: lookup(ENV_REST_ACCESS_TOKEN).filter(|v| !v.is_empty()),
                table: lookup(ENV_REST_TABLE)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_REST_TABLE.to_string()),
                timeout: Duration::from_millis(timeout_ms),
            }))
        }
    }
}

fn parse_number<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        _ => Ok(None),
    }
}

fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or(ConfigError::NoDataDir)?;
    Ok(base.join(APP_IDENTIFIER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_disabled_remote() {
        let cfg = PrefsConfig::from_lookup(lookup(&[(ENV_DATA_DIR, "/tmp/prefs")])).unwrap();
        assert_eq!(cfg.remote, RemoteConfig::Disabled);
        assert_eq!(cfg.local_cache_path(), PathBuf::from("/tmp/prefs/preferences.json"));
        assert_eq!(cfg.log, LogConfig::default());
    }

    #[test]
    fn sqlite_remote_defaults_into_data_dir() {
        let cfg = PrefsConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/prefs"),
            (ENV_REMOTE, "SQLite"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.remote,
            RemoteConfig::Sqlite {
                db_path: PathBuf::from("/tmp/prefs/preferences.sqlite3")
            }
        );

        let moved = cfg.with_data_dir("/tmp/other");
        assert_eq!(
            moved.remote,
            RemoteConfig::Sqlite {
                db_path: PathBuf::from("/tmp/other/preferences.sqlite3")
            }
        );
    }

    #[test]
    fn rest_remote_requires_url_and_key() {
        let err = PrefsConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/prefs"),
            (ENV_REMOTE, "rest"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingVar(ENV_REST_URL));

        let cfg = PrefsConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/prefs"),
            (ENV_REMOTE, "rest"),
            (ENV_REST_URL, "https://example.test/"),
            (ENV_REST_API_KEY, "anon"),
            (ENV_REST_TIMEOUT_MS, "2500"),
        ]))
        .unwrap();
        match cfg.remote {
            RemoteConfig::Rest(rest) => {
                assert_eq!(rest.base_url, "https://example.test");
                assert_eq!(rest.table, DEFAULT_REST_TABLE);
                assert_eq!(rest.timeout, Duration::from_millis(2500));
                assert!(rest.access_token.is_none());
            }
            other => panic!("unexpected remote: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_remote_and_bad_numbers() {
        let err = PrefsConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/prefs"),
            (ENV_REMOTE, "firebase"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::UnknownRemote("firebase".into()));

        let err = PrefsConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/tmp/prefs"),
            (ENV_LOG_MAX_FILES, "many"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var, .. } if var == ENV_LOG_MAX_FILES));
    }
}
