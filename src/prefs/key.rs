use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for the installation-wide local cache namespace.
pub const LOCAL_NAMESPACE: &str = "matrix";
pub const MAX_KEY_LEN: usize = 64;

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").expect("static key pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("preference key is empty")]
    Empty,
    #[error("preference key exceeds 64 characters")]
    TooLong,
    #[error("preference key `{0}` may only contain a-z, 0-9, '.', '_' and '-'")]
    InvalidChars(String),
}

/// Name of one preference kind, e.g. `sidebar-order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreferenceKey(String);

impl PreferenceKey {
    pub fn new(raw: impl Into<String>) -> Result<Self, KeyError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong);
        }
        if !KEY_RE.is_match(&raw) {
            return Err(KeyError::InvalidChars(raw));
        }
        Ok(Self(raw))
    }

    pub fn sidebar_order() -> Self {
        Self(SIDEBAR_ORDER.to_string())
    }

    pub fn theme_settings() -> Self {
        Self(THEME_SETTINGS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used in the local cache. Shared by every owner on this installation.
    pub fn local_key(&self) -> String {
        format!("{LOCAL_NAMESPACE}.{}", self.0)
    }
}

pub const SIDEBAR_ORDER: &str = "sidebar-order";
pub const THEME_SETTINGS: &str = "theme-settings";

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PreferenceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PreferenceKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PreferenceKey> for String {
    fn from(key: PreferenceKey) -> Self {
        key.0
    }
}
