use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::AppError;

/// Classified result of a remote read.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFetch {
    Found(Value),
    /// Remote reachable, no row for this owner/key.
    NotFound,
    /// Preference table is missing on this deployment.
    NotProvisioned,
    /// Network, permission or anything unexpected.
    Transient(AppError),
}

/// Classified result of a remote upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteSave {
    Saved,
    NotProvisioned,
    Transient(AppError),
}

/// Which path served a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSource {
    Remote,
    Local,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
    SavedLocallyOnly,
}

/// What the caller of a save gets back. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SaveOutcome {
    pub used_remote: bool,
    /// Soft warning when the remote failed transiently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub warning: Option<String>,
}

impl SaveOutcome {
    pub fn remote() -> Self {
        Self {
            used_remote: true,
            warning: None,
        }
    }

    pub fn local_only(warning: Option<String>) -> Self {
        Self {
            used_remote: false,
            warning,
        }
    }

    pub fn status(&self) -> SaveStatus {
        if self.used_remote {
            SaveStatus::Saved
        } else {
            SaveStatus::SavedLocallyOnly
        }
    }
}

/// A read result together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    pub source: PreferenceSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_tracks_remote_usage() {
        assert_eq!(SaveOutcome::remote().status(), SaveStatus::Saved);
        assert_eq!(
            SaveOutcome::local_only(Some("offline".into())).status(),
            SaveStatus::SavedLocallyOnly
        );
    }

    #[test]
    fn outcome_serializes_for_the_ui() {
        let json = serde_json::to_value(SaveOutcome::local_only(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "used_remote": false }));
        assert_eq!(
            serde_json::to_value(SaveStatus::SavedLocallyOnly).unwrap(),
            "saved_locally_only"
        );
    }
}
