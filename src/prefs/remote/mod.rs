//! Remote preference backends.
//!
//! Every backend classifies its own failures into [`RemoteFetch`] / [`RemoteSave`];
//! nothing leaves this module as an `Err`.

use async_trait::async_trait;
use serde_json::Value;

use crate::prefs::key::PreferenceKey;
use crate::prefs::outcome::{RemoteFetch, RemoteSave};

mod rest;
mod sqlite;

pub use rest::RestRemote;
pub use sqlite::SqliteRemote;

/// Name of the table holding one row per (owner, preference key).
pub const PREFERENCES_TABLE: &str = "user_preferences";

#[async_trait]
pub trait RemotePreferences: Send + Sync {
    /// Short backend label for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, owner_id: &str, key: &PreferenceKey) -> RemoteFetch;

    /// Whole-value upsert keyed on (owner_id, key).
    async fn save(&self, owner_id: &str, key: &PreferenceKey, value: &Value) -> RemoteSave;
}

/// Backend for deployments without remote preference support. Reports
/// `NotProvisioned` for everything so callers run on the local cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRemote;

#[async_trait]
impl RemotePreferences for DisabledRemote {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn fetch(&self, _owner_id: &str, _key: &PreferenceKey) -> RemoteFetch {
        RemoteFetch::NotProvisioned
    }

    async fn save(&self, _owner_id: &str, _key: &PreferenceKey, _value: &Value) -> RemoteSave {
        RemoteSave::NotProvisioned
    }
}
