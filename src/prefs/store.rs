use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::prefs::key::PreferenceKey;
use crate::prefs::local::LocalStoreHandle;
use crate::prefs::outcome::{PreferenceSource, RemoteFetch, RemoteSave, Resolved, SaveOutcome};
use crate::prefs::remote::RemotePreferences;

/// Remote-first preference access with the local cache as fallback and shadow.
#[derive(Clone)]
pub struct PreferenceStore {
    remote: Arc<dyn RemotePreferences>,
    local: LocalStoreHandle,
}

impl PreferenceStore {
    pub fn new(remote: Arc<dyn RemotePreferences>, local: LocalStoreHandle) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &LocalStoreHandle {
        &self.local
    }

    pub fn remote_name(&self) -> &'static str {
        self.remote.name()
    }

    pub async fn get_preference(&self, owner_id: &str, key: &PreferenceKey, default: Value) -> Value {
        self.resolve(owner_id, key, default).await.value
    }

    /// Like [`get_preference`](Self::get_preference) but also reports which path answered.
    pub async fn resolve(&self, owner_id: &str, key: &PreferenceKey, default: Value) -> Resolved {
        let backend = self.remote.name();
        match self.remote.fetch(owner_id, key).await {
            RemoteFetch::Found(value) => {
                debug!(target: "matrix_prefs", event = "pref_remote_hit", backend, key = %key);
                self.local.write_local(key, &value);
                Resolved {
                    value,
                    source: PreferenceSource::Remote,
                }
            }
            RemoteFetch::NotFound => {
                debug!(target: "matrix_prefs", event = "pref_remote_not_found", backend, key = %key);
                Resolved {
                    value: default,
                    source: PreferenceSource::Default,
                }
            }
            RemoteFetch::NotProvisioned => {
                info!(target: "matrix_prefs", event = "pref_remote_not_provisioned", backend, key = %key);
                self.fallback_to_local(key, default)
            }
            RemoteFetch::Transient(err) => {
                warn!(
                    target: "matrix_prefs",
                    event = "pref_remote_transient",
                    backend,
                    op = "fetch",
                    key = %key,
                    code = %err.code(),
                    error = %err
                );
                self.fallback_to_local(key, default)
            }
        }
    }

    fn fallback_to_local(&self, key: &PreferenceKey, default: Value) -> Resolved {
        match self.local.read_local(key) {
            Some(value) => {
                debug!(target: "matrix_prefs", event = "pref_local_hit", key = %key);
                Resolved {
                    value,
                    source: PreferenceSource::Local,
                }
            }
            None => {
                debug!(target: "matrix_prefs", event = "pref_local_miss", key = %key);
                Resolved {
                    value: default,
                    source: PreferenceSource::Default,
                }
            }
        }
    }

    /// Write locally, then try the remote. Never fails from the caller's view.
    pub async fn set_preference(&self, owner_id: &str, key: &PreferenceKey, value: &Value) -> SaveOutcome {
        self.local.write_local(key, value);

        let backend = self.remote.name();
        match self.remote.save(owner_id, key, value).await {
            RemoteSave::Saved => {
                info!(target: "matrix_prefs", event = "pref_saved", backend, key = %key);
                SaveOutcome::remote()
            }
            RemoteSave::NotProvisioned => {
                info!(
                    target: "matrix_prefs",
                    event = "pref_saved_locally_only",
                    backend,
                    key = %key,
                    reason = "not_provisioned"
                );
                SaveOutcome::local_only(None)
            }
            RemoteSave::Transient(err) => {
                warn!(
                    target: "matrix_prefs",
                    event = "pref_remote_transient",
                    backend,
                    op = "save",
                    key = %key,
                    code = %err.code(),
                    error = %err
                );
                SaveOutcome::local_only(Some(format!(
                    "Saved on this device only; sync failed: {}",
                    err.message()
                )))
            }
        }
    }

    /// Typed read. A stored value that does not deserialize yields `default`.
    pub async fn get_typed<T>(&self, owner_id: &str, key: &PreferenceKey, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let fallback = match serde_json::to_value(&default) {
            Ok(value) => value,
            Err(_) => Value::Null,
        };
        let value = self.get_preference(owner_id, key, fallback).await;
        match serde_json::from_value(value) {
            Ok(typed) => typed,
            Err(err) => {
                warn!(target: "matrix_prefs", event = "pref_decode_failed", key = %key, error = %err);
                default
            }
        }
    }

    pub async fn set_typed<T>(&self, owner_id: &str, key: &PreferenceKey, value: &T) -> SaveOutcome
    where
        T: Serialize,
    {
        match serde_json::to_value(value) {
            Ok(value) => self.set_preference(owner_id, key, &value).await,
            Err(err) => {
                warn!(target: "matrix_prefs", event = "pref_encode_failed", key = %key, error = %err);
                SaveOutcome::local_only(Some(format!("Could not encode preference: {err}")))
            }
        }
    }
}
