use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, warn};

use crate::prefs::key::PreferenceKey;
use crate::{AppError, AppResult};

/// Durable string key/value storage scoped to this client installation.
///
/// Values are serialized payloads; interpretation is left to [`LocalStoreHandle`].
pub trait LocalCache: Send + Sync {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&self, key: &str, raw: &str) -> AppResult<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl LocalCache for MemoryStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set_raw(&self, key: &str, raw: &str) -> AppResult<()> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| AppError::new("PREFS/LOCAL_POISONED", "local store lock poisoned"))?;
        guard.insert(key.to_string(), raw.to_string());
        Ok(())
    }
}

/// Single JSON document on disk mapping local keys to serialized payloads.
///
/// A document that fails to parse reads as empty and is replaced on the next write.
/// An entry that is not a string is dropped on its own.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str::<BTreeMap<String, Value>>(&data) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(raw) => Some((key, raw)),
                    _ => {
                        debug!(
                            target: "matrix_prefs",
                            event = "pref_local_corrupt",
                            key = %key,
                            reason = "not_a_string"
                        );
                        None
                    }
                })
                .collect(),
            Err(err) => {
                debug!(
                    target: "matrix_prefs",
                    event = "pref_local_document_corrupt",
                    path = %self.path.display(),
                    error = %err
                );
                BTreeMap::new()
            }
        }
    }
}

impl LocalCache for JsonFileStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().ok()?;
        self.load().remove(key)
    }

    fn set_raw(&self, key: &str, raw: &str) -> AppResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::new("PREFS/LOCAL_POISONED", "local store lock poisoned"))?;
        let mut map = self.load();
        map.insert(key.to_string(), raw.to_string());
        let data = serde_json::to_vec_pretty(&map)?;
        write_atomic(&self.path, &data)
            .map_err(|err| err.with_context("path", self.path.display().to_string()))
    }
}

/// Replace `path` with `data` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> AppResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| AppError::from(err.error))?;
    Ok(())
}

#[cfg(feature = "desktop")]
pub struct TauriStore {
    inner: Arc<tauri_plugin_store::Store<tauri::Wry>>,
}

#[cfg(feature = "desktop")]
impl LocalCache for TauriStore {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.inner
            .get(key)
            .and_then(|value| value.as_str().map(str::to_owned))
    }

    fn set_raw(&self, key: &str, raw: &str) -> AppResult<()> {
        self.inner.set(key, raw);
        self.inner
            .save()
            .map_err(|err| AppError::new("PREFS/LOCAL_STORE", err.to_string()))
    }
}

/// Cloneable handle over whichever local cache backs this client.
#[derive(Clone)]
pub struct LocalStoreHandle {
    inner: Arc<dyn LocalCache>,
}

impl LocalStoreHandle {
    pub fn new(store: Arc<dyn LocalCache>) -> Self {
        Self { inner: store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JsonFileStore::new(path)))
    }

    #[cfg(feature = "desktop")]
    pub fn tauri(store: Arc<tauri_plugin_store::Store<tauri::Wry>>) -> Self {
        Self::new(Arc::new(TauriStore { inner: store }))
    }

    /// Cached value for `key`. An unparsable payload is a miss.
    pub fn read_local(&self, key: &PreferenceKey) -> Option<Value> {
        let local_key = key.local_key();
        let raw = self.inner.get_raw(&local_key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    target: "matrix_prefs",
                    event = "pref_local_corrupt",
                    key = %key,
                    error = %err
                );
                None
            }
        }
    }

    /// Best-effort write. Failures are logged and swallowed.
    pub fn write_local(&self, key: &PreferenceKey, value: &Value) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(target: "matrix_prefs", event = "pref_local_write_failed", key = %key, error = %err);
                return;
            }
        };
        if let Err(err) = self.inner.set_raw(&key.local_key(), &raw) {
            warn!(
                target: "matrix_prefs",
                event = "pref_local_write_failed",
                key = %key,
                error = %err
            );
        }
    }
}
