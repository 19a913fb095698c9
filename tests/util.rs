#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use matrix_prefs_lib::prefs::{
    LocalCache, PreferenceKey, RemoteFetch, RemotePreferences, RemoteSave,
};
use matrix_prefs_lib::{AppError, AppResult};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn temp_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:")
}

/// How the scripted remote behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMode {
    /// Acts like a provisioned table held in memory.
    Healthy,
    NotProvisioned,
    Transient,
}

/// In-memory remote whose availability can be switched between calls.
pub struct ScriptedRemote {
    mode: Mutex<RemoteMode>,
    rows: Mutex<HashMap<(String, String), Value>>,
    pub fetches: AtomicUsize,
    pub saves: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new(mode: RemoteMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            rows: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: RemoteMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn insert(&self, owner: &str, key: &PreferenceKey, value: Value) {
        self.rows
            .lock()
            .unwrap()
            .insert((owner.to_string(), key.to_string()), value);
    }

    pub fn row(&self, owner: &str, key: &PreferenceKey) -> Option<Value> {
        self.rows
            .lock()
            .unwrap()
            .get(&(owner.to_string(), key.to_string()))
            .cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn mode(&self) -> RemoteMode {
        *self.mode.lock().unwrap()
    }
}

fn offline() -> AppError {
    AppError::new("REMOTE/CONNECT", "connection refused")
}

#[async_trait]
impl RemotePreferences for ScriptedRemote {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, owner_id: &str, key: &PreferenceKey) -> RemoteFetch {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            RemoteMode::Healthy => match self.row(owner_id, key) {
                Some(value) => RemoteFetch::Found(value),
                None => RemoteFetch::NotFound,
            },
            RemoteMode::NotProvisioned => RemoteFetch::NotProvisioned,
            RemoteMode::Transient => RemoteFetch::Transient(offline()),
        }
    }

    async fn save(&self, owner_id: &str, key: &PreferenceKey, value: &Value) -> RemoteSave {
        self.saves.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            RemoteMode::Healthy => {
                self.insert(owner_id, key, value.clone());
                RemoteSave::Saved
            }
            RemoteMode::NotProvisioned => RemoteSave::NotProvisioned,
            RemoteMode::Transient => RemoteSave::Transient(offline()),
        }
    }
}

/// Local cache that refuses every write, like a full quota.
#[derive(Default)]
pub struct FullLocal;

impl LocalCache for FullLocal {
    fn get_raw(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_raw(&self, _key: &str, _raw: &str) -> AppResult<()> {
        Err(AppError::new("IO/QuotaExceeded", "storage quota exceeded"))
    }
}
