use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::{RemotePreferences, PREFERENCES_TABLE};
use crate::prefs::key::PreferenceKey;
use crate::prefs::outcome::{RemoteFetch, RemoteSave};
use crate::time::now_ms;
use crate::AppError;

/// Preference table in a shared SQLite database.
#[derive(Clone)]
pub struct SqliteRemote {
    pool: SqlitePool,
}

impl SqliteRemote {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_missing_table(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("no such table") && msg.contains(PREFERENCES_TABLE)
        }
        _ => false,
    }
}

#[async_trait]
impl RemotePreferences for SqliteRemote {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch(&self, owner_id: &str, key: &PreferenceKey) -> RemoteFetch {
        let result = sqlx::query(
            "SELECT value FROM user_preferences WHERE owner_id = ?1 AND preference_key = ?2",
        )
        .bind(owner_id)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => {
                let raw: String = match row.try_get("value") {
                    Ok(raw) => raw,
                    Err(err) => return RemoteFetch::Transient(AppError::from(err)),
                };
                match serde_json::from_str(&raw) {
                    Ok(value) => RemoteFetch::Found(value),
                    Err(err) => RemoteFetch::Transient(
                        AppError::from(err).with_context("key", key.to_string()),
                    ),
                }
            }
            Ok(None) => RemoteFetch::NotFound,
            Err(err) if is_missing_table(&err) => RemoteFetch::NotProvisioned,
            Err(err) => RemoteFetch::Transient(AppError::from(err)),
        }
    }

    async fn save(&self, owner_id: &str, key: &PreferenceKey, value: &Value) -> RemoteSave {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => return RemoteSave::Transient(AppError::from(err)),
        };
        let result = sqlx::query(
            "INSERT INTO user_preferences (owner_id, preference_key, value, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(owner_id, preference_key) \
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(owner_id)
        .bind(key.as_str())
        .bind(&raw)
        .bind(now_ms())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => RemoteSave::Saved,
            Err(err) if is_missing_table(&err) => RemoteSave::NotProvisioned,
            Err(err) => RemoteSave::Transient(AppError::from(err)),
        }
    }
}
