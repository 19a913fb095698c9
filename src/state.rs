use std::sync::Arc;

use anyhow::Context;
use sqlx::SqlitePool;

use crate::config::{PrefsConfig, RemoteConfig};
use crate::db::open_sqlite_pool;
use crate::prefs::{
    DisabledRemote, LocalStoreHandle, PreferenceStore, RemotePreferences, RestRemote, SqliteRemote,
};

/// Everything a preference operation needs, built once and passed explicitly.
#[derive(Clone)]
pub struct PrefsContext {
    pub config: Arc<PrefsConfig>,
    pub store: PreferenceStore,
    pool: Option<SqlitePool>,
}

impl PrefsContext {
    /// Build the configured remote backend over the on-disk local cache.
    pub async fn from_config(config: PrefsConfig) -> anyhow::Result<Self> {
        let local = LocalStoreHandle::file(config.local_cache_path());
        let (remote, pool): (Arc<dyn RemotePreferences>, Option<SqlitePool>) = match &config.remote {
            RemoteConfig::Disabled => (Arc::new(DisabledRemote), None),
            RemoteConfig::Sqlite { db_path } => {
                let pool = open_sqlite_pool(db_path)
                    .await
                    .context("open shared preference database")?;
                (Arc::new(SqliteRemote::new(pool.clone())), Some(pool))
            }
            RemoteConfig::Rest(rest) => {
                let remote = RestRemote::new(rest.clone()).context("build REST client")?;
                (Arc::new(remote), None)
            }
        };

        tracing::debug!(
            target: "matrix_prefs",
            event = "prefs_context_ready",
            backend = remote.name(),
            local_cache = %config.local_cache_path().display()
        );

        Ok(Self {
            config: Arc::new(config),
            store: PreferenceStore::new(remote, local),
            pool,
        })
    }

    /// Context with caller-supplied adapters, for embedding and tests.
    pub fn with_adapters(
        config: PrefsConfig,
        remote: Arc<dyn RemotePreferences>,
        local: LocalStoreHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store: PreferenceStore::new(remote, local),
            pool: None,
        }
    }

    /// Pool behind the SQLite remote, when that backend is active.
    pub fn sqlite_pool(&self) -> Option<&SqlitePool> {
        self.pool.as_ref()
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
