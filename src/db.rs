use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Sqlite};

/// Open (creating if missing) the SQLite database backing the shared preference table.
pub async fn open_sqlite_pool(db_path: &Path) -> AnyResult<Pool<Sqlite>> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            tracing::error!(
                target: "matrix_prefs",
                event = "db_dir_create_failed",
                error = %e,
                path = %parent.display()
            );
            e
        })?;
    }
    tracing::info!(target: "matrix_prefs", event = "db_path", path = %db_path.display());

    let opts = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .log_statements(log::LevelFilter::Off);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .after_connect(|conn, _| {
            Box::pin(async move {
                sqlx::query("PRAGMA busy_timeout = 5000;")
                    .execute(&mut *conn)
                    .await?;
                Ok::<_, sqlx::Error>(())
            })
        })
        .connect_with(opts)
        .await
        .with_context(|| format!("open sqlite database at {}", db_path.display()))?;

    log_effective_pragmas(&pool).await;

    Ok(pool)
}

async fn log_effective_pragmas(pool: &Pool<Sqlite>) {
    let (sqlite_ver,): (String,) = sqlx::query_as("select sqlite_version()")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    let jm: (String,) = sqlx::query_as("PRAGMA journal_mode;")
        .fetch_one(pool)
        .await
        .unwrap_or((String::from("unknown"),));

    tracing::info!(
        target: "matrix_prefs",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm.0
    );

    if !jm.0.eq_ignore_ascii_case("wal") {
        tracing::warn!(
            target: "matrix_prefs",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}

/// Whether `table` exists in the connected database.
pub async fn table_exists(pool: &Pool<Sqlite>, table: &str) -> AnyResult<bool> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(exists.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn opens_pool_in_wal_mode_and_creates_parent() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("nested").join("prefs.sqlite3");
        let pool = open_sqlite_pool(&path).await.expect("pool");

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode;")
            .fetch_one(&pool)
            .await
            .expect("journal mode");
        assert_eq!(mode.to_ascii_lowercase(), "wal");
        assert!(!table_exists(&pool, "user_preferences").await.expect("probe"));
        pool.close().await;
    }
}
