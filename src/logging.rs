use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use once_cell::sync::{Lazy, OnceCell};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

pub const LOG_ENV: &str = "MATRIX_PREFS_LOG";
pub const LOG_FILE_NAME: &str = "matrix-prefs.log";
const DEFAULT_FILTER: &str = "matrix_prefs=info,sqlx=warn";

static FILE_WRITER: OnceCell<NonBlocking> = OnceCell::new();
static FILE_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

fn env_filter() -> EnvFilter {
    EnvFilter::new(std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into()))
}

/// Forwards to the rotating file sink once it is wired, drops lines before that.
struct FileSink;

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match FILE_WRITER.get() {
            Some(writer) => writer.clone().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match FILE_WRITER.get() {
            Some(writer) => writer.clone().flush(),
            None => Ok(()),
        }
    }
}

/// Install the global subscriber: JSON lines on stderr plus the file layer.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();

    let stderr_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(io::stderr)
        .with_filter(env_filter());

    let file_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_target(true)
        .with_ansi(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(|| FileSink)
        .with_filter(env_filter());

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
}

/// Wire the rotating file sink under `logs_dir`.
pub fn init_file_logging(logs_dir: &Path, config: &LogConfig) -> anyhow::Result<()> {
    if FILE_WRITER.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("create logs directory {}", logs_dir.display()))?;

    let rotate = FileRotate::new(
        logs_dir.join(LOG_FILE_NAME),
        AppendCount::new(config.max_files.max(1)),
        ContentLimit::BytesSurpassed(config.max_size_bytes.max(1024)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let (writer, guard) = tracing_appender::non_blocking(rotate);

    if FILE_WRITER.set(writer).is_ok() {
        if let Ok(mut slot) = FILE_GUARD.lock() {
            *slot = Some(guard);
        }
    }

    tracing::debug!(
        target: "matrix_prefs",
        event = "file_logging_ready",
        path = %logs_dir.display(),
        max_size_bytes = config.max_size_bytes,
        max_files = config.max_files
    );
    Ok(())
}

/// Drain the non-blocking writer. No more file output after this returns.
pub fn flush_file_logs() {
    if let Ok(mut slot) = FILE_GUARD.lock() {
        drop(slot.take());
    }
}
