//! Preference storage for the Eisenhower Matrix app.
//!
//! Preferences are read from and written to a remote table when one is
//! available, with a local cache that keeps the app usable when it is not.
//! See [`prefs::PreferenceStore`] for the read/write rules.

pub mod config;
pub mod db;
mod error;
pub mod logging;
pub mod migrate;
pub mod prefs;
pub mod sidebar;
pub mod state;
pub mod theme;
pub mod time;

pub use error::{AppError, AppResult};
pub use logging::{flush_file_logs, init_file_logging, init_logging};
pub use state::PrefsContext;
