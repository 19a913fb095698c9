//! Per-owner preferences with a remote store and a local fallback cache.

pub mod key;
pub mod local;
pub mod outcome;
pub mod remote;
pub mod store;

pub use key::{KeyError, PreferenceKey};
pub use local::{JsonFileStore, LocalCache, LocalStoreHandle, MemoryStore};
pub use outcome::{PreferenceSource, RemoteFetch, RemoteSave, Resolved, SaveOutcome, SaveStatus};
pub use remote::{DisabledRemote, RemotePreferences, RestRemote, SqliteRemote};
pub use store::PreferenceStore;
