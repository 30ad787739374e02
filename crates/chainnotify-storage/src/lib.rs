//! chainnotify-storage — durable [`CursorStore`](chainnotify_core::CursorStore) backends.
//!
//! Backends:
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//!
//! The in-memory store lives in `chainnotify-core` as
//! [`MemoryCursorStore`](chainnotify_core::MemoryCursorStore).

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCursorStore;
