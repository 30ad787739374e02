//! Feed cursors, the last block height processed per feed.
//!
//! A cursor is written at the end of every successful poll cycle. On the next
//! cycle the feed resumes from it rather than from the chain head.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::NotifyError;

/// A persisted watermark for one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Feed identifier (the record key).
    pub feed_id: String,
    /// Upper bound of the last successfully scanned range.
    pub last_processed_block: u64,
    /// Unix timestamp of the last write.
    pub updated_at: i64,
}

impl Cursor {
    pub fn new(feed_id: impl Into<String>, last_processed_block: u64) -> Self {
        Self {
            feed_id: feed_id.into(),
            last_processed_block,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Durable feed-id → block-height map.
///
/// `advance` is an unconditional upsert (last writer wins). There is no
/// compare-and-swap: two concurrent `advance` calls for the same feed can
/// silently lose one update, so callers must run at most one poll per feed at
/// a time.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the cursor for `feed_id` (`None` if the feed was never polled).
    async fn get(&self, feed_id: &str) -> Result<Option<Cursor>, NotifyError>;

    /// Create or overwrite the cursor for `feed_id`.
    async fn advance(&self, feed_id: &str, block_number: u64) -> Result<(), NotifyError>;

    /// All stored cursors, ordered by feed id.
    async fn list(&self) -> Result<Vec<Cursor>, NotifyError>;

    /// Delete the cursor so the feed restarts from the chain head.
    async fn reset(&self, feed_id: &str) -> Result<(), NotifyError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// In-memory cursor store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    data: Mutex<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `(feed_id, block)` pairs.
    pub fn with_cursors<'a>(cursors: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let data = cursors
            .into_iter()
            .map(|(id, block)| (id.to_string(), Cursor::new(id, block)))
            .collect();
        Self {
            data: Mutex::new(data),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Cursor>>, NotifyError> {
        self.data
            .lock()
            .map_err(|_| NotifyError::Store("cursor map lock poisoned".into()))
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Cursor>, NotifyError> {
        Ok(self.lock()?.get(feed_id).cloned())
    }

    async fn advance(&self, feed_id: &str, block_number: u64) -> Result<(), NotifyError> {
        self.lock()?
            .insert(feed_id.to_string(), Cursor::new(feed_id, block_number));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>, NotifyError> {
        let mut cursors: Vec<Cursor> = self.lock()?.values().cloned().collect();
        cursors.sort_by(|a, b| a.feed_id.cmp(&b.feed_id));
        Ok(cursors)
    }

    async fn reset(&self, feed_id: &str) -> Result<(), NotifyError> {
        self.lock()?.remove(feed_id);
        Ok(())
    }
}
