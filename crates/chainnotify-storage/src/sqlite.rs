//! SQLite cursor store.
//!
//! One row per feed in the `cursors` table. Uses `sqlx` with WAL mode so the
//! CLI can inspect cursors while `run` is writing them.
//!
//! # Usage
//! ```rust,no_run
//! use chainnotify_storage::sqlite::SqliteCursorStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteCursorStore::open("./cursors.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteCursorStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use chainnotify_core::{Cursor, CursorStore, NotifyError};

fn store_err(e: sqlx::Error) -> NotifyError {
    NotifyError::Store(e.to_string())
}

/// SQLite-backed [`CursorStore`].
pub struct SqliteCursorStore {
    pool: SqlitePool,
}

impl SqliteCursorStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./cursors.db"`) or a full
    /// SQLite URL (`"sqlite:./cursors.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, NotifyError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(store_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. All data is lost on drop.
    pub async fn in_memory() -> Result<Self, NotifyError> {
        // Every connection to `:memory:` is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(store_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), NotifyError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cursors (
                feed_id              TEXT    PRIMARY KEY,
                last_processed_block INTEGER NOT NULL,
                updated_at           INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }
}

fn cursor_from_row(row: &SqliteRow) -> Result<Cursor, NotifyError> {
    let feed_id: String = row.try_get("feed_id").map_err(store_err)?;
    let height: i64 = row.try_get("last_processed_block").map_err(store_err)?;
    let last_processed_block = u64::try_from(height).map_err(|_| {
        NotifyError::Store(format!("cursor of '{feed_id}' holds a negative block {height}"))
    })?;
    Ok(Cursor {
        last_processed_block,
        updated_at: row.try_get("updated_at").map_err(store_err)?,
        feed_id,
    })
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Cursor>, NotifyError> {
        let row = sqlx::query(
            "SELECT feed_id, last_processed_block, updated_at
             FROM cursors WHERE feed_id = ?",
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref().map(cursor_from_row).transpose()
    }

    async fn advance(&self, feed_id: &str, block_number: u64) -> Result<(), NotifyError> {
        let height = i64::try_from(block_number).map_err(|_| {
            NotifyError::Store(format!("block {block_number} does not fit an INTEGER column"))
        })?;

        sqlx::query(
            "INSERT INTO cursors (feed_id, last_processed_block, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (feed_id) DO UPDATE SET
                last_processed_block = excluded.last_processed_block,
                updated_at           = excluded.updated_at",
        )
        .bind(feed_id)
        .bind(height)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(feed = feed_id, block = block_number, "cursor saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>, NotifyError> {
        let rows = sqlx::query(
            "SELECT feed_id, last_processed_block, updated_at
             FROM cursors ORDER BY feed_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(cursor_from_row).collect()
    }

    async fn reset(&self, feed_id: &str) -> Result<(), NotifyError> {
        sqlx::query("DELETE FROM cursors WHERE feed_id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        debug!(feed = feed_id, "cursor reset");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
