//! Persistent storage for Blockwarden.
//!
//! One SQLite database holds the operator accounts, the uploaded mod
//! catalogue and the audit trail. Live player state is deliberately NOT
//! here; it lives in memory in `blockwarden-registry`.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = Store::connect("data/database.db").await?;
//! store.migrate().await?;
//! store.seed_default_admin(&hash).await?;
//! let user = store.find_user_by_username("admin").await?;
//! ```

mod audit;
mod error;
mod mods;
mod schema;
mod users;

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

pub use audit::NewAuditEntry;
pub use error::StoreError;
pub use mods::{ModRecord, NewMod};
pub use users::{DEFAULT_ADMIN_USERNAME, NewUser, UserRecord};

/// Handle to the database. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if needed) the database file at `path`.
    ///
    /// Parent directories are created. The connection runs in WAL mode
    /// with foreign keys enforced.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        tracing::info!(path = %path.display(), "database opened");
        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is pinned to a single connection that never idles out;
    /// every new SQLite memory connection would otherwise be a fresh,
    /// empty database.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Creates every table and index that does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("schema up to date");
        Ok(())
    }

    /// Round-trips a trivial query.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> Store {
    let store = Store::connect_in_memory().await.expect("in-memory db");
    store.migrate().await.expect("migrate");
    store
}
