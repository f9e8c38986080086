//! Error types for the store.

/// Errors that can occur while talking to the database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `insert_user` hit the unique index on `users.username`.
    #[error("username already exists: {0}")]
    DuplicateUsername(String),

    /// The database directory could not be created.
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    /// Any other driver or query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
