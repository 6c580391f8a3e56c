//! Error types for the schedule store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite rejected a statement or transaction
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A thread panicked while holding a connection
    #[error("Database connection lock poisoned")]
    Poisoned,
}
