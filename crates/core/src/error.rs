//! Error types for Lounge Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store stayed locked for every retry attempt
    #[error("Database still locked after {attempts} attempts: {source}")]
    Contention {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    /// Schema creation failed; the store cannot be used
    #[error("Schema error: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("Database is closed")]
    Closed,

    /// Empty, or the whitelist sentinel
    #[error("Unusable bot token")]
    InvalidToken,

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
