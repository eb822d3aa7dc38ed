//! Persistence service access
//!
//! The relational store is an external service reached through its REST
//! query interface; this crate never speaks SQL. Business logic depends on
//! the narrow traits defined here ([`UserDirectory`], [`HighlightStore`],
//! [`AttemptLog`]) so tests and the dry-run CLI can substitute the
//! in-memory implementations from [`memory`].

pub mod audit;
pub mod client;
pub mod directory;
pub mod highlights;
pub mod memory;

pub use audit::{AttemptLog, RestAttemptLog};
pub use client::{StoreClient, StoreConfig};
pub use directory::{DirectoryError, RestUserDirectory, UserDirectory};
pub use highlights::{HighlightStore, RestHighlightStore};
pub use memory::{MemoryAttemptLog, MemoryDirectory, MemoryHighlightStore};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur talking to the persistence service
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded
    #[error("store response decode failed: {reason}")]
    Decode { reason: String },

    /// Invalid store configuration
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Backend unavailable (used by in-memory fakes and local failures)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
