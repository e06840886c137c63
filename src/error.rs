//! Error types for backend, registry, and adapter operations

use thiserror::Error;

use crate::lock::LockState;

/// Errors surfaced by plugfs operations
#[derive(Error, Debug)]
pub enum PlugfsError {
    /// A backend is already registered under this name
    #[error("Backend already registered: {0}")]
    DuplicateName(String),

    /// No backend is registered under this name
    #[error("Backend not registered: {0}")]
    UnknownBackend(String),

    /// Open without `CREATE` on a file that does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Exclusive create on a file that already exists
    #[error("File already exists: {0}")]
    FileExists(String),

    /// Lock contention; routine, retry policy belongs to the engine's
    /// busy handler
    #[error("Cannot acquire {requested:?} on {path}: held by another handle")]
    Busy { path: String, requested: LockState },

    /// Read range ran past end of file; `read` bytes were real, the rest of
    /// the buffer was zero-filled
    #[error("Short read at offset {offset}: {read} of {requested} bytes available")]
    ShortRead {
        offset: u64,
        requested: usize,
        read: usize,
    },

    /// Backend name cannot be represented as a C string
    #[error("Invalid backend name: {0}")]
    InvalidName(String),

    /// SQLite refused the VFS registration
    #[error("VFS registration failed: {0}")]
    Registration(i32),

    /// Backend I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the engine itself
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, PlugfsError>;
