//! # plugfs - Pluggable Storage Backends for SQLite
//!
//! `plugfs` lets SQLite delegate all physical storage access to a
//! caller-supplied backend instead of the operating system's filesystem:
//!
//! - **Backend capability contract**: open/close, ranged reads and writes,
//!   truncate, sync, size, and the engine's locking protocol
//! - **Faithful five-state locking**: NONE/SHARED/RESERVED/PENDING/EXCLUSIVE
//!   with the exact concurrency table SQLite's transaction isolation assumes
//! - **Named registry**: multiple backends coexist and are selected per
//!   database at open time
//! - **In-memory reference backend** for tests and ephemeral databases
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plugfs::{open_db, register_backend, MemBackend};
//!
//! # fn main() -> plugfs::Result<()> {
//! // Register a backend under a name, once, before any open
//! register_backend("mem", Arc::new(MemBackend::new()))?;
//!
//! // Every database opened with that name lives in the backend
//! let conn = open_db("app.db", "mem")?;
//! conn.execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", [])?;
//! conn.execute("INSERT INTO kv VALUES ('greeting', 'hello')", [])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Backends
//!
//! Implement [`Backend`] (and [`Device`] for the byte store) to put
//! databases anywhere bytes can live. The locking protocol comes for free:
//! backends hand every handle on one path the same [`LockLedger`] and the
//! crate enforces the transition table.

pub mod backend;
pub mod db;
pub mod device;
pub mod error;
pub mod handle;
pub mod lock;
pub mod mem;
pub mod registry;
pub mod vfs;

pub use backend::{Backend, OpenOptions};
pub use db::{open_db, open_db_with_flags};
pub use device::Device;
pub use error::{PlugfsError, Result};
pub use handle::FileHandle;
pub use lock::{LockLedger, LockState};
pub use mem::MemBackend;
pub use registry::BackendRegistry;
pub use vfs::{register_backend, unregister_backend};
