//! Opening engine connections through a registered backend
//!
//! The engine selects a storage backend by name at open time
//! (`sqlite3_open_v2(file, db, flags, vfs_name)`); these helpers are that
//! call expressed through rusqlite. An unresolvable name surfaces as the
//! engine's own open failure.

use rusqlite::{Connection, OpenFlags};

use crate::error::Result;

/// Open `path` through the backend registered as `backend_name`, with the
/// engine's default read-write-create flags.
pub fn open_db(path: &str, backend_name: &str) -> Result<Connection> {
    open_db_with_flags(path, backend_name, OpenFlags::default())
}

/// Open `path` through `backend_name` with explicit engine flags.
pub fn open_db_with_flags(
    path: &str,
    backend_name: &str,
    flags: OpenFlags,
) -> Result<Connection> {
    Ok(Connection::open_with_flags_and_vfs(path, flags, backend_name)?)
}
