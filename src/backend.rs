//! The capability contract storage backends implement

use bitflags::bitflags;

use crate::error::Result;
use crate::handle::FileHandle;

bitflags! {
    /// Engine-independent open intent.
    ///
    /// The adapter reduces the engine's open-flag bitset to this set before
    /// dispatch, so backend implementations never see wire constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenOptions: u32 {
        /// Create the file when it does not exist
        const CREATE = 1 << 0;
        /// Open for reading and writing
        const READ_WRITE = 1 << 1;
        /// Remove the file when the handle closes (journals, temp files)
        const DELETE_ON_CLOSE = 1 << 2;
        /// With `CREATE`, fail if the file already exists
        const EXCLUSIVE = 1 << 3;
    }
}

/// A pluggable storage backend.
///
/// `open` is the heart of the contract: it produces the [`FileHandle`] the
/// engine drives for the lifetime of the open file. The remaining
/// operations exist because the engine probes for and removes its side
/// files (rollback journals, super-journals) through the same backend.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Open `path`, producing a handle that owns its device and shares a
    /// lock ledger with every other handle on the same path.
    fn open(&self, path: &str, opts: OpenOptions) -> Result<FileHandle>;

    /// Remove `path`. Removing a missing file is not an error.
    fn delete(&self, path: &str) -> Result<()>;

    /// Does `path` currently exist?
    fn exists(&self, path: &str) -> Result<bool>;

    /// Canonical name for `path`; the engine derives journal names from it.
    fn full_path(&self, path: &str) -> Result<String> {
        Ok(path.to_owned())
    }
}
