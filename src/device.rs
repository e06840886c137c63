//! Byte-addressable storage devices

use crate::error::Result;

/// The byte store backing one open file.
///
/// Offsets are absolute. Writes past the current end extend the device and
/// zero-fill any gap; bytes exposed by a growing truncate read back as
/// zeros. `sync` is a durability hook and must succeed even when there is
/// nothing to flush (memory devices).
pub trait Device: Send + std::fmt::Debug {
    /// Read into `buf` at `offset`, returning how many bytes were available.
    ///
    /// A count smaller than `buf.len()` means the range ran past the end of
    /// the device; the caller decides whether that is an error.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write `bytes` at `offset`, extending and zero-filling as needed.
    fn write_at(&mut self, bytes: &[u8], offset: u64) -> Result<()>;

    /// Set the device length, discarding trailing bytes on shrink.
    fn truncate(&mut self, size: u64) -> Result<()>;

    /// Flush to durable storage.
    fn sync(&mut self) -> Result<()>;

    /// Current device size in bytes.
    fn size(&self) -> Result<u64>;
}
