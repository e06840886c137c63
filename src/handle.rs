//! Per-open-file handles

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::backend::OpenOptions;
use crate::device::Device;
use crate::error::{PlugfsError, Result};
use crate::lock::{LockLedger, LockState};

/// One open file: an exclusively owned device plus this handle's position
/// in the shared locking protocol.
///
/// The engine serializes calls per connection, so a handle needs no
/// internal synchronization for its own fields; only the ledger, shared by
/// every handle on the same file identity, is guarded.
#[derive(Debug)]
pub struct FileHandle {
    path: String,
    opts: OpenOptions,
    device: Box<dyn Device>,
    ledger: Arc<Mutex<LockLedger>>,
    state: LockState,
}

impl FileHandle {
    /// Assemble a handle. Backends call this from `open`, passing the
    /// ledger of the file identity being opened.
    pub fn new(
        path: impl Into<String>,
        opts: OpenOptions,
        device: Box<dyn Device>,
        ledger: Arc<Mutex<LockLedger>>,
    ) -> Self {
        FileHandle {
            path: path.into(),
            opts,
            device,
            ledger,
            state: LockState::None,
        }
    }

    /// Path this handle was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Options this handle was opened with
    pub fn options(&self) -> OpenOptions {
        self.opts
    }

    /// Lock currently held by this handle
    pub fn lock_state(&self) -> LockState {
        self.state
    }

    /// Read `buf.len()` bytes at `offset`.
    ///
    /// When the range runs past the end of the device, the available prefix
    /// is copied, the rest of `buf` is zeroed, and `ShortRead` reports how
    /// much was real, so callers can tell end-of-file from a failed read.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let read = self.device.read_at(buf, offset)?;
        if read < buf.len() {
            buf[read..].fill(0);
            return Err(PlugfsError::ShortRead {
                offset,
                requested: buf.len(),
                read,
            });
        }
        Ok(())
    }

    /// Write `bytes` at `offset`, growing the device if needed.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.device.write_at(bytes, offset)
    }

    /// Resize the device. Lock-state preconditions are the caller's
    /// contract and are not re-checked here.
    pub fn truncate(&mut self, size: u64) -> Result<()> {
        self.device.truncate(size)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.device.sync()
    }

    pub fn size(&self) -> Result<u64> {
        self.device.size()
    }

    /// Acquire `target`, upgrading through the protocol table.
    ///
    /// Weaker-or-equal targets release down and always succeed. A contended
    /// upgrade returns [`PlugfsError::Busy`] immediately; retry timing
    /// belongs to the engine's busy handler, never to this layer.
    pub fn lock(&mut self, target: LockState) -> Result<()> {
        if self.ledger.lock().try_transition(self.state, target) {
            trace!(path = %self.path, from = ?self.state, to = ?target, "lock");
            self.state = target;
            Ok(())
        } else {
            Err(PlugfsError::Busy {
                path: self.path.clone(),
                requested: target,
            })
        }
    }

    /// Release down to `target`. Releasing to the current state or above is
    /// a no-op success.
    pub fn unlock(&mut self, target: LockState) -> Result<()> {
        if target >= self.state {
            return Ok(());
        }
        self.ledger.lock().release(self.state, target);
        trace!(path = %self.path, from = ?self.state, to = ?target, "unlock");
        self.state = target;
        Ok(())
    }

    /// True iff any handle on this file identity holds `Reserved` or
    /// stronger. Never blocks, never mutates.
    pub fn check_reserved_lock(&self) -> bool {
        self.ledger.lock().write_intent()
    }

    /// Drive the lock state to `None`; the device goes with the handle.
    pub fn close(&mut self) -> Result<()> {
        self.unlock(LockState::None)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        // A handle abandoned while locked must not wedge the ledger.
        if self.state != LockState::None {
            self.ledger.lock().release(self.state, LockState::None);
            self.state = LockState::None;
        }
    }
}
