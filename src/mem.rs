//! In-memory storage backend
//!
//! The reference backend: every file is a growable byte buffer held in a
//! shared map, which doubles as the identity point for the locking protocol.
//! Two handles opened on one name share a ledger and observe each other's
//! bytes, exactly as two OS file descriptors on one inode would. Entries
//! persist across open/close until deleted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{Backend, OpenOptions};
use crate::device::Device;
use crate::error::{PlugfsError, Result};
use crate::handle::FileHandle;
use crate::lock::LockLedger;

/// One named file: content plus the lock ledger for its identity
#[derive(Debug)]
struct MemEntry {
    data: Arc<Mutex<Vec<u8>>>,
    ledger: Arc<Mutex<LockLedger>>,
}

impl MemEntry {
    fn new() -> Self {
        MemEntry {
            data: Arc::new(Mutex::new(Vec::new())),
            ledger: Arc::new(Mutex::new(LockLedger::new())),
        }
    }

    fn open(&self, path: &str, opts: OpenOptions) -> FileHandle {
        let device = MemDevice {
            data: Arc::clone(&self.data),
        };
        FileHandle::new(path, opts, Box::new(device), Arc::clone(&self.ledger))
    }
}

/// Backend keeping every file in process memory
#[derive(Default, Debug)]
pub struct MemBackend {
    files: Mutex<HashMap<String, MemEntry>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored; mostly useful in tests
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

impl Backend for MemBackend {
    fn open(&self, path: &str, opts: OpenOptions) -> Result<FileHandle> {
        let mut files = self.files.lock();
        if let Some(entry) = files.get(path) {
            if opts.contains(OpenOptions::CREATE | OpenOptions::EXCLUSIVE) {
                return Err(PlugfsError::FileExists(path.to_owned()));
            }
            return Ok(entry.open(path, opts));
        }
        if !opts.contains(OpenOptions::CREATE) {
            return Err(PlugfsError::FileNotFound(path.to_owned()));
        }
        debug!(path, "creating in-memory file");
        let entry = files.entry(path.to_owned()).or_insert_with(MemEntry::new);
        Ok(entry.open(path, opts))
    }

    fn delete(&self, path: &str) -> Result<()> {
        if self.files.lock().remove(path).is_some() {
            debug!(path, "deleted in-memory file");
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().contains_key(path))
    }
}

/// Device view over one in-memory file.
///
/// Handles on the same path alias the same buffer; the locking protocol is
/// what keeps writers exclusive, exactly as it would on a shared disk file.
#[derive(Debug)]
struct MemDevice {
    data: Arc<Mutex<Vec<u8>>>,
}

impl Device for MemDevice {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = self.data.lock();
        let len = data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let available = (len - offset) as usize;
        let count = buf.len().min(available);
        let start = offset as usize;
        buf[..count].copy_from_slice(&data[start..start + count]);
        Ok(count)
    }

    fn write_at(&mut self, bytes: &[u8], offset: u64) -> Result<()> {
        let mut data = self.data.lock();
        let end = offset as usize + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.data.lock().resize(size as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        // Every handle already sees the same buffer; nothing to flush.
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.data.lock().len() as u64)
    }
}
