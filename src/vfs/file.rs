//! Per-file I/O adapter
//!
//! `sqlite3_io_methods` callbacks routing the engine's file operations to a
//! [`FileHandle`]. SQLite allocates the file object itself (`szOsFile`
//! bytes); the adapter keeps only a pointer to boxed state in it, so close
//! is the single place ownership is taken back.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

use libsqlite3_sys as ffi;

use crate::backend::{Backend, OpenOptions};
use crate::error::PlugfsError;
use crate::handle::FileHandle;
use crate::lock::LockState;

/// Sector size reported to the engine; matches the page-granular backends
/// this adapter fronts
const SECTOR_SIZE: c_int = 4096;

/// The engine-allocated file object: the required `sqlite3_file` header
/// followed by a pointer to the boxed adapter state
#[repr(C)]
pub(crate) struct VfsFile {
    base: ffi::sqlite3_file,
    state: *mut FileState,
}

/// Heap state behind one open file
struct FileState {
    handle: FileHandle,
    backend: Arc<dyn Backend>,
    delete_on_close: bool,
}

static IO_METHODS: ffi::sqlite3_io_methods = ffi::sqlite3_io_methods {
    iVersion: 1,
    xClose: Some(file_close),
    xRead: Some(file_read),
    xWrite: Some(file_write),
    xTruncate: Some(file_truncate),
    xSync: Some(file_sync),
    xFileSize: Some(file_size),
    xLock: Some(file_lock),
    xUnlock: Some(file_unlock),
    xCheckReservedLock: Some(file_check_reserved_lock),
    xFileControl: Some(file_control),
    xSectorSize: Some(file_sector_size),
    xDeviceCharacteristics: Some(file_device_characteristics),
    xShmMap: None,
    xShmLock: None,
    xShmBarrier: None,
    xShmUnmap: None,
    xFetch: None,
    xUnfetch: None,
};

fn open_options(flags: c_int) -> OpenOptions {
    let mut opts = OpenOptions::empty();
    if flags & ffi::SQLITE_OPEN_CREATE != 0 {
        opts |= OpenOptions::CREATE;
    }
    if flags & ffi::SQLITE_OPEN_READWRITE != 0 {
        opts |= OpenOptions::READ_WRITE;
    }
    if flags & ffi::SQLITE_OPEN_DELETEONCLOSE != 0 {
        opts |= OpenOptions::DELETE_ON_CLOSE;
    }
    if flags & ffi::SQLITE_OPEN_EXCLUSIVE != 0 {
        opts |= OpenOptions::EXCLUSIVE;
    }
    opts
}

fn lock_state_from_raw(level: c_int) -> Option<LockState> {
    match level {
        ffi::SQLITE_LOCK_NONE => Some(LockState::None),
        ffi::SQLITE_LOCK_SHARED => Some(LockState::Shared),
        ffi::SQLITE_LOCK_RESERVED => Some(LockState::Reserved),
        ffi::SQLITE_LOCK_PENDING => Some(LockState::Pending),
        ffi::SQLITE_LOCK_EXCLUSIVE => Some(LockState::Exclusive),
        _ => None,
    }
}

/// Anonymous files (journals, statement spill) arrive with a null name.
fn temp_name() -> String {
    format!("etilqs_{:016x}", rand::random::<u64>())
}

unsafe fn file_state<'a>(file: *mut ffi::sqlite3_file) -> &'a mut FileState {
    let vfs_file = &mut *(file as *mut VfsFile);
    &mut *vfs_file.state
}

pub(crate) unsafe extern "C" fn vfs_open(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    file: *mut ffi::sqlite3_file,
    flags: c_int,
    p_out_flags: *mut c_int,
) -> c_int {
    let state = super::vfs_state(vfs);
    let path = if z_name.is_null() {
        temp_name()
    } else {
        match CStr::from_ptr(z_name).to_str() {
            Ok(p) => p.to_owned(),
            Err(_) => return ffi::SQLITE_CANTOPEN,
        }
    };
    let opts = open_options(flags);

    let vfs_file = &mut *(file as *mut VfsFile);
    vfs_file.base.pMethods = ptr::null();
    vfs_file.state = ptr::null_mut();

    match state.backend.open(&path, opts) {
        Ok(handle) => {
            vfs_file.state = Box::into_raw(Box::new(FileState {
                handle,
                backend: Arc::clone(&state.backend),
                delete_on_close: opts.contains(OpenOptions::DELETE_ON_CLOSE),
            }));
            vfs_file.base.pMethods = &IO_METHODS;
            if !p_out_flags.is_null() {
                *p_out_flags = flags;
            }
            ffi::SQLITE_OK
        }
        Err(_) => ffi::SQLITE_CANTOPEN,
    }
}

unsafe extern "C" fn file_close(file: *mut ffi::sqlite3_file) -> c_int {
    let vfs_file = &mut *(file as *mut VfsFile);
    if vfs_file.state.is_null() {
        return ffi::SQLITE_OK;
    }
    let mut state = Box::from_raw(vfs_file.state);
    vfs_file.state = ptr::null_mut();
    vfs_file.base.pMethods = ptr::null();

    if state.handle.close().is_err() {
        return ffi::SQLITE_IOERR_CLOSE;
    }
    if state.delete_on_close {
        let path = state.handle.path().to_owned();
        if state.backend.delete(&path).is_err() {
            return ffi::SQLITE_IOERR_DELETE;
        }
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_read(
    file: *mut ffi::sqlite3_file,
    buf: *mut c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    if offset < 0 || amt < 0 {
        return ffi::SQLITE_IOERR_READ;
    }
    let state = file_state(file);
    let out = std::slice::from_raw_parts_mut(buf as *mut u8, amt as usize);
    match state.handle.read(offset as u64, out) {
        Ok(()) => ffi::SQLITE_OK,
        // The handle already zero-filled the tail; the engine applies its
        // own end-of-file semantics to this code.
        Err(PlugfsError::ShortRead { .. }) => ffi::SQLITE_IOERR_SHORT_READ,
        Err(_) => ffi::SQLITE_IOERR_READ,
    }
}

unsafe extern "C" fn file_write(
    file: *mut ffi::sqlite3_file,
    buf: *const c_void,
    amt: c_int,
    offset: ffi::sqlite3_int64,
) -> c_int {
    if offset < 0 || amt < 0 {
        return ffi::SQLITE_IOERR_WRITE;
    }
    let state = file_state(file);
    let bytes = std::slice::from_raw_parts(buf as *const u8, amt as usize);
    match state.handle.write(offset as u64, bytes) {
        Ok(()) => ffi::SQLITE_OK,
        Err(_) => ffi::SQLITE_IOERR_WRITE,
    }
}

unsafe extern "C" fn file_truncate(
    file: *mut ffi::sqlite3_file,
    size: ffi::sqlite3_int64,
) -> c_int {
    if size < 0 {
        return ffi::SQLITE_MISUSE;
    }
    let state = file_state(file);
    match state.handle.truncate(size as u64) {
        Ok(()) => ffi::SQLITE_OK,
        Err(_) => ffi::SQLITE_IOERR_TRUNCATE,
    }
}

unsafe extern "C" fn file_sync(file: *mut ffi::sqlite3_file, _flags: c_int) -> c_int {
    let state = file_state(file);
    match state.handle.sync() {
        Ok(()) => ffi::SQLITE_OK,
        Err(_) => ffi::SQLITE_IOERR_FSYNC,
    }
}

unsafe extern "C" fn file_size(
    file: *mut ffi::sqlite3_file,
    p_size: *mut ffi::sqlite3_int64,
) -> c_int {
    let state = file_state(file);
    match state.handle.size() {
        Ok(size) => {
            *p_size = size as ffi::sqlite3_int64;
            ffi::SQLITE_OK
        }
        Err(_) => ffi::SQLITE_IOERR_FSTAT,
    }
}

unsafe extern "C" fn file_lock(file: *mut ffi::sqlite3_file, level: c_int) -> c_int {
    let target = match lock_state_from_raw(level) {
        Some(target) => target,
        None => return ffi::SQLITE_MISUSE,
    };
    let state = file_state(file);
    match state.handle.lock(target) {
        Ok(()) => ffi::SQLITE_OK,
        // Contention is routine; the engine's busy handler owns the retry.
        Err(PlugfsError::Busy { .. }) => ffi::SQLITE_BUSY,
        Err(_) => ffi::SQLITE_IOERR_LOCK,
    }
}

unsafe extern "C" fn file_unlock(file: *mut ffi::sqlite3_file, level: c_int) -> c_int {
    let target = match lock_state_from_raw(level) {
        Some(target) => target,
        None => return ffi::SQLITE_MISUSE,
    };
    let state = file_state(file);
    match state.handle.unlock(target) {
        Ok(()) => ffi::SQLITE_OK,
        Err(_) => ffi::SQLITE_IOERR_UNLOCK,
    }
}

unsafe extern "C" fn file_check_reserved_lock(
    file: *mut ffi::sqlite3_file,
    p_res_out: *mut c_int,
) -> c_int {
    let state = file_state(file);
    *p_res_out = state.handle.check_reserved_lock() as c_int;
    ffi::SQLITE_OK
}

unsafe extern "C" fn file_control(
    _file: *mut ffi::sqlite3_file,
    _op: c_int,
    _p_arg: *mut c_void,
) -> c_int {
    ffi::SQLITE_NOTFOUND
}

unsafe extern "C" fn file_sector_size(_file: *mut ffi::sqlite3_file) -> c_int {
    SECTOR_SIZE
}

unsafe extern "C" fn file_device_characteristics(_file: *mut ffi::sqlite3_file) -> c_int {
    ffi::SQLITE_IOCAP_ATOMIC4K | ffi::SQLITE_IOCAP_SAFE_APPEND
}
