//! SQLite VFS adapter
//!
//! The glue between SQLite's `sqlite3_vfs` interface and a registered
//! [`Backend`]. One `sqlite3_vfs` is registered per backend name; its
//! `pAppData` carries the backend, and the callbacks translate engine wire
//! constants into the crate's capability types before dispatch. Everything
//! `unsafe` in the crate lives in this module tree.

mod file;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use libsqlite3_sys as ffi;
use rand::RngCore;
use tracing::debug;

use crate::backend::Backend;
use crate::error::{PlugfsError, Result};
use crate::registry::BackendRegistry;

/// Longest path the adapter will hand to a backend
const MAX_PATHNAME: c_int = 1024;

/// Per-registration state carried in `sqlite3_vfs.pAppData`
pub(crate) struct VfsState {
    /// Backend name as handed to SQLite; owns the bytes `zName` points at
    name: CString,
    pub(crate) backend: Arc<dyn Backend>,
}

pub(crate) unsafe fn vfs_state<'a>(vfs: *mut ffi::sqlite3_vfs) -> &'a VfsState {
    &*((*vfs).pAppData as *const VfsState)
}

/// Register `backend` under `name` with both the process-wide registry and
/// SQLite itself.
///
/// Must be called before any connection references `name`. Duplicate names
/// are rejected before SQLite is touched; if SQLite itself refuses the
/// registration, the registry entry is rolled back and the return code is
/// reported as [`PlugfsError::Registration`].
pub fn register_backend(name: &str, backend: Arc<dyn Backend>) -> Result<()> {
    let c_name =
        CString::new(name).map_err(|_| PlugfsError::InvalidName(name.to_owned()))?;
    BackendRegistry::global().register(name, Arc::clone(&backend))?;

    let state = Box::into_raw(Box::new(VfsState {
        name: c_name,
        backend,
    }));

    let vfs = Box::new(ffi::sqlite3_vfs {
        iVersion: 3,
        szOsFile: std::mem::size_of::<file::VfsFile>() as c_int,
        mxPathname: MAX_PATHNAME,
        pNext: ptr::null_mut(),
        zName: unsafe { (*state).name.as_ptr() },
        pAppData: state as *mut c_void,
        xOpen: Some(file::vfs_open),
        xDelete: Some(vfs_delete),
        xAccess: Some(vfs_access),
        xFullPathname: Some(vfs_full_pathname),
        xDlOpen: None,
        xDlError: None,
        xDlSym: None,
        xDlClose: None,
        xRandomness: Some(vfs_randomness),
        xSleep: Some(vfs_sleep),
        xCurrentTime: Some(vfs_current_time),
        xGetLastError: Some(vfs_get_last_error),
        xCurrentTimeInt64: Some(vfs_current_time_int64),
        xSetSystemCall: None,
        xGetSystemCall: None,
        xNextSystemCall: None,
    });
    let vfs_ptr = Box::into_raw(vfs);

    unsafe {
        let rc = ffi::sqlite3_vfs_register(vfs_ptr, 0);
        if rc != ffi::SQLITE_OK {
            drop(Box::from_raw(vfs_ptr));
            drop(Box::from_raw(state));
            BackendRegistry::global().unregister(name);
            return Err(PlugfsError::Registration(rc));
        }
    }

    debug!(name, "backend registered with sqlite");
    Ok(())
}

/// Unregister `name` from SQLite and the registry. Idempotent; unknown
/// names are a no-op.
pub fn unregister_backend(name: &str) -> Result<()> {
    let c_name =
        CString::new(name).map_err(|_| PlugfsError::InvalidName(name.to_owned()))?;

    // Only tear down registrations this adapter created; a foreign VFS that
    // happens to share the name (e.g. "unix") must not be touched.
    if !BackendRegistry::global().contains(name) {
        return Ok(());
    }

    unsafe {
        let vfs_ptr = ffi::sqlite3_vfs_find(c_name.as_ptr());
        if !vfs_ptr.is_null() {
            let rc = ffi::sqlite3_vfs_unregister(vfs_ptr);
            if rc != ffi::SQLITE_OK {
                return Err(PlugfsError::Registration(rc));
            }
            let app_data = (*vfs_ptr).pAppData;
            if !app_data.is_null() {
                drop(Box::from_raw(app_data as *mut VfsState));
            }
            drop(Box::from_raw(vfs_ptr));
        }
    }

    BackendRegistry::global().unregister(name);
    debug!(name, "backend unregistered from sqlite");
    Ok(())
}

// VFS-level callbacks

unsafe extern "C" fn vfs_delete(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    _sync_dir: c_int,
) -> c_int {
    let state = vfs_state(vfs);
    let path = match CStr::from_ptr(z_name).to_str() {
        Ok(p) => p,
        Err(_) => return ffi::SQLITE_IOERR_DELETE,
    };
    match state.backend.delete(path) {
        Ok(()) => ffi::SQLITE_OK,
        Err(_) => ffi::SQLITE_IOERR_DELETE,
    }
}

unsafe extern "C" fn vfs_access(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    _flags: c_int,
    p_res_out: *mut c_int,
) -> c_int {
    let state = vfs_state(vfs);
    let path = match CStr::from_ptr(z_name).to_str() {
        Ok(p) => p,
        Err(_) => return ffi::SQLITE_IOERR_ACCESS,
    };
    match state.backend.exists(path) {
        Ok(exists) => {
            *p_res_out = exists as c_int;
            ffi::SQLITE_OK
        }
        Err(_) => ffi::SQLITE_IOERR_ACCESS,
    }
}

unsafe extern "C" fn vfs_full_pathname(
    vfs: *mut ffi::sqlite3_vfs,
    z_name: *const c_char,
    n_out: c_int,
    z_out: *mut c_char,
) -> c_int {
    let state = vfs_state(vfs);
    let path = match CStr::from_ptr(z_name).to_str() {
        Ok(p) => p,
        Err(_) => return ffi::SQLITE_CANTOPEN,
    };
    let full = match state.backend.full_path(path) {
        Ok(full) => full,
        Err(_) => return ffi::SQLITE_CANTOPEN,
    };
    let bytes = full.as_bytes();
    if bytes.len() + 1 > n_out as usize {
        return ffi::SQLITE_CANTOPEN;
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), z_out as *mut u8, bytes.len());
    *z_out.add(bytes.len()) = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_randomness(
    _vfs: *mut ffi::sqlite3_vfs,
    n_byte: c_int,
    z_out: *mut c_char,
) -> c_int {
    let buf = std::slice::from_raw_parts_mut(z_out as *mut u8, n_byte as usize);
    rand::thread_rng().fill_bytes(buf);
    n_byte
}

unsafe extern "C" fn vfs_sleep(_vfs: *mut ffi::sqlite3_vfs, microseconds: c_int) -> c_int {
    thread::sleep(Duration::from_micros(microseconds as u64));
    microseconds
}

unsafe extern "C" fn vfs_current_time(
    _vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut f64,
) -> c_int {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    // Julian day number
    *p_time_out = 2440587.5 + duration.as_secs_f64() / 86400.0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_current_time_int64(
    _vfs: *mut ffi::sqlite3_vfs,
    p_time_out: *mut ffi::sqlite3_int64,
) -> c_int {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    // Julian day in milliseconds
    *p_time_out = 210_866_760_000_000i64 + duration.as_millis() as i64;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_get_last_error(
    _vfs: *mut ffi::sqlite3_vfs,
    _n_byte: c_int,
    _z_err_msg: *mut c_char,
) -> c_int {
    0
}
