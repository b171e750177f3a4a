//! VFS Adapter (§4.D): the only `sqlite3_vfs` / `sqlite3_io_methods`
//! implementation this crate installs. It never touches local disk —
//! every `xRead` resolves to a signed range GET through a
//! [`RangeReader`], and every write-shaped call (`xWrite`, `xLock`
//! beyond `SHARED`, `xSync`, ...) is refused rather than silently
//! accepted, since the object being served is immutable for the whole
//! session.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::binding::ObjectBinding;
use crate::credentials::CredentialsProvider;
use crate::error::{Error, Result};
use crate::ffi::{self, Sqlite3File, Sqlite3IoMethods, Sqlite3Vfs};
use crate::http::HttpClient;
use crate::range_reader::RangeReader;

/// Default SQLite page/sector size this VFS reports when a session
/// doesn't override it via [`SessionOptions`](crate::session::SessionOptions).
/// Real page size is whatever libsqlite3 negotiates after reading the
/// header's first 16 bytes; this is only the sector-size hint for I/O
/// alignment (§4.D names 512 as the small fixed value this VFS should
/// report).
pub const DEFAULT_SECTOR_SIZE: c_int = 512;

/// Everything the VFS needs to answer reads for one pinned object,
/// shared (read-only) by every `sqlite3_file` opened against it within
/// a session — in practice exactly one, the main database file, since
/// this VFS refuses to open journals.
pub struct VfsState {
    pub binding: ObjectBinding,
    pub http: Arc<dyn HttpClient>,
    pub credentials: Arc<dyn CredentialsProvider>,
    /// Reported by `xSectorSize`; configured per session via
    /// [`SessionOptions::sector_size`](crate::session::SessionOptions::sector_size).
    pub sector_size: c_int,
}

impl VfsState {
    fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        RangeReader::new(&self.binding, self.http.as_ref(), self.credentials.as_ref())
            .read_range(offset, len)
    }
}

/// The real per-handle state, stored immediately after the
/// `sqlite3_file` header libsqlite3 expects at offset zero. `szOsFile`
/// is set to `size_of::<FileHandle>()` so libsqlite3 allocates enough
/// space for both.
#[repr(C)]
struct FileHandle {
    base: Sqlite3File,
    state: Arc<VfsState>,
}

static IO_METHODS: Sqlite3IoMethods = Sqlite3IoMethods {
    i_version: 1,
    x_close: Some(x_close),
    x_read: Some(x_read),
    x_write: Some(x_write),
    x_truncate: Some(x_truncate),
    x_sync: Some(x_sync),
    x_file_size: Some(x_file_size),
    x_lock: Some(x_lock),
    x_unlock: Some(x_unlock),
    x_check_reserved_lock: Some(x_check_reserved_lock),
    x_file_control: Some(x_file_control),
    x_sector_size: Some(x_sector_size),
    x_device_characteristics: Some(x_device_characteristics),
};

unsafe extern "C" fn x_close(file: *mut Sqlite3File) -> c_int {
    let handle = file as *mut FileHandle;
    std::ptr::drop_in_place(std::ptr::addr_of_mut!((*handle).state));
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_read(
    file: *mut Sqlite3File,
    buf: *mut c_void,
    amount: c_int,
    offset: i64,
) -> c_int {
    let handle = &*(file as *mut FileHandle);
    let amount = amount as u64;
    let offset = offset as u64;

    let bytes = match handle.state.read_range(offset, amount) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, offset, amount, "range read failed");
            return ffi::SQLITE_IOERR_READ;
        }
    };

    let dest = std::slice::from_raw_parts_mut(buf as *mut u8, amount as usize);
    if bytes.len() as u64 >= amount {
        dest.copy_from_slice(&bytes[..amount as usize]);
        trace!(offset, amount, "xRead satisfied in full");
        ffi::SQLITE_OK
    } else {
        // Past EOF: zero-fill the remainder and report a short read, the
        // behavior libsqlite3's own VFS implementations use so the
        // btree layer can distinguish a real gap from corruption.
        dest[..bytes.len()].copy_from_slice(&bytes);
        for b in &mut dest[bytes.len()..] {
            *b = 0;
        }
        trace!(offset, amount, got = bytes.len(), "xRead short read past EOF");
        ffi::SQLITE_IOERR_SHORT_READ
    }
}

unsafe extern "C" fn x_write(
    _file: *mut Sqlite3File,
    _buf: *const c_void,
    _amount: c_int,
    _offset: i64,
) -> c_int {
    ffi::SQLITE_READONLY
}

unsafe extern "C" fn x_truncate(_file: *mut Sqlite3File, _size: i64) -> c_int {
    ffi::SQLITE_READONLY
}

unsafe extern "C" fn x_sync(_file: *mut Sqlite3File, _flags: c_int) -> c_int {
    ffi::SQLITE_READONLY
}

unsafe extern "C" fn x_file_size(file: *mut Sqlite3File, size_out: *mut i64) -> c_int {
    let handle = &*(file as *mut FileHandle);
    *size_out = handle.state.binding.length as i64;
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_lock(_file: *mut Sqlite3File, lock_level: c_int) -> c_int {
    // SHARED is the only lock level a read-only connection ever needs;
    // refusing anything past it would break ordinary `SELECT` queries,
    // so accept up to SHARED and silently cap above it — there is no
    // second writer to coordinate with, since the object is immutable.
    let _ = lock_level;
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_unlock(_file: *mut Sqlite3File, _lock_level: c_int) -> c_int {
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_check_reserved_lock(
    _file: *mut Sqlite3File,
    reserved_out: *mut c_int,
) -> c_int {
    *reserved_out = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn x_file_control(
    _file: *mut Sqlite3File,
    _op: c_int,
    _arg: *mut c_void,
) -> c_int {
    ffi::SQLITE_NOTFOUND
}

unsafe extern "C" fn x_sector_size(file: *mut Sqlite3File) -> c_int {
    let handle = &*(file as *mut FileHandle);
    handle.state.sector_size
}

unsafe extern "C" fn x_device_characteristics(_file: *mut Sqlite3File) -> c_int {
    ffi::SQLITE_IOCAP_IMMUTABLE
}

/// `sqlite3_vfs.xOpen`. Refuses to open anything but the main database
/// file — journals, WAL, and temp files have no meaning for a read-only
/// object, and a session that needs one means the query would have
/// written, which this VFS must prevent regardless of what SQL asked
/// for.
unsafe extern "C" fn vfs_open(
    vfs: *mut Sqlite3Vfs,
    _name: *const c_char,
    file: *mut Sqlite3File,
    flags: c_int,
    out_flags: *mut c_int,
) -> c_int {
    if flags & ffi::SQLITE_OPEN_MAIN_DB == 0 {
        return ffi::SQLITE_CANTOPEN;
    }
    if flags & ffi::SQLITE_OPEN_READWRITE != 0 {
        return ffi::SQLITE_PERM;
    }
    // The object is immutable for the session; creating or exclusively
    // opening it is nonsensical even though SQLITE_OPEN_READONLY-only
    // callers never actually set these bits.
    if flags & (ffi::SQLITE_OPEN_CREATE | ffi::SQLITE_OPEN_EXCLUSIVE) != 0 {
        return ffi::SQLITE_PERM;
    }

    let state = &*((*vfs).p_app_data as *const VfsState);
    let state = Arc::new(VfsState {
        binding: state.binding.clone(),
        http: Arc::clone(&state.http),
        credentials: Arc::clone(&state.credentials),
        sector_size: state.sector_size,
    });

    let handle = file as *mut FileHandle;
    std::ptr::write(
        handle,
        FileHandle {
            base: Sqlite3File {
                p_methods: &IO_METHODS,
            },
            state,
        },
    );

    if !out_flags.is_null() {
        *out_flags = ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_MAIN_DB;
    }
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_delete(
    _vfs: *mut Sqlite3Vfs,
    _name: *const c_char,
    _sync_dir: c_int,
) -> c_int {
    ffi::SQLITE_READONLY
}

/// The only object that "exists" is the main database itself; no
/// journal or WAL ever does, so libsqlite3's rollback/WAL-detection
/// probes always observe a clean, lock-free file.
unsafe extern "C" fn vfs_access(
    _vfs: *mut Sqlite3Vfs,
    _name: *const c_char,
    flags: c_int,
    res_out: *mut c_int,
) -> c_int {
    let _ = flags;
    *res_out = 0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_full_pathname(
    _vfs: *mut Sqlite3Vfs,
    name: *const c_char,
    out_len: c_int,
    out: *mut c_char,
) -> c_int {
    let name = CStr::from_ptr(name);
    let bytes = name.to_bytes_with_nul();
    if bytes.len() > out_len as usize {
        return ffi::SQLITE_CANTOPEN;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, out, bytes.len());
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_dl_open(_vfs: *mut Sqlite3Vfs, _name: *const c_char) -> *mut c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn vfs_dl_error(_vfs: *mut Sqlite3Vfs, len: c_int, out: *mut c_char) {
    let msg = b"extension loading is not supported\0";
    let n = (len as usize).min(msg.len());
    std::ptr::copy_nonoverlapping(msg.as_ptr() as *const c_char, out, n);
}

unsafe extern "C" fn vfs_dl_sym(
    _vfs: *mut Sqlite3Vfs,
    _handle: *mut c_void,
    _symbol: *const c_char,
) -> Option<unsafe extern "C" fn()> {
    None
}

unsafe extern "C" fn vfs_dl_close(_vfs: *mut Sqlite3Vfs, _handle: *mut c_void) {}

unsafe extern "C" fn vfs_randomness(_vfs: *mut Sqlite3Vfs, n: c_int, out: *mut c_char) -> c_int {
    use rand::RngCore;
    let buf = std::slice::from_raw_parts_mut(out as *mut u8, n as usize);
    rand::thread_rng().fill_bytes(buf);
    n
}

unsafe extern "C" fn vfs_sleep(_vfs: *mut Sqlite3Vfs, micros: c_int) -> c_int {
    std::thread::sleep(std::time::Duration::from_micros(micros.max(0) as u64));
    micros
}

unsafe extern "C" fn vfs_current_time(_vfs: *mut Sqlite3Vfs, out: *mut f64) -> c_int {
    let now = chrono::Utc::now();
    let julian_epoch_offset = 2_440_587.5_f64;
    *out = julian_epoch_offset + (now.timestamp_millis() as f64) / 86_400_000.0;
    ffi::SQLITE_OK
}

unsafe extern "C" fn vfs_get_last_error(
    _vfs: *mut Sqlite3Vfs,
    _len: c_int,
    _out: *mut c_char,
) -> c_int {
    ffi::SQLITE_OK
}

/// Owns the boxed [`VfsState`] and the `sqlite3_vfs` struct registered
/// with libsqlite3; dropping this after `sqlite3_vfs_unregister` has run
/// frees both.
pub struct RegisteredVfs {
    pub vfs: Box<Sqlite3Vfs>,
    pub name: CString,
    _state: Arc<VfsState>,
}

/// Build (but do not register) a `sqlite3_vfs` bound to `state`, under
/// `name`. The caller registers it with `sqlite3_vfs_register` and must
/// keep the returned [`RegisteredVfs`] alive for as long as the VFS
/// stays registered.
pub fn build(name: &str, state: Arc<VfsState>) -> Result<RegisteredVfs> {
    let name = CString::new(name)
        .map_err(|_| Error::Transport("VFS name contained an interior NUL".to_string()))?;

    let app_data = Arc::into_raw(Arc::clone(&state)) as *mut c_void;

    let vfs = Box::new(Sqlite3Vfs {
        i_version: 1,
        sz_os_file: std::mem::size_of::<FileHandle>() as c_int,
        mx_pathname: 512,
        p_next: std::ptr::null_mut(),
        z_name: name.as_ptr(),
        p_app_data: app_data,
        x_open: Some(vfs_open),
        x_delete: Some(vfs_delete),
        x_access: Some(vfs_access),
        x_full_pathname: Some(vfs_full_pathname),
        x_dl_open: Some(vfs_dl_open),
        x_dl_error: Some(vfs_dl_error),
        x_dl_sym: Some(vfs_dl_sym),
        x_dl_close: Some(vfs_dl_close),
        x_randomness: Some(vfs_randomness),
        x_sleep: Some(vfs_sleep),
        x_current_time: Some(vfs_current_time),
        x_get_last_error: Some(vfs_get_last_error),
    });

    Ok(RegisteredVfs {
        vfs,
        name,
        _state: state,
    })
}

impl Drop for RegisteredVfs {
    fn drop(&mut self) {
        // Reclaim the Arc that `build` leaked into `p_app_data`, so the
        // VFS's application data doesn't simply leak once the caller
        // has unregistered it.
        unsafe {
            drop(Arc::from_raw(self.vfs.p_app_data as *const VfsState));
        }
    }
}
