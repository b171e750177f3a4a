//! Stable C ABI mirror for the pieces of libsqlite3 this crate drives:
//! the VFS/I-O method tables (§4.D) and the subset of the C API the
//! statement executor calls (§4.F). These types are laid out exactly as
//! `sqlite3.h` defines them — they are not an abstraction over the
//! library, they are its memory layout, because the library is loaded
//! at runtime and never declared to the linker (`libloading`, see
//! `loader.rs`, stands in for `libsqlite3-sys`'s build-time link).

pub mod loader;

use std::os::raw::{c_char, c_int, c_void};

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_PERM: c_int = 3;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_LOCKED: c_int = 6;
pub const SQLITE_IOERR: c_int = 10;
pub const SQLITE_NOTFOUND: c_int = 12;
pub const SQLITE_CANTOPEN: c_int = 14;
pub const SQLITE_READONLY: c_int = 8;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;
pub const SQLITE_IOERR_READ: c_int = (SQLITE_IOERR) | (1 << 8);
pub const SQLITE_IOERR_SHORT_READ: c_int = (SQLITE_IOERR) | (2 << 8);

pub const SQLITE_IOCAP_IMMUTABLE: c_int = 0x0000_2000;

pub const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_EXCLUSIVE: c_int = 0x0000_0010;
pub const SQLITE_OPEN_URI: c_int = 0x0000_0040;
pub const SQLITE_OPEN_MEMORY: c_int = 0x0000_0080;
pub const SQLITE_OPEN_MAIN_DB: c_int = 0x0000_0100;
pub const SQLITE_OPEN_TEMP_DB: c_int = 0x0000_0200;
pub const SQLITE_OPEN_TRANSIENT_DB: c_int = 0x0000_0400;
pub const SQLITE_OPEN_MAIN_JOURNAL: c_int = 0x0000_0800;
pub const SQLITE_OPEN_TEMP_JOURNAL: c_int = 0x0000_1000;
pub const SQLITE_OPEN_SUBJOURNAL: c_int = 0x0000_2000;
pub const SQLITE_OPEN_SUPER_JOURNAL: c_int = 0x0000_4000;
pub const SQLITE_OPEN_NOMUTEX: c_int = 0x0000_8000;
pub const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;
pub const SQLITE_OPEN_SHAREDCACHE: c_int = 0x0002_0000;
pub const SQLITE_OPEN_PRIVATECACHE: c_int = 0x0004_0000;
pub const SQLITE_OPEN_WAL: c_int = 0x0008_0000;

pub const SQLITE_LOCK_NONE: c_int = 0;
pub const SQLITE_LOCK_SHARED: c_int = 1;
pub const SQLITE_LOCK_RESERVED: c_int = 2;
pub const SQLITE_LOCK_PENDING: c_int = 3;
pub const SQLITE_LOCK_EXCLUSIVE: c_int = 4;

pub const SQLITE_ACCESS_EXISTS: c_int = 0;
pub const SQLITE_ACCESS_READWRITE: c_int = 1;
pub const SQLITE_ACCESS_READ: c_int = 2;

pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;
pub const SQLITE_NULL: c_int = 5;

/// Mirrors `sqlite3_io_methods`, version 1. Every field is a function
/// pointer the core installs; none of libsqlite3's own implementations
/// are ever used.
#[repr(C)]
pub struct Sqlite3IoMethods {
    pub i_version: c_int,
    pub x_close: Option<unsafe extern "C" fn(*mut Sqlite3File) -> c_int>,
    pub x_read: Option<
        unsafe extern "C" fn(*mut Sqlite3File, *mut c_void, c_int, i64) -> c_int,
    >,
    pub x_write: Option<
        unsafe extern "C" fn(*mut Sqlite3File, *const c_void, c_int, i64) -> c_int,
    >,
    pub x_truncate: Option<unsafe extern "C" fn(*mut Sqlite3File, i64) -> c_int>,
    pub x_sync: Option<unsafe extern "C" fn(*mut Sqlite3File, c_int) -> c_int>,
    pub x_file_size: Option<unsafe extern "C" fn(*mut Sqlite3File, *mut i64) -> c_int>,
    pub x_lock: Option<unsafe extern "C" fn(*mut Sqlite3File, c_int) -> c_int>,
    pub x_unlock: Option<unsafe extern "C" fn(*mut Sqlite3File, c_int) -> c_int>,
    pub x_check_reserved_lock:
        Option<unsafe extern "C" fn(*mut Sqlite3File, *mut c_int) -> c_int>,
    pub x_file_control:
        Option<unsafe extern "C" fn(*mut Sqlite3File, c_int, *mut c_void) -> c_int>,
    pub x_sector_size: Option<unsafe extern "C" fn(*mut Sqlite3File) -> c_int>,
    pub x_device_characteristics: Option<unsafe extern "C" fn(*mut Sqlite3File) -> c_int>,
}

/// Mirrors `sqlite3_file`: just the method-table pointer libsqlite3
/// expects at offset zero. The core's real per-handle state lives
/// immediately after this field in a larger struct the VFS allocates
/// (`szOsFile` tells libsqlite3 how much space to reserve).
#[repr(C)]
pub struct Sqlite3File {
    pub p_methods: *const Sqlite3IoMethods,
}

/// Mirrors `sqlite3_vfs`, version 1.
#[repr(C)]
pub struct Sqlite3Vfs {
    pub i_version: c_int,
    pub sz_os_file: c_int,
    pub mx_pathname: c_int,
    pub p_next: *mut Sqlite3Vfs,
    pub z_name: *const c_char,
    pub p_app_data: *mut c_void,
    pub x_open: Option<
        unsafe extern "C" fn(
            *mut Sqlite3Vfs,
            *const c_char,
            *mut Sqlite3File,
            c_int,
            *mut c_int,
        ) -> c_int,
    >,
    pub x_delete:
        Option<unsafe extern "C" fn(*mut Sqlite3Vfs, *const c_char, c_int) -> c_int>,
    pub x_access: Option<
        unsafe extern "C" fn(*mut Sqlite3Vfs, *const c_char, c_int, *mut c_int) -> c_int,
    >,
    pub x_full_pathname: Option<
        unsafe extern "C" fn(*mut Sqlite3Vfs, *const c_char, c_int, *mut c_char) -> c_int,
    >,
    pub x_dl_open: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, *const c_char) -> *mut c_void>,
    pub x_dl_error: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, c_int, *mut c_char)>,
    pub x_dl_sym: Option<
        unsafe extern "C" fn(
            *mut Sqlite3Vfs,
            *mut c_void,
            *const c_char,
        ) -> Option<unsafe extern "C" fn()>,
    >,
    pub x_dl_close: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, *mut c_void)>,
    pub x_randomness: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, c_int, *mut c_char) -> c_int>,
    pub x_sleep: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, c_int) -> c_int>,
    pub x_current_time: Option<unsafe extern "C" fn(*mut Sqlite3Vfs, *mut f64) -> c_int>,
    pub x_get_last_error:
        Option<unsafe extern "C" fn(*mut Sqlite3Vfs, c_int, *mut c_char) -> c_int>,
}

/// Opaque handle type, same role as `libsqlite3-sys`'s `sqlite3`.
#[repr(C)]
pub struct Sqlite3 {
    _private: [u8; 0],
}

/// Opaque handle type for a prepared statement.
#[repr(C)]
pub struct Sqlite3Stmt {
    _private: [u8; 0],
}

/// Function pointers resolved from the caller-supplied library handle
/// (§external interface "libsqlite3 loader"). Every call site in the
/// crate goes through this table rather than linking `sqlite3_*` symbols
/// directly — there is nothing for the linker to find, since the
/// library is opened at runtime by a collaborator we don't control.
pub struct Sqlite3Api {
    pub open_v2: unsafe extern "C" fn(
        *const c_char,
        *mut *mut Sqlite3,
        c_int,
        *const c_char,
    ) -> c_int,
    pub close: unsafe extern "C" fn(*mut Sqlite3) -> c_int,
    pub prepare_v3: unsafe extern "C" fn(
        *mut Sqlite3,
        *const c_char,
        c_int,
        u32,
        *mut *mut Sqlite3Stmt,
        *mut *const c_char,
    ) -> c_int,
    pub step: unsafe extern "C" fn(*mut Sqlite3Stmt) -> c_int,
    pub column_count: unsafe extern "C" fn(*mut Sqlite3Stmt) -> c_int,
    pub column_name: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> *const c_char,
    pub column_type: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> c_int,
    pub column_int64: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> i64,
    pub column_double: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> f64,
    pub column_blob: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> *const c_void,
    pub column_bytes: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> c_int,
    pub column_text: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> *const c_char,
    pub bind_text: unsafe extern "C" fn(
        *mut Sqlite3Stmt,
        c_int,
        *const c_char,
        c_int,
        Option<unsafe extern "C" fn(*mut c_void)>,
    ) -> c_int,
    pub bind_blob: unsafe extern "C" fn(
        *mut Sqlite3Stmt,
        c_int,
        *const c_void,
        c_int,
        Option<unsafe extern "C" fn(*mut c_void)>,
    ) -> c_int,
    pub bind_int64: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int, i64) -> c_int,
    pub bind_double: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int, f64) -> c_int,
    pub bind_null: unsafe extern "C" fn(*mut Sqlite3Stmt, c_int) -> c_int,
    pub bind_parameter_index:
        unsafe extern "C" fn(*mut Sqlite3Stmt, *const c_char) -> c_int,
    pub finalize: unsafe extern "C" fn(*mut Sqlite3Stmt) -> c_int,
    pub vfs_register: unsafe extern "C" fn(*mut Sqlite3Vfs, c_int) -> c_int,
    pub vfs_unregister: unsafe extern "C" fn(*mut Sqlite3Vfs) -> c_int,
    pub errmsg: unsafe extern "C" fn(*mut Sqlite3) -> *const c_char,
}

/// Sentinel value used as `SQLITE_TRANSIENT` in `sqlite3_bind_*` calls —
/// tells libsqlite3 to copy the bound bytes immediately rather than
/// trust them to outlive the call. Mirrors the `-1isize` sentinel
/// bindgen emits for this same constant in generated sqlite3 bindings.
pub fn sqlite_transient() -> Option<unsafe extern "C" fn(*mut c_void)> {
    Some(unsafe { std::mem::transmute::<isize, unsafe extern "C" fn(*mut c_void)>(-1isize) })
}
