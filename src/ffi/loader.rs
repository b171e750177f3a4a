//! libsqlite3 loader, kept to the shape of the collaborator: something
//! that returns a library handle plus a way to look up symbols by name.
//! The core never links `sqlite3_*` symbols at
//! build time; it resolves every one of them through this trait.

use std::os::raw::c_void;

use crate::error::{Error, Result};
use crate::ffi::Sqlite3Api;

/// External collaborator: hands back an opened library handle whose
/// lifetime the caller owns, and a symbol-lookup function bound to it.
pub trait Sqlite3Loader: Send + Sync {
    /// Resolve `symbol` (a bare C name, e.g. `"sqlite3_open_v2"`) to a
    /// function pointer, or `None` if the symbol isn't present.
    fn symbol(&self, symbol: &str) -> Option<*const c_void>;
}

macro_rules! resolve {
    ($loader:expr, $name:literal) => {{
        let ptr = $loader.symbol($name).ok_or(Error::Ffi {
            symbol: $name,
            reason: "symbol not found in loaded library".to_string(),
        })?;
        unsafe { std::mem::transmute(ptr) }
    }};
}

/// Resolve every symbol the crate needs, once, at session open.
pub fn resolve_api(loader: &dyn Sqlite3Loader) -> Result<Sqlite3Api> {
    Ok(Sqlite3Api {
        open_v2: resolve!(loader, "sqlite3_open_v2"),
        close: resolve!(loader, "sqlite3_close"),
        prepare_v3: resolve!(loader, "sqlite3_prepare_v3"),
        step: resolve!(loader, "sqlite3_step"),
        column_count: resolve!(loader, "sqlite3_column_count"),
        column_name: resolve!(loader, "sqlite3_column_name"),
        column_type: resolve!(loader, "sqlite3_column_type"),
        column_int64: resolve!(loader, "sqlite3_column_int64"),
        column_double: resolve!(loader, "sqlite3_column_double"),
        column_blob: resolve!(loader, "sqlite3_column_blob"),
        column_bytes: resolve!(loader, "sqlite3_column_bytes"),
        column_text: resolve!(loader, "sqlite3_column_text"),
        bind_text: resolve!(loader, "sqlite3_bind_text"),
        bind_blob: resolve!(loader, "sqlite3_bind_blob"),
        bind_int64: resolve!(loader, "sqlite3_bind_int64"),
        bind_double: resolve!(loader, "sqlite3_bind_double"),
        bind_null: resolve!(loader, "sqlite3_bind_null"),
        bind_parameter_index: resolve!(loader, "sqlite3_bind_parameter_index"),
        finalize: resolve!(loader, "sqlite3_finalize"),
        vfs_register: resolve!(loader, "sqlite3_vfs_register"),
        vfs_unregister: resolve!(loader, "sqlite3_vfs_unregister"),
        errmsg: resolve!(loader, "sqlite3_errmsg"),
    })
}

/// Default loader: opens a shared library by path with `libloading` and
/// resolves symbols from it. The handle is kept alive for as long as
/// this loader is, which in practice means for the life of the session
/// that constructed it.
pub struct DlopenLoader {
    library: libloading::Library,
}

impl DlopenLoader {
    /// # Safety
    /// Loading and later calling into an arbitrary shared library is
    /// inherently unsafe: the caller must ensure `path` names a genuine,
    /// ABI-compatible libsqlite3 build.
    pub unsafe fn open(path: &str) -> Result<Self> {
        let library = libloading::Library::new(path).map_err(|e| Error::Ffi {
            symbol: "dlopen",
            reason: e.to_string(),
        })?;
        Ok(Self { library })
    }
}

impl Sqlite3Loader for DlopenLoader {
    fn symbol(&self, symbol: &str) -> Option<*const c_void> {
        let name = format!("{symbol}\0");
        unsafe {
            self.library
                .get::<*const c_void>(name.as_bytes())
                .ok()
                .map(|s| *s)
        }
    }
}
