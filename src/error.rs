//! Unified error taxonomy for the crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every distinguishable failure mode a caller can observe.
#[derive(Debug, Error)]
pub enum Error {
    /// The HEAD response carried no usable `x-amz-version-id`, i.e. the
    /// bucket does not have object versioning enabled.
    #[error("object store does not report a version id (versioning not enabled on bucket)")]
    VersioningNotEnabled,

    /// A HEAD or GET returned a non-2xx/non-206 status.
    #[error("unexpected HTTP status {status} for {method} {url}")]
    HttpStatus {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The HTTP client provider itself failed (connect, TLS, DNS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// libsqlite3 returned a non-OK result code.
    #[error("sqlite error ({code}): {message}")]
    Sqlite { code: i32, message: String },

    /// Rows were pulled from a `ResultStream` after its owning query
    /// scope (or session) was closed.
    #[error("query scope has already been closed")]
    ContextClosed,

    /// Loading the libsqlite3 shared library, or resolving one of its
    /// symbols, failed.
    #[error("failed to load libsqlite3 symbol `{symbol}`: {reason}")]
    Ffi { symbol: &'static str, reason: String },

    /// A provider-supplied parameter value could not be coerced to a
    /// bindable SQLite type.
    #[error("cannot bind value as SQL parameter: {0}")]
    UnsupportedParam(String),

    /// A named parameter did not match any placeholder in the prepared
    /// statement.
    #[error("unknown named parameter `{0}`")]
    UnknownParameter(String),

    /// Ambient I/O failure unrelated to the range-read path itself (e.g.
    /// constructing the default HTTP client).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Construct an [`Error::HttpStatus`] with a `'static` method label,
    /// the common case for the Range Reader and Object Binding call sites.
    pub(crate) fn http_status(method: &'static str, url: impl Into<String>, status: u16) -> Self {
        Error::HttpStatus {
            method,
            url: url.into(),
            status,
        }
    }
}
