//! Read-only SQLite queries against a versioned object in an
//! S3-compatible object store, without downloading it in full.
//!
//! A [`session::Session`] pins one object version at open time (via a
//! signed HEAD) and answers every page read libsqlite3 issues for the
//! rest of its life with a signed HTTP range GET against that same
//! version — concurrent overwrites of the underlying key are invisible
//! to an open session.

pub mod binding;
pub mod credentials;
pub mod error;
pub mod ffi;
pub mod http;
pub mod range_reader;
pub mod registry;
pub mod session;
pub mod signer;
pub mod statement;
pub mod vfs;

pub use binding::ObjectBinding;
pub use credentials::{Credentials, CredentialsProvider, EnvCredentialsProvider, StaticCredentialsProvider};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestBlockingClient};
pub use ffi::loader::{DlopenLoader, Sqlite3Loader};
pub use session::{open_with_defaults, Session, SessionOptions};
pub use statement::{Param, Params, ResultStream, Row, ScriptCursor, Value};
