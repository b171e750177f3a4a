//! Shared test infrastructure for the end-to-end VFS integration suite.
//!
//! Spins up an ephemeral, versioned MinIO bucket via `testcontainers`,
//! builds a small SQLite fixture database using the same dynamically
//! loaded libsqlite3 the crate under test drives (through the raw FFI
//! layer, bypassing the custom VFS so the fixture can actually be
//! written to local disk), and uploads it as a versioned object.
//!
//! All of this requires Docker and a system libsqlite3; every test that
//! needs them starts with `skip_unless_docker!()` and skips gracefully
//! rather than failing the suite on machines without either.

#![allow(dead_code)]

use std::ffi::CString;
use std::os::raw::c_int;
use std::process::Command;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials as AwsCredentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::BucketVersioningStatus;
use aws_sdk_s3::Client;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;

use sqlite_s3_vfs::ffi;
use sqlite_s3_vfs::DlopenLoader;

pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";
pub const TEST_REGION: &str = "us-east-1";
pub const TEST_BUCKET: &str = "sqlite-s3-vfs-test";

/// Install a `tracing` subscriber once per test binary so VFS reads,
/// session open/close, and range-GET spans show up under
/// `RUST_LOG=sqlite_s3_vfs=trace` instead of being silently dropped.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Check for Docker the same way: run `docker version` and look at the
/// exit code, nothing fancier.
pub fn docker_available() -> bool {
    Command::new("docker")
        .arg("version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Skip the current test body if Docker isn't reachable.
#[macro_export]
macro_rules! skip_unless_docker {
    () => {
        if !common::docker_available() {
            eprintln!("Docker not available, skipping test");
            return;
        }
    };
}

/// Candidate paths `dlopen` is tried against, in order, to find a system
/// libsqlite3 — the same shared library a real deployment would load via
/// the crate's [`sqlite_s3_vfs::ffi::loader::Sqlite3Loader`] collaborator.
const SQLITE3_LIBRARY_CANDIDATES: &[&str] = &[
    "libsqlite3.so.0",
    "libsqlite3.so",
    "/usr/lib/x86_64-linux-gnu/libsqlite3.so.0",
    "/usr/lib/aarch64-linux-gnu/libsqlite3.so.0",
    "/usr/lib/libsqlite3.so.0",
    "libsqlite3.dylib",
];

/// Open whichever candidate libsqlite3 actually loads on this machine.
pub fn open_system_sqlite3() -> DlopenLoader {
    for candidate in SQLITE3_LIBRARY_CANDIDATES {
        if let Ok(loader) = unsafe { DlopenLoader::open(candidate) } {
            return loader;
        }
    }
    panic!(
        "no system libsqlite3 found among {:?}; install libsqlite3 to run the VFS integration suite",
        SQLITE3_LIBRARY_CANDIDATES
    );
}

/// Build a tiny `t(a INTEGER, b TEXT)` fixture database with `rows`,
/// using libsqlite3's own default VFS (never the crate's custom one —
/// that VFS cannot write, by design). Returns the raw file bytes.
pub fn build_fixture_database(rows: &[(i64, &str)]) -> Vec<u8> {
    let loader = open_system_sqlite3();
    let api = ffi::loader::resolve_api(&loader).expect("resolve sqlite3 symbols");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fixture.sqlite3");
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    let mut db: *mut ffi::Sqlite3 = std::ptr::null_mut();
    let flags = ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
    let rc = unsafe { (api.open_v2)(c_path.as_ptr(), &mut db, flags as c_int, std::ptr::null()) };
    assert_eq!(rc, ffi::SQLITE_OK, "failed to create fixture database");

    exec(&api, db, "CREATE TABLE t (a INTEGER, b TEXT)");
    for (a, b) in rows {
        exec(&api, db, &format!("INSERT INTO t (a, b) VALUES ({a}, '{b}')"));
    }

    unsafe {
        (api.close)(db);
    }

    std::fs::read(&path).expect("read fixture database back from disk")
}

fn exec(api: &ffi::Sqlite3Api, db: *mut ffi::Sqlite3, sql: &str) {
    let c_sql = CString::new(sql).unwrap();
    let mut stmt: *mut ffi::Sqlite3Stmt = std::ptr::null_mut();
    let rc = unsafe {
        (api.prepare_v3)(db, c_sql.as_ptr(), -1, 0, &mut stmt, std::ptr::null_mut())
    };
    assert_eq!(rc, ffi::SQLITE_OK, "prepare failed for {sql:?}");
    loop {
        let rc = unsafe { (api.step)(stmt) };
        match rc {
            ffi::SQLITE_ROW => continue,
            ffi::SQLITE_DONE => break,
            other => panic!("step failed for {sql:?}: {other}"),
        }
    }
    unsafe {
        (api.finalize)(stmt);
    }
}

/// An ephemeral MinIO container plus a client already pointed at it.
pub struct Minio {
    pub container: ContainerAsync<MinIO>,
    pub client: Client,
    pub endpoint: String,
}

async fn start_minio() -> Minio {
    let container = MinIO::default()
        .start()
        .await
        .expect("start MinIO container");
    let port = container
        .get_host_port_ipv4(9000.tcp())
        .await
        .expect("MinIO port");
    let endpoint = format!("http://127.0.0.1:{port}");

    let credentials = AwsCredentials::new(MINIO_ACCESS_KEY, MINIO_SECRET_KEY, None, None, "minio");
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(TEST_REGION))
        .endpoint_url(&endpoint)
        .credentials_provider(credentials)
        .load()
        .await;
    let client = Client::from_conf(
        aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build(),
    );

    client
        .create_bucket()
        .bucket(TEST_BUCKET)
        .send()
        .await
        .expect("create bucket");

    Minio {
        container,
        client,
        endpoint,
    }
}

/// Start MinIO, enable bucket versioning, and return a ready client. The
/// caller is responsible for keeping the returned [`Minio`] alive for as
/// long as the bucket needs to be reachable.
pub async fn start_versioned_minio() -> Minio {
    let minio = start_minio().await;
    minio
        .client
        .put_bucket_versioning()
        .bucket(TEST_BUCKET)
        .versioning_configuration(
            aws_sdk_s3::types::VersioningConfiguration::builder()
                .status(BucketVersioningStatus::Enabled)
                .build(),
        )
        .send()
        .await
        .expect("enable bucket versioning");
    minio
}

/// Upload `bytes` as `key`, returning the object URL our crate's session
/// opener expects (`https://` is what real S3 uses; MinIO over plain
/// HTTP is accepted too since `binding::resolve` allows both schemes for
/// local testing against S3-compatible stores).
pub async fn put_object(minio: &Minio, key: &str, bytes: Vec<u8>) -> String {
    minio
        .client
        .put_object()
        .bucket(TEST_BUCKET)
        .key(key)
        .body(ByteStream::from(bytes))
        .send()
        .await
        .expect("put object");
    format!("{}/{}/{}", minio.endpoint, TEST_BUCKET, key)
}

/// Start a fresh MinIO container *without* enabling bucket versioning,
/// for the unversioned-bucket rejection scenario (S6).
pub async fn start_unversioned_minio() -> Minio {
    start_minio().await
}
