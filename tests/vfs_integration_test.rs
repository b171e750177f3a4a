//! End-to-end VFS integration tests against an ephemeral, versioned
//! MinIO bucket (§8's literal scenarios S1–S6).
//!
//! Requires Docker and a system libsqlite3. Tests skip gracefully if
//! either is unavailable.

mod common;

use sqlite_s3_vfs::credentials::StaticCredentialsProvider;
use sqlite_s3_vfs::http::ReqwestBlockingClient;
use sqlite_s3_vfs::{Error, Param, Params, Session, SessionOptions, Value};
use std::sync::Arc;

use common::{
    build_fixture_database, open_system_sqlite3, put_object, start_unversioned_minio,
    start_versioned_minio, MINIO_ACCESS_KEY, MINIO_SECRET_KEY, TEST_REGION,
};

fn open_session(url: &str) -> Session {
    let loader = open_system_sqlite3();
    let http: Arc<dyn sqlite_s3_vfs::http::HttpClient> =
        Arc::new(ReqwestBlockingClient::new().expect("build http client"));
    let credentials: Arc<dyn sqlite_s3_vfs::credentials::CredentialsProvider> = Arc::new(
        StaticCredentialsProvider::new(TEST_REGION, MINIO_ACCESS_KEY, MINIO_SECRET_KEY, None),
    );
    Session::open(url, &loader, http, credentials, SessionOptions::default())
        .expect("open session against pinned object version")
}

#[tokio::test]
async fn s1_select_all_rows_in_declared_order() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x"), (2, "y")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let session = open_session(&url);
    let (columns, rows) = session
        .query("SELECT a, b FROM t ORDER BY a", Params::None)
        .expect("query t");

    assert_eq!(columns, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Text("x".to_string())],
            vec![Value::Integer(2), Value::Text("y".to_string())],
        ]
    );
}

#[tokio::test]
async fn s2_positional_parameter_selects_matching_row() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x"), (2, "y")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let session = open_session(&url);
    let params = [Param::Integer(2)];
    let (columns, rows) = session
        .query("SELECT b FROM t WHERE a = ?", Params::Positional(&params))
        .expect("positional query");

    assert_eq!(columns, vec!["b".to_string()]);
    assert_eq!(rows, vec![vec![Value::Text("y".to_string())]]);
}

#[tokio::test]
async fn s3_named_parameter_selects_matching_row() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x"), (2, "y")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let session = open_session(&url);
    let params = [(":k", Param::Integer(1))];
    let (columns, rows) = session
        .query("SELECT b FROM t WHERE a = :k", Params::Named(&params))
        .expect("named query");

    assert_eq!(columns, vec!["b".to_string()]);
    assert_eq!(rows, vec![vec![Value::Text("x".to_string())]]);
}

#[tokio::test]
async fn s4_version_pinning_survives_concurrent_overwrite() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let original = build_fixture_database(&[(1, "x"), (2, "y")]);
    let url = put_object(&minio, "db.sqlite3", original).await;

    let session = open_session(&url);
    let (_, first) = session
        .query("SELECT a, b FROM t ORDER BY a", Params::None)
        .expect("first query");

    // Overwrite the object with a new version while the session stays
    // pinned to the one it resolved at open.
    let replaced = build_fixture_database(&[(3, "z")]);
    put_object(&minio, "db.sqlite3", replaced).await;

    let (_, second) = session
        .query("SELECT a, b FROM t ORDER BY a", Params::None)
        .expect("second query after concurrent overwrite");

    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            vec![Value::Integer(1), Value::Text("x".to_string())],
            vec![Value::Integer(2), Value::Text("y".to_string())],
        ]
    );
}

#[tokio::test]
async fn s5_multi_statement_script_yields_one_pair_per_statement() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let session = open_session(&url);
    let results = session
        .query_script("SELECT 1; SELECT 2;", &[])
        .expect("multi-statement script");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0], (vec!["1".to_string()], vec![vec![Value::Integer(1)]]));
    assert_eq!(results[1], (vec!["2".to_string()], vec![vec![Value::Integer(2)]]));
}

#[tokio::test]
async fn s6_unversioned_bucket_rejected_before_any_query_runs() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_unversioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let loader = open_system_sqlite3();
    let http: Arc<dyn sqlite_s3_vfs::http::HttpClient> =
        Arc::new(ReqwestBlockingClient::new().unwrap());
    let credentials: Arc<dyn sqlite_s3_vfs::credentials::CredentialsProvider> = Arc::new(
        StaticCredentialsProvider::new(TEST_REGION, MINIO_ACCESS_KEY, MINIO_SECRET_KEY, None),
    );

    let err = Session::open(&url, &loader, http, credentials, SessionOptions::default())
        .expect_err("unversioned bucket must fail at open");
    assert!(matches!(err, Error::VersioningNotEnabled));
}

#[tokio::test]
async fn no_writes_ever_escape_a_read_only_session() {
    skip_unless_docker!();
    common::init_tracing();
    let minio = start_versioned_minio().await;
    let bytes = build_fixture_database(&[(1, "x")]);
    let url = put_object(&minio, "db.sqlite3", bytes).await;

    let session = open_session(&url);
    let err = session
        .query("CREATE TABLE nope (a INTEGER)", Params::None)
        .expect_err("writes must fail cleanly, never be signed and sent");
    assert!(matches!(err, Error::Sqlite { .. }));
}
