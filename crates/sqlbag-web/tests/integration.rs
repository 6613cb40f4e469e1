//! End-to-end tests for request-scoped sessions.
//!
//! A real axum server is bound to an ephemeral port and driven with
//! `reqwest`. Each test gets SQLite scratch databases in a temp directory.

use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use sqlbag::{ConnectionDescriptor, Dialect, ScratchDatabase};
use sqlbag_web::{RequestSessions, ScopedSessions, WebError, session_setup};
use sqlx::{AnyPool, Row};
use tokio::net::TcpListener;

// ── handlers ────────────────────────────────────────────────────────────

async fn insert_ok(sessions: RequestSessions) -> Result<&'static str, WebError> {
    let mut s = sessions.session("main").await?;
    s.execute("INSERT INTO note (body) VALUES ('kept')").await?;
    Ok("inserted")
}

async fn insert_then_fail(sessions: RequestSessions) -> Result<StatusCode, WebError> {
    let mut s = sessions.session("main").await?;
    s.execute("INSERT INTO note (body) VALUES ('discarded')").await?;
    Ok(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn insert_audit(sessions: RequestSessions) -> Result<&'static str, WebError> {
    let mut s = sessions.session("audit").await?;
    s.execute("INSERT INTO note (body) VALUES ('audit')").await?;
    Ok("audited")
}

async fn unknown(sessions: RequestSessions) -> Result<&'static str, WebError> {
    let _guard = sessions.session("nope").await?;
    Ok("unreachable")
}

async fn count_rows(sessions: RequestSessions) -> Result<String, WebError> {
    let mut s = sessions.session("main").await?;
    let rows = s.fetch_all("SELECT COUNT(*) FROM note").await?;
    let n: i64 = rows[0].try_get(0)?;
    Ok(n.to_string())
}

// ── helpers ─────────────────────────────────────────────────────────────

struct Fixture {
    base: String,
    main: AnyPool,
    audit: AnyPool,
    _scratch: (ScratchDatabase, ScratchDatabase),
    _dir: tempfile::TempDir,
}

async fn note_pool(scratch: &mut ScratchDatabase) -> AnyPool {
    let pool = scratch.pool(1).await.unwrap();
    sqlbag::raw_execute(&pool, "CREATE TABLE note (id INTEGER PRIMARY KEY, body TEXT)")
        .await
        .unwrap();
    pool
}

async fn count(pool: &AnyPool) -> i64 {
    sqlx::query("SELECT COUNT(*) FROM note")
        .fetch_one(pool)
        .await
        .unwrap()
        .get(0)
}

/// Bind to 127.0.0.1:0 with a `main` (committing) and an `audit`
/// (non-committing) session factory, each on its own scratch database.
async fn start_test_server() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let server = ConnectionDescriptor::new(Dialect::Sqlite).with_database(dir.path().to_string_lossy());

    let mut main_db = ScratchDatabase::acquire(&server).await.unwrap();
    let mut audit_db = ScratchDatabase::acquire(&server).await.unwrap();
    let main = note_pool(&mut main_db).await;
    let audit = note_pool(&mut audit_db).await;

    let sessions = ScopedSessions::new()
        .register("main", main.clone())
        .register_with("audit", audit.clone(), false);

    let app = session_setup(
        Router::new()
            .route("/ok", post(insert_ok))
            .route("/fail", post(insert_then_fail))
            .route("/audit", post(insert_audit))
            .route("/unknown", get(unknown))
            .route("/count", get(count_rows)),
        sessions,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Fixture {
        base: format!("http://127.0.0.1:{}", addr.port()),
        main,
        audit,
        _scratch: (main_db, audit_db),
        _dir: dir,
    }
}

// ── tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_request_commits() {
    let fx = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{}/ok", fx.base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "inserted");

    assert_eq!(count(&fx.main).await, 1);
}

#[tokio::test]
async fn error_status_rolls_back() {
    let fx = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{}/fail", fx.base)).send().await.unwrap();
    assert_eq!(resp.status(), 500);

    assert_eq!(count(&fx.main).await, 0);
}

#[tokio::test]
async fn non_committing_factory_rolls_back_on_success() {
    let fx = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{}/audit", fx.base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(count(&fx.audit).await, 0);
}

#[tokio::test]
async fn unknown_session_is_a_server_error() {
    let fx = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/unknown", fx.base)).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("nope"));
}

#[tokio::test]
async fn sessions_do_not_leak_between_requests() {
    let fx = start_test_server().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let resp = client.post(format!("{}/ok", fx.base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }
    client.post(format!("{}/fail", fx.base)).send().await.unwrap();

    let resp = client.get(format!("{}/count", fx.base)).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "3");
}

#[tokio::test]
async fn handler_without_layer_is_rejected() {
    let app = Router::new().route("/count", get(count_rows));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let resp = reqwest::get(format!("http://127.0.0.1:{}/count", addr.port()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp.text().await.unwrap().contains("session layer missing"));
}
