//! Integration tests for the sqlbag crate.
//!
//! Everything here runs against SQLite files in a temp directory, so no
//! database server is needed. Server-backed tests live in `servers.rs`.

use futures::FutureExt;
use sqlbag::{
    ConnectionDescriptor, Dialect, Record, ScratchDatabase, ScratchOptions, ScratchState,
    SqlbagConfig, SqlbagError, changes, list_tables, load_sql_from_folder, with_scratch_database,
    with_scratch_database_opts,
};
use sqlx::Row;

fn sqlite_server(dir: &tempfile::TempDir) -> ConnectionDescriptor {
    ConnectionDescriptor::new(Dialect::Sqlite).with_database(dir.path().to_string_lossy())
}

// ═══════════════════════════════════════════════════════════════════════
//  Scratch lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scratch_database_full_lifecycle() {
    sqlbag::logging::init_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);

    let mut scratch = ScratchDatabase::acquire(&server).await.unwrap();
    let db = scratch.descriptor().clone();
    assert!(sqlbag::database_exists(&db).await.unwrap());
    assert!(sqlbag::can_select(&db).await);

    let pool = scratch.pool(2).await.unwrap();
    sqlbag::raw_execute(&pool, "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);")
        .await
        .unwrap();
    pool.close().await;
    assert_eq!(scratch.state(), ScratchState::InUse);

    scratch.release().await.unwrap();
    assert!(!sqlbag::database_exists(&db).await.unwrap());
    assert!(!sqlbag::can_select(&db).await);
}

#[tokio::test]
async fn schema_folder_loads_into_scratch_database() {
    let dir = tempfile::tempdir().unwrap();
    let schema = tempfile::tempdir().unwrap();
    std::fs::write(
        schema.path().join("01_tables.sql"),
        "CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT);\nCREATE TABLE author (id INTEGER);",
    )
    .unwrap();
    std::fs::write(
        schema.path().join("02_data.sql"),
        "INSERT INTO book (title) VALUES ('Dune');",
    )
    .unwrap();

    let server = sqlite_server(&dir);
    let schema_path = schema.path().to_path_buf();
    let (tables, record) = with_scratch_database(&server, |db| async move {
        let mut conn = sqlbag::connect(&db).await?;
        let files = load_sql_from_folder(&mut conn, &schema_path).await?;
        assert_eq!(files, 2);

        let tables = list_tables(&mut conn, Dialect::Sqlite).await?;
        let row = sqlx::query("SELECT id, title FROM book")
            .fetch_one(&mut conn)
            .await?;
        Ok::<_, SqlbagError>((tables, Record::from_row("Book", &row)))
    })
    .await
    .unwrap();

    assert_eq!(tables, vec!["author".to_owned(), "book".to_owned()]);
    assert_eq!(record.to_string(), r#"Book(id=1, title="Dune")"#);
}

#[tokio::test]
async fn failing_body_still_drops_database() {
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);

    let mut seen = None;
    let result: Result<(), SqlbagError> = with_scratch_database(&server, |db| {
        seen = db.sqlite_path();
        async { Err(SqlbagError::Config("assertion failed".into())) }
    })
    .await;

    assert!(matches!(result, Err(SqlbagError::Config(_))));
    assert!(!seen.unwrap().exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn panicking_body_still_drops_database() {
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);

    let outcome = std::panic::AssertUnwindSafe(with_scratch_database(&server, |_db| async {
        if true {
            panic!("test body panicked");
        }
        Ok::<(), SqlbagError>(())
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn keep_option_leaves_database_behind() {
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);
    let options = ScratchOptions {
        prefix: "kept_".into(),
        keep: true,
        template: None,
    };

    let db = with_scratch_database_opts(&server, options, |db| async move {
        Ok::<_, SqlbagError>(db)
    })
    .await
    .unwrap();

    let path = db.sqlite_path().unwrap();
    assert!(path.exists());
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("kept_"));
    assert!(sqlbag::drop_database(&db).await.unwrap());
}

// ═══════════════════════════════════════════════════════════════════════
//  Sessions
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn transaction_commit_and_rollback_on_scratch() {
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);

    with_scratch_database(&server, |db| async move {
        let mut conn = sqlbag::connect(&db).await?;
        sqlbag::raw_execute(&mut conn, "CREATE TABLE t (id INTEGER)").await?;

        sqlbag::transaction(&db, |s| {
            async move { s.execute("INSERT INTO t VALUES (1)").await }.boxed()
        })
        .await?;

        let failed: Result<(), SqlbagError> = sqlbag::transaction(&db, |s| {
            async move {
                s.execute("INSERT INTO t VALUES (2)").await?;
                s.execute("INSERT INTO missing VALUES (3)").await?;
                Ok(())
            }
            .boxed()
        })
        .await;
        assert!(matches!(failed, Err(SqlbagError::Query(_))));

        let ids: Vec<i64> = sqlx::query("SELECT id FROM t ORDER BY id")
            .fetch_all(&mut conn)
            .await?
            .iter()
            .map(|r| r.get(0))
            .collect();
        assert_eq!(ids, vec![1]);
        Ok::<_, SqlbagError>(())
    })
    .await
    .unwrap();
}

async fn read_item(conn: &mut sqlx::AnyConnection) -> Result<Record, SqlbagError> {
    let row = sqlx::query("SELECT id, name, qty FROM item WHERE id = 1")
        .fetch_one(conn)
        .await?;
    Ok(Record::from_row("Item", &row))
}

#[tokio::test]
async fn record_changes_between_reads() {
    let dir = tempfile::tempdir().unwrap();
    let server = sqlite_server(&dir);

    let diff = with_scratch_database(&server, |db| async move {
        let mut conn = sqlbag::connect(&db).await?;
        sqlbag::raw_execute(
            &mut conn,
            "CREATE TABLE item (id INTEGER, name TEXT, qty INTEGER);
             INSERT INTO item VALUES (1, 'bolt', 10);",
        )
        .await?;

        let before = read_item(&mut conn).await?;
        sqlbag::raw_execute(&mut conn, "UPDATE item SET qty = 12 WHERE id = 1").await?;
        let after = read_item(&mut conn).await?;

        Ok::<_, SqlbagError>(changes(&before, &after))
    })
    .await
    .unwrap();

    assert_eq!(diff.len(), 1);
    assert_eq!(diff["qty"], serde_json::json!([10, 12]));
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn config_sqlite_dir_drives_scratch_location() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sqlbag.toml");
    std::fs::write(
        &config_path,
        format!(
            "dialect = \"sqlite\"\nsqlite_dir = {:?}\n\n[scratch]\nprefix = \"cfg_\"\n",
            dir.path().to_string_lossy()
        ),
    )
    .unwrap();

    let config = SqlbagConfig::load(&config_path).unwrap();
    let server = config.descriptor(config.dialect);
    let scratch = ScratchDatabase::acquire_with(&server, config.scratch_options())
        .await
        .unwrap();

    let path = scratch.descriptor().sqlite_path().unwrap();
    assert_eq!(path.parent(), Some(dir.path()));
    assert!(scratch.name().starts_with("cfg_"));
    scratch.release().await.unwrap();
    assert!(!path.exists());
}
