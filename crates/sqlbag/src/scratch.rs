//! Scratch databases: uniquely named, disposable databases for tests.
//!
//! A [`ScratchDatabase`] is created on the server a descriptor points at and
//! dropped again when the handle is released. The usual entry point is the
//! scoped form, which guarantees the release on every exit path:
//!
//! ```ignore
//! let server = ConnectionDescriptor::parse("postgresql://app@localhost/postgres")?;
//! sqlbag::with_scratch_database(&server, |db| async move {
//!     let mut conn = sqlbag::connect(&db).await?;
//!     sqlbag::raw_execute(&mut conn, "create table t (id int)").await?;
//!     Ok::<_, SqlbagError>(())
//! })
//! .await?;
//! ```
//!
//! Outcomes of the scoped form:
//!
//! | body          | release fails            | result            |
//! |---------------|--------------------------|-------------------|
//! | `Ok(v)`       | no                       | `Ok(v)`           |
//! | `Ok(v)`       | yes                      | `Err(Teardown)`   |
//! | `Err(e)`      | either (failure logged)  | `Err(e)`          |
//! | panics        | either (failure logged)  | panic resumes     |
//!
//! A handle dropped without [`ScratchDatabase::release`] falls back to a
//! blocking drop on a helper thread.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use sqlx::{AnyConnection, AnyPool};
use tracing::{error, info, warn};

use crate::config::SqlbagConfig;
use crate::createdrop::{self, CreateOptions, DEFAULT_PREFIX, temporary_name};
use crate::error::{SqlbagError, SqlbagResult};
use crate::session;
use crate::url::{ConnectionDescriptor, Dialect};

// ---------------------------------------------------------------------------
// Options and state
// ---------------------------------------------------------------------------

/// How scratch databases are named and whether they survive release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchOptions {
    /// Prefix for the generated database name.
    pub prefix: String,
    /// Skip the drop on release and leave the database for inspection.
    pub keep: bool,
    /// PostgreSQL template database to create from.
    pub template: Option<String>,
}

impl Default for ScratchOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            keep: false,
            template: None,
        }
    }
}

/// Where a scratch database is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchState {
    /// Created on the server, not yet handed to a caller.
    Created,
    /// Handed to a caller.
    InUse,
    /// Dropped from the server. Terminal.
    Dropped,
    /// Released with `keep` set; still present on the server. Terminal.
    Retained,
}

// ---------------------------------------------------------------------------
// Lifecycle seam
// ---------------------------------------------------------------------------

/// Creates and drops the databases behind scratch handles.
#[async_trait]
pub trait DatabaseLifecycle: Send + Sync {
    /// Create the database `target` names. A name collision is an error.
    async fn create_database(
        &self,
        target: &ConnectionDescriptor,
        options: &ScratchOptions,
    ) -> SqlbagResult<()>;

    /// Drop the database `target` names. Returns `false` if it was already
    /// gone.
    async fn drop_database(&self, target: &ConnectionDescriptor) -> SqlbagResult<bool>;
}

/// [`DatabaseLifecycle`] backed by [`crate::createdrop`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerLifecycle;

#[async_trait]
impl DatabaseLifecycle for ServerLifecycle {
    async fn create_database(
        &self,
        target: &ConnectionDescriptor,
        options: &ScratchOptions,
    ) -> SqlbagResult<()> {
        let create = CreateOptions {
            template: options.template.clone(),
            wipe_if_existing: false,
        };
        let name = || target.database().unwrap_or_default().to_owned();
        match createdrop::create_database(target, &create).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(SqlbagError::Creation {
                name: name(),
                reason: "database already exists".to_owned(),
            }),
            Err(e) => Err(as_creation_error(e, name())),
        }
    }

    async fn drop_database(&self, target: &ConnectionDescriptor) -> SqlbagResult<bool> {
        createdrop::drop_database(target).await
    }
}

/// Acquire fails only with `Connection` or `Creation`; anything else raised
/// while creating becomes `Creation`.
fn as_creation_error(err: SqlbagError, name: String) -> SqlbagError {
    match err {
        SqlbagError::Connection { .. } | SqlbagError::Creation { .. } => err,
        other => SqlbagError::Creation {
            name,
            reason: other.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A scratch database owned by the current scope.
///
/// Not `Clone`: exactly one owner releases it. [`release`](Self::release)
/// consumes the handle, so a dropped database cannot be used again.
pub struct ScratchDatabase {
    name: String,
    server: ConnectionDescriptor,
    target: ConnectionDescriptor,
    state: ScratchState,
    keep: bool,
    lifecycle: Arc<dyn DatabaseLifecycle>,
}

impl ScratchDatabase {
    /// Create a scratch database on `server` with default options.
    pub async fn acquire(server: &ConnectionDescriptor) -> SqlbagResult<Self> {
        Self::acquire_with(server, ScratchOptions::default()).await
    }

    /// Create a scratch database on `server`.
    ///
    /// Fails with [`SqlbagError::Connection`] when the server cannot be
    /// reached and [`SqlbagError::Creation`] when the database cannot be
    /// created.
    pub async fn acquire_with(
        server: &ConnectionDescriptor,
        options: ScratchOptions,
    ) -> SqlbagResult<Self> {
        Self::acquire_using(server, options, Arc::new(ServerLifecycle)).await
    }

    /// Create a scratch database through a custom [`DatabaseLifecycle`].
    pub async fn acquire_using(
        server: &ConnectionDescriptor,
        options: ScratchOptions,
        lifecycle: Arc<dyn DatabaseLifecycle>,
    ) -> SqlbagResult<Self> {
        let name = temporary_name(&options.prefix);
        let target = scratch_target(server, &name).await;

        lifecycle.create_database(&target, &options).await?;
        info!(database = %name, dialect = %server.dialect(), "created scratch database");

        Ok(Self {
            name,
            server: server.clone(),
            target,
            state: ScratchState::Created,
            keep: options.keep,
            lifecycle,
        })
    }

    /// The generated database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor the handle was acquired from.
    pub fn server(&self) -> &ConnectionDescriptor {
        &self.server
    }

    /// Descriptor pointing at the scratch database itself.
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.target
    }

    pub fn state(&self) -> ScratchState {
        self.state
    }

    /// Record that the database has been handed to a caller.
    pub fn mark_in_use(&mut self) {
        if self.state == ScratchState::Created {
            self.state = ScratchState::InUse;
        }
    }

    /// Open a connection to the scratch database.
    pub async fn connect(&mut self) -> SqlbagResult<AnyConnection> {
        self.mark_in_use();
        session::connect(&self.target).await
    }

    /// Open a pool on the scratch database.
    pub async fn pool(&mut self, max_connections: u32) -> SqlbagResult<AnyPool> {
        self.mark_in_use();
        session::pool(&self.target, max_connections).await
    }

    /// Drop the scratch database.
    ///
    /// A database that is already gone is not an error. Any other failure is
    /// returned as [`SqlbagError::Teardown`]. With `keep` set the database is
    /// left in place and the handle ends up [`ScratchState::Retained`].
    pub async fn release(mut self) -> SqlbagResult<()> {
        if self.keep {
            self.state = ScratchState::Retained;
            info!(database = %self.name, target = %self.target, "keeping scratch database");
            return Ok(());
        }

        let result = self.lifecycle.drop_database(&self.target).await;
        self.state = ScratchState::Dropped;

        match result {
            Ok(true) => {
                info!(database = %self.name, "dropped scratch database");
                Ok(())
            }
            Ok(false) => {
                warn!(database = %self.name, "scratch database was already gone");
                Ok(())
            }
            Err(e) if e.is_teardown() => Err(e),
            Err(e) => Err(SqlbagError::Teardown {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Run `body` with the scratch database's descriptor, then release.
    ///
    /// See the module docs for how body and teardown failures combine.
    pub async fn scope<T, E, F, Fut>(mut self, body: F) -> Result<T, E>
    where
        F: FnOnce(ConnectionDescriptor) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SqlbagError>,
    {
        self.mark_in_use();
        let target = self.target.clone();
        let name = self.name.clone();

        let outcome = AssertUnwindSafe(async move { body(target).await })
            .catch_unwind()
            .await;
        let released = self.release().await;

        match outcome {
            Ok(Ok(value)) => {
                released?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(teardown) = released {
                    error!(database = %name, error = %teardown, "teardown failed after error");
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(teardown) = released {
                    error!(database = %name, error = %teardown, "teardown failed after panic");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

impl fmt::Debug for ScratchDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchDatabase")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("state", &self.state)
            .field("keep", &self.keep)
            .finish_non_exhaustive()
    }
}

impl Drop for ScratchDatabase {
    fn drop(&mut self) {
        if !matches!(self.state, ScratchState::Created | ScratchState::InUse) {
            return;
        }
        if self.keep {
            info!(database = %self.name, "keeping scratch database");
            return;
        }

        warn!(database = %self.name, "scratch database not released, dropping it in the background");

        let lifecycle = Arc::clone(&self.lifecycle);
        let target = self.target.clone();
        let name = self.name.clone();

        // A fresh runtime on its own thread works whether or not the caller
        // is inside one.
        let worker = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(database = %name, error = %e, "cannot start runtime for teardown");
                    return;
                }
            };
            match runtime.block_on(lifecycle.drop_database(&target)) {
                Ok(_) => info!(database = %name, "dropped scratch database"),
                Err(e) => error!(database = %name, error = %e, "teardown failed"),
            }
        });
        if worker.join().is_err() {
            error!(database = %self.name, "teardown thread panicked");
        }
        self.state = ScratchState::Dropped;
    }
}

// ---------------------------------------------------------------------------
// Scoped helpers
// ---------------------------------------------------------------------------

/// Acquire a scratch database on `server`, run `body` with its descriptor
/// and release it on every exit path.
pub async fn with_scratch_database<T, E, F, Fut>(
    server: &ConnectionDescriptor,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(ConnectionDescriptor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SqlbagError>,
{
    with_scratch_database_opts(server, ScratchOptions::default(), body).await
}

/// [`with_scratch_database`] with explicit options.
pub async fn with_scratch_database_opts<T, E, F, Fut>(
    server: &ConnectionDescriptor,
    options: ScratchOptions,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(ConnectionDescriptor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SqlbagError>,
{
    let scratch = ScratchDatabase::acquire_with(server, options).await?;
    scratch.scope(body).await
}

/// Run `body` against a scratch `dialect` database on the server the
/// environment points at.
///
/// Server defaults and scratch options come from [`SqlbagConfig::from_env`].
///
/// ```ignore
/// sqlbag::temporary_database(Dialect::Postgres, |db| async move {
///     let mut conn = sqlbag::connect(&db).await?;
///     Ok::<_, SqlbagError>(())
/// })
/// .await?;
/// ```
pub async fn temporary_database<T, E, F, Fut>(dialect: Dialect, body: F) -> Result<T, E>
where
    F: FnOnce(ConnectionDescriptor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SqlbagError>,
{
    let config = SqlbagConfig::from_env()?;
    temporary_database_with(&config, dialect, body).await
}

/// [`temporary_database`] with an explicit configuration.
pub async fn temporary_database_with<T, E, F, Fut>(
    config: &SqlbagConfig,
    dialect: Dialect,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(ConnectionDescriptor) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SqlbagError>,
{
    let server = config.descriptor(dialect);
    with_scratch_database_opts(&server, config.scratch_options(), body).await
}

/// Descriptor for the scratch database `name` on `server`.
///
/// SQLite scratch files go in the directory the server descriptor names, or
/// the system temp directory when it names no directory.
async fn scratch_target(server: &ConnectionDescriptor, name: &str) -> ConnectionDescriptor {
    if server.dialect() != Dialect::Sqlite {
        return server.clone().with_database(name);
    }

    let dir = match server.sqlite_path() {
        Some(path) if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) => path,
        _ => std::env::temp_dir(),
    };
    let file: PathBuf = dir.join(format!("{name}.db"));
    ConnectionDescriptor::new(Dialect::Sqlite).with_database(file.to_string_lossy())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting {
        created: AtomicUsize,
        dropped: AtomicUsize,
        fail_drop: bool,
    }

    #[async_trait]
    impl DatabaseLifecycle for Counting {
        async fn create_database(
            &self,
            _target: &ConnectionDescriptor,
            _options: &ScratchOptions,
        ) -> SqlbagResult<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn drop_database(&self, target: &ConnectionDescriptor) -> SqlbagResult<bool> {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            if self.fail_drop {
                return Err(SqlbagError::Teardown {
                    name: target.database().unwrap_or_default().to_owned(),
                    reason: "refused".to_owned(),
                });
            }
            Ok(true)
        }
    }

    fn memory_server() -> ConnectionDescriptor {
        ConnectionDescriptor::new(Dialect::Sqlite)
    }

    async fn counted(lifecycle: &Arc<Counting>) -> ScratchDatabase {
        ScratchDatabase::acquire_using(
            &memory_server(),
            ScratchOptions::default(),
            Arc::clone(lifecycle) as Arc<dyn DatabaseLifecycle>,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn release_runs_once_when_body_fails() {
        let lifecycle = Arc::new(Counting::default());
        let scratch = counted(&lifecycle).await;

        let result: Result<(), SqlbagError> = scratch
            .scope(|_db| async { Err(SqlbagError::Config("test failed".into())) })
            .await;

        assert!(matches!(result, Err(SqlbagError::Config(_))));
        assert_eq!(lifecycle.created.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_runs_once_when_body_panics() {
        let lifecycle = Arc::new(Counting::default());
        let scratch = counted(&lifecycle).await;

        let outcome = AssertUnwindSafe(scratch.scope(|_db| async {
            if true {
                panic!("assertion inside test body");
            }
            Ok::<(), SqlbagError>(())
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(lifecycle.dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_failure_surfaces_after_success() {
        let lifecycle = Arc::new(Counting {
            fail_drop: true,
            ..Counting::default()
        });
        let scratch = counted(&lifecycle).await;

        let result: Result<u32, SqlbagError> = scratch.scope(|_db| async { Ok(7) }).await;
        assert!(result.unwrap_err().is_teardown());
    }

    #[tokio::test]
    async fn teardown_failure_does_not_mask_body_error() {
        let lifecycle = Arc::new(Counting {
            fail_drop: true,
            ..Counting::default()
        });
        let scratch = counted(&lifecycle).await;

        let result: Result<(), SqlbagError> = scratch
            .scope(|_db| async { Err(SqlbagError::Config("original".into())) })
            .await;
        match result {
            Err(SqlbagError::Config(msg)) => assert_eq!(msg, "original"),
            other => panic!("expected the body's error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_create_failures_surface_as_creation() {
        // No database name: fails before any connection is attempted.
        let nameless = ConnectionDescriptor::parse("postgresql://localhost").unwrap();
        let err = ServerLifecycle
            .create_database(&nameless, &ScratchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SqlbagError::Creation { .. }), "{err}");

        let missing_dir = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database("/nonexistent-sqlbag-dir/x.db");
        let err = ServerLifecycle
            .create_database(&missing_dir, &ScratchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SqlbagError::Creation { .. }), "{err}");
    }

    #[test]
    fn creation_error_mapping_keeps_connection_failures() {
        let query = as_creation_error(SqlbagError::Query(sqlx::Error::RowNotFound), "db".into());
        match query {
            SqlbagError::Creation { name, .. } => assert_eq!(name, "db"),
            other => panic!("expected Creation, got {other:?}"),
        }

        let connection = as_creation_error(
            SqlbagError::Connection {
                target: "postgresql://localhost/postgres".into(),
                source: sqlx::Error::PoolTimedOut,
            },
            "db".into(),
        );
        assert!(matches!(connection, SqlbagError::Connection { .. }));

        let creation = as_creation_error(
            SqlbagError::Creation {
                name: "other".into(),
                reason: "exists".into(),
            },
            "db".into(),
        );
        assert!(matches!(creation, SqlbagError::Creation { ref name, .. } if name == "other"));
    }

    #[tokio::test]
    async fn unreleased_handle_is_dropped_on_drop() {
        let lifecycle = Arc::new(Counting::default());
        let scratch = counted(&lifecycle).await;
        drop(scratch);
        assert_eq!(lifecycle.dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keep_retains_the_database() {
        let lifecycle = Arc::new(Counting::default());
        let options = ScratchOptions {
            keep: true,
            ..ScratchOptions::default()
        };
        let scratch = ScratchDatabase::acquire_using(
            &memory_server(),
            options,
            Arc::clone(&lifecycle) as Arc<dyn DatabaseLifecycle>,
        )
        .await
        .unwrap();

        scratch.release().await.unwrap();
        assert_eq!(lifecycle.dropped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sqlite_scratch_lives_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let server = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database(dir.path().to_string_lossy());

        let mut scratch = ScratchDatabase::acquire(&server).await.unwrap();
        assert_eq!(scratch.state(), ScratchState::Created);
        assert!(scratch.name().starts_with(DEFAULT_PREFIX));

        let path = scratch.descriptor().sqlite_path().unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());

        let mut conn = scratch.connect().await.unwrap();
        session::raw_execute(&mut conn, "CREATE TABLE t (id INTEGER)").await.unwrap();
        drop(conn);
        assert_eq!(scratch.state(), ScratchState::InUse);

        scratch.release().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn sqlite_scratch_in_directories_with_url_characters() {
        let root = tempfile::tempdir().unwrap();

        for dir_name in ["plain", "with space", "hash#dir", "q?mark", "pct%20dir"] {
            let dir = root.path().join(dir_name);
            std::fs::create_dir(&dir).unwrap();
            let server =
                ConnectionDescriptor::new(Dialect::Sqlite).with_database(dir.to_string_lossy());

            let mut scratch = ScratchDatabase::acquire(&server).await.unwrap();
            let path = scratch.descriptor().sqlite_path().unwrap();
            assert_eq!(path.parent(), Some(dir.as_path()), "{dir_name}");

            let mut conn = scratch.connect().await.unwrap();
            session::raw_execute(&mut conn, "CREATE TABLE t (id INTEGER)")
                .await
                .unwrap();
            drop(conn);

            scratch.release().await.unwrap();
            assert!(!path.exists(), "{dir_name}");
        }
    }

    #[tokio::test]
    async fn temporary_database_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SqlbagConfig {
            sqlite_dir: Some(dir.path().to_path_buf()),
            ..SqlbagConfig::default()
        };
        config.scratch.prefix = "cfgtmp".to_owned();

        let path = temporary_database_with(&config, Dialect::Sqlite, |db| async move {
            let path = db.sqlite_path().unwrap();
            let mut conn = session::connect(&db).await?;
            session::raw_execute(&mut conn, "CREATE TABLE t (id INTEGER)").await?;
            Ok::<_, SqlbagError>(path)
        })
        .await
        .unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.starts_with("cfgtmp"), "{file}");
        assert!(!path.exists());

        config.scratch.keep = true;
        let kept = temporary_database_with(&config, Dialect::Sqlite, |db| async move {
            Ok::<_, SqlbagError>(db.sqlite_path().unwrap())
        })
        .await
        .unwrap();
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn release_tolerates_manual_drop() {
        let dir = tempfile::tempdir().unwrap();
        let server = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database(dir.path().to_string_lossy());

        let scratch = ScratchDatabase::acquire(&server).await.unwrap();
        std::fs::remove_file(scratch.descriptor().sqlite_path().unwrap()).unwrap();
        scratch.release().await.unwrap();
    }

    #[tokio::test]
    async fn acquire_then_release_leaves_directory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.db"), b"").unwrap();
        let server = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database(dir.path().to_string_lossy());

        let listing = || {
            let mut names: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };

        let before = listing();
        ScratchDatabase::acquire(&server).await.unwrap().release().await.unwrap();
        assert_eq!(listing(), before);
    }

    #[tokio::test]
    async fn concurrent_acquisitions_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let server = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database(dir.path().to_string_lossy());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let server = server.clone();
                tokio::spawn(async move { ScratchDatabase::acquire(&server).await })
            })
            .collect();

        let mut names = HashSet::new();
        for handle in handles {
            let scratch = handle.await.unwrap().unwrap();
            assert!(names.insert(scratch.name().to_owned()));
            scratch.release().await.unwrap();
        }
        assert_eq!(names.len(), 16);
    }

    #[tokio::test]
    async fn scoped_helper_hands_out_a_usable_database() {
        let dir = tempfile::tempdir().unwrap();
        let server = ConnectionDescriptor::new(Dialect::Sqlite)
            .with_database(dir.path().to_string_lossy());

        let path = with_scratch_database(&server, |db| async move {
            let mut conn = session::connect(&db).await?;
            session::raw_execute(&mut conn, "CREATE TABLE t (id INTEGER)").await?;
            Ok::<_, SqlbagError>(db.sqlite_path())
        })
        .await
        .unwrap()
        .unwrap();

        assert!(!path.exists());
    }
}
