//! Connections, pools and scoped transactional sessions.
//!
//! Everything here talks through the `sqlx` [`Any`] driver so one code path
//! serves PostgreSQL, MySQL and SQLite. The drivers are installed lazily on
//! first use.

use futures::future::BoxFuture;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyConnection, AnyPool, Connection, Executor, Transaction};
use tracing::{debug, warn};

use crate::error::{SqlbagError, SqlbagResult};
use crate::url::ConnectionDescriptor;

/// Open a single connection to the database `descriptor` points at.
///
/// Failures to reach or authenticate against the server surface as
/// [`SqlbagError::Connection`].
pub async fn connect(descriptor: &ConnectionDescriptor) -> SqlbagResult<AnyConnection> {
    sqlx::any::install_default_drivers();
    debug!(target = %descriptor, "opening connection");

    <AnyConnection as Connection>::connect(&descriptor.to_url())
        .await
        .map_err(|source| SqlbagError::Connection {
            target: descriptor.redacted(),
            source,
        })
}

/// Open a connection pool with at most `max_connections` connections.
pub async fn pool(descriptor: &ConnectionDescriptor, max_connections: u32) -> SqlbagResult<AnyPool> {
    sqlx::any::install_default_drivers();
    debug!(target = %descriptor, max_connections, "opening pool");

    AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(&descriptor.to_url())
        .await
        .map_err(|source| SqlbagError::Connection {
            target: descriptor.redacted(),
            source,
        })
}

/// Execute SQL text without parameters and return the affected row count.
///
/// The text is sent unprepared, so it may hold several `;`-separated
/// statements (schema files, DDL that cannot be prepared).
pub async fn raw_execute<'c, E>(executor: E, sql: &str) -> SqlbagResult<u64>
where
    E: Executor<'c, Database = Any>,
{
    let result = executor.execute(sql).await?;
    Ok(result.rows_affected())
}

/// A transaction borrowed from a pool.
///
/// Call [`Session::commit`] or [`Session::rollback`] to finish it. A session
/// dropped without either is rolled back.
pub struct Session {
    pool: AnyPool,
    tx: Transaction<'static, Any>,
}

impl Session {
    /// Begin a new transaction on `pool`.
    pub async fn begin(pool: &AnyPool) -> SqlbagResult<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            pool: pool.clone(),
            tx,
        })
    }

    /// Open a single-connection pool for `descriptor` and begin on it.
    pub async fn open(descriptor: &ConnectionDescriptor) -> SqlbagResult<Self> {
        let pool = pool(descriptor, 1).await?;
        Self::begin(&pool).await
    }

    /// The pool this session was started from.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The transaction's connection, for use as a `sqlx` executor.
    pub fn connection(&mut self) -> &mut AnyConnection {
        &mut self.tx
    }

    /// Execute unprepared SQL text inside the transaction.
    pub async fn execute(&mut self, sql: &str) -> SqlbagResult<u64> {
        raw_execute(&mut *self.tx, sql).await
    }

    /// Run a query inside the transaction and collect every row.
    pub async fn fetch_all(&mut self, sql: &str) -> SqlbagResult<Vec<AnyRow>> {
        let rows = sqlx::query(sql).fetch_all(&mut *self.tx).await?;
        Ok(rows)
    }

    pub async fn commit(self) -> SqlbagResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> SqlbagResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Run `body` in a fresh transaction against `descriptor`.
///
/// Commits when `body` returns `Ok`, rolls back when it returns `Err`, and
/// always closes the pool afterwards. A failed rollback is logged and the
/// body's error is returned.
///
/// ```ignore
/// let n = sqlbag::transaction(&db, |s| {
///     async move { s.execute("insert into t values (1)").await }.boxed()
/// })
/// .await?;
/// ```
pub async fn transaction<T, E, F>(descriptor: &ConnectionDescriptor, body: F) -> Result<T, E>
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<SqlbagError>,
{
    let pool = pool(descriptor, 1).await?;
    let mut session = Session::begin(&pool).await?;

    let outcome = body(&mut session).await;
    let finished = match outcome {
        Ok(_) => session.commit().await,
        Err(_) => session.rollback().await,
    };
    pool.close().await;

    match outcome {
        Ok(value) => {
            finished?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = finished {
                warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
