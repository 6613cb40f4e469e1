//! Creating, dropping and probing whole databases.
//!
//! Server dialects go through an admin connection (see [`crate::admin`]).
//! SQLite databases are plain files, so "create" and "drop" are file
//! operations and an in-memory descriptor always exists and can never be
//! created or dropped.

use std::io;

use sqlx::{AnyConnection, Connection, Executor};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::admin::{admin_connection, database_exists_on, kill_other_connections};
use crate::error::{SqlbagError, SqlbagResult};
use crate::session::{self, raw_execute};
use crate::sqlfiles::quoted_identifier;
use crate::url::{ConnectionDescriptor, Dialect};

/// Prefix used for scratch database names unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "sqlbag_tmp_";

/// Options for [`create_database`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// PostgreSQL template database to copy from.
    pub template: Option<String>,
    /// Drop any existing database of the same name first.
    pub wipe_if_existing: bool,
}

/// A fresh database name: `prefix` followed by 32 random hex digits.
pub fn temporary_name(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

/// Whether the database `descriptor` names exists.
pub async fn database_exists(descriptor: &ConnectionDescriptor) -> SqlbagResult<bool> {
    if descriptor.dialect() == Dialect::Sqlite {
        return match descriptor.sqlite_path() {
            None => Ok(true),
            Some(path) => Ok(tokio::fs::try_exists(&path).await?),
        };
    }

    let name = target_name(descriptor)?;
    let mut conn = admin_connection(descriptor).await?;
    let exists = database_exists_on(&mut conn, descriptor.dialect(), name).await?;
    conn.close().await?;
    Ok(exists)
}

/// Whether a connection to the database can be opened and `select 1` runs.
///
/// Any failure, including an unreachable server, yields `false`.
pub async fn can_select(descriptor: &ConnectionDescriptor) -> bool {
    let mut conn = match session::connect(descriptor).await {
        Ok(conn) => conn,
        Err(e) => {
            debug!(target = %descriptor, error = %e, "cannot connect");
            return false;
        }
    };
    let ok = conn.execute("select 1").await.is_ok();
    let _ = conn.close().await;
    ok
}

/// Create the database `descriptor` names.
///
/// Returns `false` if it already existed (after the optional wipe) and
/// `true` if it was created.
pub async fn create_database(
    descriptor: &ConnectionDescriptor,
    options: &CreateOptions,
) -> SqlbagResult<bool> {
    if options.wipe_if_existing {
        drop_database(descriptor).await?;
    }

    if descriptor.dialect() == Dialect::Sqlite {
        let Some(path) = descriptor.sqlite_path() else {
            return Ok(false);
        };
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        return match created {
            Ok(_) => {
                info!(path = %path.display(), "created sqlite database");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(SqlbagError::Creation {
                name: path.display().to_string(),
                reason: e.to_string(),
            }),
        };
    }

    let dialect = descriptor.dialect();
    let name = target_name(descriptor)?;
    let mut conn = admin_connection(descriptor).await?;
    if database_exists_on(&mut conn, dialect, name).await? {
        conn.close().await?;
        return Ok(false);
    }

    let mut sql = format!("CREATE DATABASE {}", quoted_identifier(name));
    if let (Dialect::Postgres, Some(template)) = (dialect, &options.template) {
        sql.push_str(&format!(" TEMPLATE {}", quoted_identifier(template)));
    }

    conn.execute(sql.as_str())
        .await
        .map_err(|e| SqlbagError::Creation {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;
    // The database exists now; a failed close must not hide that.
    if let Err(e) = conn.close().await {
        warn!(database = name, error = %e, "closing admin connection failed");
    }

    info!(database = name, %dialect, "created database");
    Ok(true)
}

/// Drop the database `descriptor` names.
///
/// Returns `false` if there was nothing to drop. Other sessions attached to
/// the database are terminated first. Failures after the database was found
/// surface as [`SqlbagError::Teardown`].
pub async fn drop_database(descriptor: &ConnectionDescriptor) -> SqlbagResult<bool> {
    if descriptor.dialect() == Dialect::Sqlite {
        let Some(path) = descriptor.sqlite_path() else {
            return Ok(false);
        };
        let name = path.display().to_string();
        let removed = remove_if_present(&path).await.map_err(|e| teardown(&name, e))?;
        for suffix in ["-wal", "-shm", "-journal"] {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            remove_if_present(sidecar.as_ref()).await.map_err(|e| teardown(&name, e))?;
        }
        if removed {
            info!(path = %path.display(), "dropped sqlite database");
        }
        return Ok(removed);
    }

    let dialect = descriptor.dialect();
    let name = target_name(descriptor)?;
    let mut conn = admin_connection(descriptor).await?;
    if !database_exists_on(&mut conn, dialect, name).await? {
        conn.close().await?;
        return Ok(false);
    }

    let dropped = drop_on(&mut conn, dialect, name).await;
    let _ = conn.close().await;
    match dropped {
        Ok(()) => {
            info!(database = name, %dialect, "dropped database");
            Ok(true)
        }
        // Someone else dropped it between the lookup and now.
        Err(e) if is_missing_database(&e) => Ok(false),
        Err(e) => Err(teardown(name, e)),
    }
}

async fn drop_on(conn: &mut AnyConnection, dialect: Dialect, name: &str) -> SqlbagResult<()> {
    let quoted = quoted_identifier(name);
    if dialect == Dialect::Postgres {
        raw_execute(&mut *conn, &format!("REVOKE CONNECT ON DATABASE {quoted} FROM PUBLIC")).await?;
    }

    kill_other_connections(&mut *conn, dialect, Some(name), true).await?;
    raw_execute(&mut *conn, &format!("DROP DATABASE IF EXISTS {quoted}")).await?;
    Ok(())
}

/// PostgreSQL `invalid_catalog_name` or MySQL "Unknown database".
fn is_missing_database(err: &SqlbagError) -> bool {
    let SqlbagError::Query(inner) = err else {
        return false;
    };
    match inner.as_database_error() {
        Some(db) => {
            db.code().as_deref() == Some("3D000") || db.message().contains("Unknown database")
        }
        None => false,
    }
}

async fn remove_if_present(path: &std::path::Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn target_name(descriptor: &ConnectionDescriptor) -> SqlbagResult<&str> {
    descriptor.database().ok_or_else(|| SqlbagError::InvalidUrl {
        url: descriptor.redacted(),
        reason: "no database name".to_owned(),
    })
}

fn teardown(name: &str, err: impl std::fmt::Display) -> SqlbagError {
    SqlbagError::Teardown {
        name: name.to_owned(),
        reason: err.to_string(),
    }
}

// ── tests ────────────────────────────────────────────────────────────
