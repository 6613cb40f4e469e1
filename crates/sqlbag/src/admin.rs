//! Administrative connections: the server's maintenance database, the
//! statements that look up databases, and killing other sessions.

use sqlx::{AnyConnection, Executor, Row};
use tracing::{debug, info};

use crate::config::current_username;
use crate::error::{SqlbagError, SqlbagResult};
use crate::session;
use crate::url::{ConnectionDescriptor, Dialect};

const PG_MAINTENANCE_DB: &str = "postgres";

/// Descriptor for the maintenance database on the same server.
///
/// PostgreSQL targets the `postgres` database, filling in the current OS
/// user when the descriptor has no username. MySQL connects without
/// selecting a schema. SQLite has no server to administer.
pub fn admin_descriptor(descriptor: &ConnectionDescriptor) -> SqlbagResult<ConnectionDescriptor> {
    match descriptor.dialect() {
        Dialect::Postgres => {
            let mut admin = descriptor.clone().with_database(PG_MAINTENANCE_DB);
            if admin.username().is_none() {
                admin = admin.with_username(current_username());
            }
            Ok(admin)
        }
        Dialect::MySql => Ok(descriptor.clone().without_database()),
        Dialect::Sqlite => Err(unsupported("admin connection", Dialect::Sqlite)),
    }
}

/// Open a connection suitable for `CREATE DATABASE` / `DROP DATABASE`.
///
/// MySQL sessions are switched to `ANSI` mode so double-quoted identifiers
/// work the same way they do on PostgreSQL.
pub async fn admin_connection(descriptor: &ConnectionDescriptor) -> SqlbagResult<AnyConnection> {
    let admin = admin_descriptor(descriptor)?;
    let mut conn = session::connect(&admin).await?;

    if admin.dialect() == Dialect::MySql {
        conn.execute("SET sql_mode = 'ANSI'").await?;
    }

    debug!(target = %admin, "admin connection ready");
    Ok(conn)
}

/// Whether a database called `name` exists on the server `conn` is attached to.
pub async fn database_exists_on(
    conn: &mut AnyConnection,
    dialect: Dialect,
    name: &str,
) -> SqlbagResult<bool> {
    let sql = match dialect {
        Dialect::Postgres => "SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1",
        Dialect::MySql => {
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name = ?"
        }
        Dialect::Sqlite => return Err(unsupported("database lookup", dialect)),
    };

    let row = sqlx::query(sql).bind(name).fetch_optional(&mut *conn).await?;
    Ok(row.is_some())
}

/// Build the statement that selects (MySQL) or terminates (PostgreSQL)
/// other sessions, optionally restricted to one database.
///
/// Without `hardkill` only idle sessions are targeted. When `dbname` is
/// given the statement takes it as its single bind parameter.
pub fn kill_query(dialect: Dialect, dbname: Option<&str>, hardkill: bool) -> SqlbagResult<String> {
    let (base, idle, by_db) = match dialect {
        Dialect::Postgres => (
            "SELECT pg_terminate_backend(psa.pid) AS terminated \
             FROM pg_catalog.pg_stat_activity psa \
             WHERE psa.pid <> pg_backend_pid()",
            "psa.state = 'idle'",
            "psa.datname = $1",
        ),
        Dialect::MySql => (
            "SELECT CAST(ID AS SIGNED) AS process_id \
             FROM information_schema.PROCESSLIST \
             WHERE ID <> CONNECTION_ID()",
            "COMMAND = 'Sleep'",
            "DB = ?",
        ),
        Dialect::Sqlite => return Err(unsupported("kill_other_connections", dialect)),
    };

    let mut sql = base.to_owned();
    if !hardkill {
        sql.push_str(" AND ");
        sql.push_str(idle);
    }
    if dbname.is_some() {
        sql.push_str(" AND ");
        sql.push_str(by_db);
    }
    Ok(sql)
}

/// Terminate other sessions on the server, optionally only those attached
/// to `dbname`. Returns how many sessions were targeted.
pub async fn kill_other_connections(
    conn: &mut AnyConnection,
    dialect: Dialect,
    dbname: Option<&str>,
    hardkill: bool,
) -> SqlbagResult<usize> {
    let sql = kill_query(dialect, dbname, hardkill)?;
    let mut query = sqlx::query(&sql);
    if let Some(name) = dbname {
        query = query.bind(name);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    if dialect == Dialect::MySql {
        for row in &rows {
            let id: i64 = row.try_get("process_id")?;
            match session::raw_execute(&mut *conn, &format!("KILL CONNECTION {id}")).await {
                Ok(_) => {}
                // The session ended between listing and killing it.
                Err(e) if e.to_string().contains("Unknown thread id") => {
                    debug!(process_id = id, "session already gone");
                }
                Err(e) => return Err(e),
            }
        }
    }

    if !rows.is_empty() {
        info!(count = rows.len(), database = dbname.unwrap_or("*"), "killed other connections");
    }
    Ok(rows.len())
}

fn unsupported(operation: &'static str, dialect: Dialect) -> SqlbagError {
    SqlbagError::Unsupported {
        operation,
        dialect: dialect.name(),
    }
}

// ── tests ────────────────────────────────────────────────────────────
