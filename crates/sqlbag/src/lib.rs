//! # sqlbag
//!
//! Handy helpers for working with SQL databases from tests and small tools.
//!
//! The centrepiece is the scratch database lifecycle: create a uniquely
//! named database on a PostgreSQL, MySQL or SQLite "server", hand its
//! connection descriptor to a test, and drop it afterwards whatever the test
//! did. Around it sit connection and transaction helpers, `.sql` file
//! loading and a few row utilities.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  scratch   (ScratchDatabase, scoped helper)   │
//! ├──────────────────────────────────────────────┤
//! │  createdrop (exists / create / drop)          │
//! │  admin      (maintenance db, kill sessions)   │
//! ├──────────────────────────────────────────────┤
//! │  session  (connect, pool, Session, tx)        │
//! │  sqlfiles (.sql loading)  record (rows)       │
//! ├──────────────────────────────────────────────┤
//! │  url (ConnectionDescriptor, Dialect)          │
//! │  config (file / env)  logging (tracing)       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use sqlbag::{ConnectionDescriptor, SqlbagError, with_scratch_database};
//!
//! let server = ConnectionDescriptor::parse("postgresql://localhost/postgres")?;
//! with_scratch_database(&server, |db| async move {
//!     let mut conn = sqlbag::connect(&db).await?;
//!     sqlbag::load_sql_from_folder(&mut conn, "schema/").await?;
//!     Ok::<_, SqlbagError>(())
//! })
//! .await?;
//! ```

pub mod admin;
pub mod config;
pub mod createdrop;
pub mod error;
pub mod logging;
pub mod record;
pub mod scratch;
pub mod session;
pub mod sqlfiles;
pub mod url;

// ── re-exports ───────────────────────────────────────────────────────

pub use admin::{admin_connection, kill_other_connections};
pub use config::SqlbagConfig;
pub use createdrop::{
    CreateOptions, can_select, create_database, database_exists, drop_database, temporary_name,
};
pub use error::{SqlbagError, SqlbagResult};
pub use record::{Record, changes, list_tables, table_exists, table_name, table_name_of};
pub use scratch::{
    DatabaseLifecycle, ScratchDatabase, ScratchOptions, ScratchState, ServerLifecycle,
    temporary_database, temporary_database_with, with_scratch_database,
    with_scratch_database_opts,
};
pub use session::{Session, connect, pool, raw_execute, transaction};
pub use sqlfiles::{
    load_sql_from_file, load_sql_from_folder, quoted_identifier, sql_from_file, sql_from_folder,
    sql_from_folder_iter,
};
pub use crate::url::{ConnectionDescriptor, Dialect};
