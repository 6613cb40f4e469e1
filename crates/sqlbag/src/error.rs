//! Error types for the sqlbag crate.
//!
//! All public operations return [`SqlbagError`] via [`SqlbagResult`].
//! The three scratch-database lifecycle failures get their own variants
//! ([`SqlbagError::Connection`], [`SqlbagError::Creation`] and
//! [`SqlbagError::Teardown`]) so test harnesses can tell a broken server
//! apart from a failed cleanup.

use std::path::PathBuf;

use thiserror::Error;

/// Alias for `Result<T, SqlbagError>`.
pub type SqlbagResult<T> = Result<T, SqlbagError>;

/// Errors that can occur while working with databases.
#[derive(Debug, Error)]
pub enum SqlbagError {
    /// The server is unreachable or rejected the credentials.
    #[error("cannot connect to {target}: {source}")]
    Connection {
        /// Redacted URL of the server that was contacted.
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// The database could not be created.
    #[error("cannot create database {name}: {reason}")]
    Creation { name: String, reason: String },

    /// The database could not be dropped during release.
    #[error("cannot drop database {name}: {reason}")]
    Teardown { name: String, reason: String },

    /// A connection URL could not be parsed.
    #[error("invalid database url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL scheme does not name a supported dialect.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// The operation is not available for this dialect.
    #[error("{operation} is not supported for {dialect}")]
    Unsupported {
        operation: &'static str,
        dialect: &'static str,
    },

    /// A statement failed on an already-open connection.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading a `.sql` file failed.
    #[error("cannot read sql file {}: {source}", path.display())]
    SqlFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SqlbagError {
    /// Returns `true` for failures raised while dropping a database.
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Teardown { .. })
    }
}

impl From<toml::de::Error> for SqlbagError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SqlbagError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
