//! Configuration: where the database servers are and how scratch databases
//! are named and kept.
//!
//! Settings come from a TOML/JSON file ([`SqlbagConfig::load`]) or from the
//! environment ([`SqlbagConfig::from_env`]), using the same variables the
//! PostgreSQL and MySQL command-line clients read (`PGHOST`, `PGUSER`,
//! `MYSQL_UNIX_PORT`, ...).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::createdrop::DEFAULT_PREFIX;
use crate::error::{SqlbagError, SqlbagResult};
use crate::scratch::ScratchOptions;
use crate::url::{ConnectionDescriptor, Dialect};

/// Connection defaults for one kind of server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerDefaults {
    /// Host name, or a Unix socket directory/path when it starts with `/`.
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

/// Scratch database naming and retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    pub prefix: String,
    /// Leave scratch databases in place after release, for debugging.
    pub keep: bool,
    /// PostgreSQL template database for new scratch databases.
    pub template: Option<String>,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            keep: false,
            template: None,
        }
    }
}

/// Top-level sqlbag configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlbagConfig {
    /// Dialect used when a caller does not name one.
    pub dialect: Dialect,
    pub postgres: ServerDefaults,
    pub mysql: ServerDefaults,
    /// Directory for SQLite scratch files; the system temp dir if unset.
    pub sqlite_dir: Option<PathBuf>,
    pub scratch: ScratchConfig,
}

impl Default for SqlbagConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            postgres: ServerDefaults::default(),
            mysql: ServerDefaults::default(),
            sqlite_dir: None,
            scratch: ScratchConfig::default(),
        }
    }
}

impl SqlbagConfig {
    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// A missing file is not an error: defaults are returned.
    pub fn load(path: impl AsRef<Path>) -> SqlbagResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SqlbagError::Config(format!("failed to read {}: {e}", path.display())))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        info!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    /// Build configuration from the process environment, after loading a
    /// `.env` file from the working directory if one exists.
    pub fn from_env() -> SqlbagResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SqlbagResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = |key: &str| -> SqlbagResult<Option<u16>> {
            lookup(key)
                .map(|v| {
                    v.parse()
                        .map_err(|_| SqlbagError::Config(format!("{key} is not a port: {v}")))
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(dialect) = lookup("SQLBAG_DIALECT") {
            config.dialect = dialect.parse()?;
        }

        config.postgres = ServerDefaults {
            host: lookup("PGHOST"),
            port: port("PGPORT")?,
            username: lookup("PGUSER"),
            password: lookup("PGPASSWORD"),
            database: lookup("PGDATABASE"),
        };

        config.mysql = ServerDefaults {
            host: lookup("MYSQL_UNIX_PORT").or_else(|| lookup("MYSQL_HOST")),
            port: port("MYSQL_TCP_PORT")?,
            username: lookup("MYSQL_USER"),
            password: lookup("MYSQL_PWD"),
            database: None,
        };

        config.sqlite_dir = lookup("SQLBAG_SQLITE_DIR").map(PathBuf::from);

        if let Some(prefix) = lookup("SQLBAG_TMP_PREFIX") {
            config.scratch.prefix = prefix;
        }
        if let Some(keep) = lookup("SQLBAG_KEEP_DATABASES") {
            config.scratch.keep = matches!(keep.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        config.scratch.template = lookup("SQLBAG_TEMPLATE");

        Ok(config)
    }

    /// Server descriptor for `dialect`, with defaults filled in.
    ///
    /// PostgreSQL: `localhost:5432`, the configured user or the OS user,
    /// database `postgres`. MySQL: `localhost:3306`, user `root`. SQLite:
    /// the scratch directory, or an in-memory descriptor.
    pub fn descriptor(&self, dialect: Dialect) -> ConnectionDescriptor {
        match dialect {
            Dialect::Postgres => {
                let d = &self.postgres;
                server_descriptor(
                    dialect,
                    d,
                    d.username.clone().unwrap_or_else(current_username),
                    Some(d.database.clone().unwrap_or_else(|| "postgres".to_owned())),
                )
            }
            Dialect::MySql => {
                let d = &self.mysql;
                server_descriptor(
                    dialect,
                    d,
                    d.username.clone().unwrap_or_else(|| "root".to_owned()),
                    d.database.clone(),
                )
            }
            Dialect::Sqlite => {
                let base = ConnectionDescriptor::new(Dialect::Sqlite);
                match &self.sqlite_dir {
                    Some(dir) => base.with_database(dir.to_string_lossy()),
                    None => base,
                }
            }
        }
    }

    /// Scratch options derived from the `scratch` section.
    pub fn scratch_options(&self) -> ScratchOptions {
        ScratchOptions {
            prefix: self.scratch.prefix.clone(),
            keep: self.scratch.keep,
            template: self.scratch.template.clone(),
        }
    }
}

fn server_descriptor(
    dialect: Dialect,
    defaults: &ServerDefaults,
    username: String,
    database: Option<String>,
) -> ConnectionDescriptor {
    let mut d = ConnectionDescriptor::new(dialect)
        .with_host(defaults.host.clone().unwrap_or_else(|| "localhost".to_owned()))
        .with_username(username);

    // Socket paths carry no port for MySQL.
    let socket = defaults.host.as_deref().is_some_and(|h| h.starts_with('/'));
    if !(socket && dialect == Dialect::MySql) {
        if let Some(port) = defaults.port.or_else(|| dialect.default_port()) {
            d = d.with_port(port);
        }
    }
    if let Some(password) = &defaults.password {
        d = d.with_password(password.clone());
    }
    if let Some(database) = database {
        d = d.with_database(database);
    }
    d
}

/// The login name of the current OS user, or `postgres` if unknown.
pub fn current_username() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "postgres".to_owned())
}

// ── tests ────────────────────────────────────────────────────────────
