//! Reading `.sql` files and folders, and running them against a connection.

use std::io;
use std::path::{Path, PathBuf};

use sqlx::AnyConnection;
use tracing::{error, info};

use crate::error::{SqlbagError, SqlbagResult};
use crate::session::raw_execute;

/// Double-quote an SQL identifier, escaping embedded quotes.
pub fn quoted_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Read a SQL file, trimmed of surrounding whitespace.
pub fn sql_from_file(path: impl AsRef<Path>) -> SqlbagResult<String> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SqlbagError::SqlFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.trim().to_owned())
}

/// Every `*.sql` file below `folder`, recursively, sorted by path.
pub fn sql_files(folder: impl AsRef<Path>) -> SqlbagResult<Vec<PathBuf>> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(SqlbagError::SqlFile {
            path: folder.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }

    let mut files = Vec::new();
    let mut pending = vec![folder.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "sql") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Lazily reads each file from [`sql_files`], skipping empty ones.
pub struct SqlFolderIter {
    files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for SqlFolderIter {
    type Item = SqlbagResult<(PathBuf, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.files.next()?;
            match sql_from_file(&path) {
                Ok(sql) if sql.is_empty() => continue,
                Ok(sql) => return Some(Ok((path, sql))),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Iterate `(path, sql)` pairs for the non-empty `.sql` files in `folder`.
pub fn sql_from_folder_iter(folder: impl AsRef<Path>) -> SqlbagResult<SqlFolderIter> {
    Ok(SqlFolderIter {
        files: sql_files(folder)?.into_iter(),
    })
}

/// The contents of every non-empty `.sql` file in `folder`, in path order.
pub fn sql_from_folder(folder: impl AsRef<Path>) -> SqlbagResult<Vec<String>> {
    sql_from_folder_iter(folder)?
        .map(|item| item.map(|(_, sql)| sql))
        .collect()
}

/// Execute one SQL file. Returns the SQL that was run (empty files are
/// read but not executed).
pub async fn load_sql_from_file(
    conn: &mut AnyConnection,
    path: impl AsRef<Path>,
) -> SqlbagResult<String> {
    let path = path.as_ref();
    let sql = sql_from_file(path)?;
    if !sql.is_empty() {
        raw_execute(&mut *conn, &sql).await.inspect_err(|e| {
            error!(path = %path.display(), error = %e, "sql file failed");
        })?;
    }
    Ok(sql)
}

/// Execute every `.sql` file in `folder`, in path order. Returns the number
/// of files run.
pub async fn load_sql_from_folder(
    conn: &mut AnyConnection,
    folder: impl AsRef<Path>,
) -> SqlbagResult<usize> {
    let folder = folder.as_ref();
    info!(folder = %folder.display(), "running sql files");

    let mut count = 0;
    for item in sql_from_folder_iter(folder)? {
        let (path, sql) = item?;
        info!(path = %path.display(), "running sql file");
        raw_execute(&mut *conn, &sql).await.inspect_err(|e| {
            error!(path = %path.display(), error = %e, "sql file failed");
        })?;
        count += 1;
    }
    Ok(count)
}

// ── tests ────────────────────────────────────────────────────────────
