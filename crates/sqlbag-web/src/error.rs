//! Error types for the sqlbag-web crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sqlbag::SqlbagError;
use thiserror::Error;
use tracing::error;

/// Alias for `Result<T, WebError>`.
pub type WebResult<T> = Result<T, WebError>;

#[derive(Debug, Error)]
pub enum WebError {
    /// No session factory is registered under this name.
    #[error("no session registered as `{0}`")]
    UnknownSession(String),

    /// A handler asked for request sessions but the session layer is not
    /// installed on its router.
    #[error("request sessions are not available: session layer missing")]
    MissingLayer,

    #[error(transparent)]
    Database(#[from] SqlbagError),
}

impl From<sqlx::Error> for WebError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(SqlbagError::Query(err))
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
