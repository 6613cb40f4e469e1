//! Error types for the sqlbag-pg crate.

use thiserror::Error;

/// Alias for `Result<T, PgError>`.
pub type PgResult<T> = Result<T, PgError>;

#[derive(Debug, Error)]
pub enum PgError {
    /// Interval text that is not in PostgreSQL's output format.
    #[error("invalid interval `{input}`: {reason}")]
    InvalidInterval { input: String, reason: String },

    /// A time of day or timestamp that could not be parsed.
    #[error("invalid time `{0}`")]
    InvalidTime(String),

    /// A local date and time that does not exist, or exists twice, in the
    /// requested time zone.
    #[error("local time {0} is ambiguous or does not exist in the requested zone")]
    LocalTime(String),

    /// A value does not fit the target representation.
    #[error("{0} overflows")]
    Overflow(&'static str),
}
