//! # sqlbag-pg
//!
//! PostgreSQL-only helpers that sit next to `sqlbag`:
//!
//! - [`errcodes`]: SQLSTATE code to condition name lookups, and pulling the
//!   code out of a failed query.
//! - [`interval`]: [`RelativeDelta`], a calendar-aware interval that parses
//!   PostgreSQL's interval output and converts to and from `PgInterval`.
//! - [`datetimes`]: `chrono` conveniences for timestamps.

pub mod datetimes;
pub mod errcodes;
pub mod error;
pub mod interval;

pub use datetimes::{
    combine_date_and_time, combine_date_and_time_utc, localnow, naive, parse_time_of_day, utcnow,
    vanilla,
};
pub use errcodes::{
    errorcode_from_error, errorcode_from_sqlbag, pg_errorcode_lookup, pg_errorname_lookup,
};
pub use error::{PgError, PgResult};
pub use interval::{RelativeDelta, parse_interval_values};
