//! Calendar-aware intervals.
//!
//! [`RelativeDelta`] keeps years, months and days apart from the clock
//! fields, the way PostgreSQL's `interval` does, so "1 month" stays one
//! month instead of becoming 30 days. It parses PostgreSQL's default
//! (`postgres` style) interval output and renders back to text PostgreSQL
//! accepts as interval input.

use std::fmt;
use std::str::FromStr;

use sqlx::postgres::types::PgInterval;
use tracing::debug;

use crate::error::{PgError, PgResult};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

/// An interval split into calendar and clock fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RelativeDelta {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub microseconds: i64,
}

impl RelativeDelta {
    /// Add `weeks` seven-day weeks to the day count, saturating at the
    /// bounds of `i32`.
    pub fn with_weeks(mut self, weeks: i32) -> Self {
        self.days = self.days.saturating_add(weeks.saturating_mul(7));
        self
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Convert to the wire representation `sqlx` binds for `interval`.
    pub fn to_pg_interval(&self) -> PgResult<PgInterval> {
        let months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or(PgError::Overflow("interval months"))?;

        let microseconds = self
            .hours
            .checked_mul(MICROS_PER_HOUR)
            .and_then(|us| us.checked_add(self.minutes.checked_mul(MICROS_PER_MINUTE)?))
            .and_then(|us| us.checked_add(self.seconds.checked_mul(MICROS_PER_SECOND)?))
            .and_then(|us| us.checked_add(self.microseconds))
            .ok_or(PgError::Overflow("interval microseconds"))?;

        Ok(PgInterval {
            months,
            days: self.days,
            microseconds,
        })
    }
}

impl From<PgInterval> for RelativeDelta {
    fn from(iv: PgInterval) -> Self {
        let mut rest = iv.microseconds;
        let hours = rest / MICROS_PER_HOUR;
        rest %= MICROS_PER_HOUR;
        let minutes = rest / MICROS_PER_MINUTE;
        rest %= MICROS_PER_MINUTE;
        let seconds = rest / MICROS_PER_SECOND;
        rest %= MICROS_PER_SECOND;

        Self {
            years: iv.months / 12,
            months: iv.months % 12,
            days: iv.days,
            hours,
            minutes,
            seconds,
            microseconds: rest,
        }
    }
}

impl TryFrom<RelativeDelta> for PgInterval {
    type Error = PgError;

    fn try_from(delta: RelativeDelta) -> PgResult<Self> {
        delta.to_pg_interval()
    }
}

/// Renders the non-zero fields in order, e.g. `7 months 47 days`. A zero
/// delta renders as `0 seconds`. The output is valid PostgreSQL interval
/// input.
impl fmt::Display for RelativeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            (i64::from(self.years), "years"),
            (i64::from(self.months), "months"),
            (i64::from(self.days), "days"),
            (self.hours, "hours"),
            (self.minutes, "minutes"),
            (self.seconds, "seconds"),
            (self.microseconds, "microseconds"),
        ];

        let mut first = true;
        for (value, unit) in fields.iter().filter(|(v, _)| *v != 0) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{value} {unit}")?;
            first = false;
        }
        if first {
            f.write_str("0 seconds")?;
        }
        Ok(())
    }
}

impl FromStr for RelativeDelta {
    type Err = PgError;

    fn from_str(s: &str) -> PgResult<Self> {
        parse_interval_values(s)
    }
}

/// Parse PostgreSQL `postgres`-style interval output.
///
/// Accepts `<n> <unit>` pairs (`year`, `mon`, `day`, `hour`, `min`, `sec`,
/// singular or plural, plus `week`) and a `[+-]HH:MM[:SS[.ffffff]]` clock
/// part. A sign on the clock part applies to all of its fields.
///
/// ```ignore
/// let d = parse_interval_values("-1 year -2 mons +3 days -04:05:06.2")?;
/// assert_eq!((d.years, d.months, d.days, d.hours), (-1, -2, 3, -4));
/// ```
pub fn parse_interval_values(text: &str) -> PgResult<RelativeDelta> {
    let mut delta = RelativeDelta::default();
    let mut tokens = text.split_whitespace();

    while let Some(token) = tokens.next() {
        if token.contains(':') {
            parse_clock(token, &mut delta).map_err(|reason| invalid(text, reason))?;
            continue;
        }

        let value: i64 = token
            .parse()
            .map_err(|_| invalid(text, format!("`{token}` is not a number")))?;
        let unit = tokens
            .next()
            .ok_or_else(|| invalid(text, format!("missing unit after `{token}`")))?;

        // Repeated units add up: "1 week 2 days" is nine days.
        match unit.to_ascii_lowercase().trim_end_matches('s') {
            "year" => add_narrow(&mut delta.years, value)?,
            "mon" | "month" => add_narrow(&mut delta.months, value)?,
            "week" => add_narrow(
                &mut delta.days,
                value.checked_mul(7).ok_or(PgError::Overflow("interval days"))?,
            )?,
            "day" => add_narrow(&mut delta.days, value)?,
            "hour" => add_wide(&mut delta.hours, value)?,
            "min" | "minute" => add_wide(&mut delta.minutes, value)?,
            "sec" | "second" => add_wide(&mut delta.seconds, value)?,
            "microsecond" => add_wide(&mut delta.microseconds, value)?,
            other => {
                debug!(unit = other, input = text, "unrecognised interval unit");
                return Err(invalid(text, format!("unknown unit `{unit}`")));
            }
        }
    }

    Ok(delta)
}

fn parse_clock(token: &str, delta: &mut RelativeDelta) -> Result<(), String> {
    let (sign, body) = match token.as_bytes().first() {
        Some(b'-') => (-1, &token[1..]),
        Some(b'+') => (1, &token[1..]),
        _ => (1, token),
    };

    let mut parts = body.split(':');
    let number = |part: Option<&str>| -> Result<i64, String> {
        part.unwrap_or("0")
            .parse()
            .map_err(|_| format!("bad clock value `{token}`"))
    };
    let hours = number(parts.next())?;
    let minutes = number(parts.next())?;
    let (seconds, micros) = match parts.next() {
        Some(sec) => match sec.split_once('.') {
            Some((whole, frac)) => (number(Some(whole))?, fraction_to_micros(frac, token)?),
            None => (number(Some(sec))?, 0),
        },
        None => (0, 0),
    };
    if parts.next().is_some() {
        return Err(format!("bad clock value `{token}`"));
    }

    let add_signed = |field: &mut i64, value: i64| -> Result<(), String> {
        value
            .checked_mul(sign)
            .ok_or(PgError::Overflow("interval field"))
            .and_then(|v| add_wide(field, v))
            .map_err(|_| format!("clock value `{token}` overflows"))
    };
    add_signed(&mut delta.hours, hours)?;
    add_signed(&mut delta.minutes, minutes)?;
    add_signed(&mut delta.seconds, seconds)?;
    add_signed(&mut delta.microseconds, micros)?;
    Ok(())
}

fn add_narrow(field: &mut i32, value: i64) -> PgResult<()> {
    let value = i32::try_from(value).map_err(|_| PgError::Overflow("interval field"))?;
    *field = field
        .checked_add(value)
        .ok_or(PgError::Overflow("interval field"))?;
    Ok(())
}

fn add_wide(field: &mut i64, value: i64) -> PgResult<()> {
    *field = field
        .checked_add(value)
        .ok_or(PgError::Overflow("interval field"))?;
    Ok(())
}

/// `"2"` → 200000, `"000001"` → 1. Digits past the sixth are dropped.
fn fraction_to_micros(frac: &str, token: &str) -> Result<i64, String> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("bad fractional seconds in `{token}`"));
    }
    let mut digits: String = frac.chars().take(6).collect();
    while digits.len() < 6 {
        digits.push('0');
    }
    digits.parse().map_err(|_| format!("bad fractional seconds in `{token}`"))
}

fn invalid(input: &str, reason: impl Into<String>) -> PgError {
    PgError::InvalidInterval {
        input: input.to_owned(),
        reason: reason.into(),
    }
}

// ── tests ────────────────────────────────────────────────────────────
