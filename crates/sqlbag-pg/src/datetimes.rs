//! Small `chrono` helpers for moving timestamps in and out of PostgreSQL.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{PgError, PgResult};

/// The current time in UTC.
pub fn utcnow() -> DateTime<Utc> {
    Utc::now()
}

/// The current time in the local zone.
pub fn localnow() -> DateTime<Local> {
    Local::now()
}

/// The same instant expressed in UTC.
pub fn vanilla<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<Utc> {
    dt.with_timezone(&Utc)
}

/// The wall-clock reading of `dt`, without its zone.
pub fn naive<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDateTime {
    dt.naive_local()
}

/// Parse the time of day out of a time or timestamp string.
///
/// Accepts `12:34`, `12:34:56`, `12:34:56.789`, `2015-01-01 12:34:56`,
/// `2015-01-01T12:34:56` and RFC 3339 timestamps with an offset.
pub fn parse_time_of_day(text: &str) -> PgResult<NaiveTime> {
    let text = text.trim();

    for format in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(text, format) {
            return Ok(t);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.time());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.time());
        }
    }

    Err(PgError::InvalidTime(text.to_owned()))
}

/// Combine a date and a time of day into a timestamp in `tz`.
///
/// Fails when the local time is skipped or repeated by a DST transition.
pub fn combine_date_and_time<Tz: TimeZone>(
    date: NaiveDate,
    time: NaiveTime,
    tz: &Tz,
) -> PgResult<DateTime<Tz>> {
    let local = date.and_time(time);
    tz.from_local_datetime(&local)
        .single()
        .ok_or_else(|| PgError::LocalTime(local.to_string()))
}

/// [`combine_date_and_time`] in UTC.
pub fn combine_date_and_time_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Truncate to whole microseconds, the resolution PostgreSQL stores.
pub fn to_pg_precision<Tz: TimeZone>(dt: DateTime<Tz>) -> DateTime<Tz> {
    let micros = dt.nanosecond() / 1_000 * 1_000;
    dt.with_nanosecond(micros).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, FixedOffset};

    use super::*;

    #[test]
    fn now_helpers_agree() {
        let utc = utcnow();
        let local = localnow();
        let diff = (vanilla(&local) - utc).num_seconds().abs();
        assert!(diff < 5);
    }

    #[test]
    fn vanilla_and_naive() {
        let melbourne = FixedOffset::east_opt(11 * 3600).unwrap();
        let t = melbourne.with_ymd_and_hms(2017, 12, 31, 23, 34, 45).unwrap();

        let u = vanilla(&t);
        assert_eq!(u.to_rfc3339(), "2017-12-31T12:34:45+00:00");
        assert_eq!(u, t);

        let n = naive(&t);
        assert_eq!(n.to_string(), "2017-12-31 23:34:45");
        assert_eq!(naive(&u).hour(), 12);
    }

    #[test]
    fn time_of_day_from_many_shapes() {
        let expected = NaiveTime::from_hms_opt(12, 34, 56).unwrap();
        for text in [
            "12:34:56",
            "2015-01-01 12:34:56",
            "2015-01-01T12:34:56",
            "2015-01-01T12:34:56+10:00",
        ] {
            assert_eq!(parse_time_of_day(text).unwrap(), expected, "{text}");
        }
        assert_eq!(parse_time_of_day("12:34:56").unwrap().to_string(), "12:34:56");
        assert_eq!(
            parse_time_of_day("08:15").unwrap(),
            NaiveTime::from_hms_opt(8, 15, 0).unwrap()
        );
        assert!(parse_time_of_day("lunchtime").is_err());
    }

    #[test]
    fn combine_in_utc_and_offset_zones() {
        let d = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        let t = parse_time_of_day("2015-01-01 12:34:56").unwrap();

        let dt = combine_date_and_time(d, t, &Utc).unwrap();
        assert_eq!(dt.to_rfc3339(), "2017-01-01T12:34:56+00:00");
        assert_eq!(combine_date_and_time_utc(d, t), dt);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = combine_date_and_time(d, t, &plus_two).unwrap();
        assert_eq!(shifted.year(), 2017);
        assert_eq!(vanilla(&shifted).hour(), 10);
    }

    #[test]
    fn precision_is_truncated_to_micros() {
        let dt = Utc
            .with_ymd_and_hms(2020, 5, 17, 1, 2, 3)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(to_pg_precision(dt).nanosecond(), 123_456_000);
    }
}
