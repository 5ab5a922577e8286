//! Local time, timezones, and seconds-of-week
//!
//! Time-dependent costing needs the local wall time at each traversed
//! node. The traversal carries epoch seconds plus the accumulated path
//! seconds and rebases them whenever expansion crosses into a different
//! timezone; periodic restrictions are checked against a seconds-of-week
//! value kept normalized modulo the week length.
//!
//! Node records store a timezone as a 1-based index into the `chrono-tz`
//! table; index 0 means the timezone is unknown.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::{Tz, TZ_VARIANTS};

pub const SECONDS_PER_DAY: u32 = 86_400;
pub const SECONDS_PER_WEEK: u32 = 604_800;

/// Second of day used for constrained-flow speeds when a traversal carries
/// no date-time (07:00).
pub const CONSTRAINED_FLOW_SECOND_OF_DAY: u32 = 25_200;

/// First day of the transit schedule epoch; tile creation dates and
/// departure day indices count from here.
const PIVOT_DATE: (i32, u32, u32) = (2014, 1, 1);

/// Resolve a node timezone index. Index 0 is "unknown".
pub fn tz_from_index(index: u32) -> Option<Tz> {
    if index == 0 {
        return None;
    }
    TZ_VARIANTS.get(index as usize - 1).copied()
}

/// Index for a timezone, suitable for storing on a node.
pub fn tz_index_of(tz: Tz) -> u32 {
    TZ_VARIANTS.iter().position(|&t| t == tz).map(|p| p as u32 + 1).unwrap_or(0)
}

/// Parse an ISO local date-time, with or without seconds.
pub fn parse_iso(date_time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(date_time, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Seconds since the Unix epoch of a local date-time in `tz`.
pub fn seconds_since_epoch(date_time: &str, tz: Tz) -> Option<u64> {
    let naive = parse_iso(date_time)?;
    let local = tz.from_local_datetime(&naive).earliest()?;
    let ts = local.timestamp();
    if ts < 0 {
        return None;
    }
    Some(ts as u64)
}

/// Seconds past midnight of a local date-time string.
pub fn seconds_from_midnight(date_time: &str) -> u32 {
    parse_iso(date_time)
        .map(|dt| dt.hour() * 3600 + dt.minute() * 60 + dt.second())
        .unwrap_or(0)
}

/// Day of week of a local date-time string, 0 = Sunday.
pub fn day_of_week(date_time: &str) -> u32 {
    parse_iso(date_time).map(|dt| dt.weekday().num_days_from_sunday()).unwrap_or(0)
}

/// Day-of-week bitmask of a local date-time string, bit 0 = Sunday.
pub fn day_of_week_mask(date_time: &str) -> u8 {
    1u8 << day_of_week(date_time)
}

/// Days between the schedule pivot date and a local date-time.
pub fn days_from_pivot_date(date_time: &str) -> u32 {
    let Some(dt) = parse_iso(date_time) else {
        return 0;
    };
    let Some(pivot) = NaiveDate::from_ymd_opt(PIVOT_DATE.0, PIVOT_DATE.1, PIVOT_DATE.2) else {
        return 0;
    };
    let days = dt.date().signed_duration_since(pivot).num_days();
    days.max(0) as u32
}

/// Signed offset difference in seconds between two timezones at a given
/// instant. Positive when `dest` is ahead of `origin`.
pub fn timezone_diff(epoch_seconds: u64, origin: Tz, dest: Tz) -> i64 {
    let Some(utc) = DateTime::<Utc>::from_timestamp(epoch_seconds as i64, 0) else {
        return 0;
    };
    let naive = utc.naive_utc();
    let origin_offset = origin.offset_from_utc_datetime(&naive).fix().local_minus_utc() as i64;
    let dest_offset = dest.offset_from_utc_datetime(&naive).fix().local_minus_utc() as i64;
    dest_offset - origin_offset
}

/// Wrap a seconds-of-week value into [0, 604800).
pub fn normalize_seconds_of_week(seconds: i64) -> u32 {
    seconds.rem_euclid(i64::from(SECONDS_PER_WEEK)) as u32
}

/// An epoch instant rendered as an ISO local date-time in `tz`.
pub fn iso_in_tz(epoch_seconds: u64, tz: Tz) -> String {
    match DateTime::<Utc>::from_timestamp(epoch_seconds as i64, 0) {
        Some(utc) => utc.with_timezone(&tz).format("%Y-%m-%dT%H:%M").to_string(),
        None => String::new(),
    }
}

/// The current wall time in `tz` as an ISO local date-time.
pub fn current_iso(tz: Tz) -> String {
    Utc::now().with_timezone(&tz).format("%Y-%m-%dT%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_variants() {
        assert!(parse_iso("2024-06-01T08:30").is_some());
        assert!(parse_iso("2024-06-01T08:30:15").is_some());
        assert!(parse_iso("June 1st").is_none());
    }

    #[test]
    fn test_seconds_from_midnight() {
        assert_eq!(seconds_from_midnight("2024-06-01T08:30"), 8 * 3600 + 30 * 60);
        assert_eq!(seconds_from_midnight("garbage"), 0);
    }

    #[test]
    fn test_day_of_week() {
        // 2024-06-02 is a Sunday.
        assert_eq!(day_of_week("2024-06-02T00:00"), 0);
        assert_eq!(day_of_week("2024-06-03T00:00"), 1);
        assert_eq!(day_of_week_mask("2024-06-02T00:00"), 1);
        assert_eq!(day_of_week_mask("2024-06-07T00:00"), 1 << 5);
    }

    #[test]
    fn test_normalize_seconds_of_week() {
        assert_eq!(normalize_seconds_of_week(0), 0);
        assert_eq!(normalize_seconds_of_week(604_800), 0);
        assert_eq!(normalize_seconds_of_week(-1), 604_799);
        assert_eq!(normalize_seconds_of_week(604_801), 1);
    }

    #[test]
    fn test_timezone_diff() {
        let epoch = seconds_since_epoch("2024-01-15T12:00", chrono_tz::UTC).unwrap();
        // Winter: New York is UTC-5, Berlin UTC+1.
        let diff = timezone_diff(epoch, chrono_tz::America::New_York, chrono_tz::Europe::Berlin);
        assert_eq!(diff, 6 * 3600);
        assert_eq!(
            timezone_diff(epoch, chrono_tz::Europe::Berlin, chrono_tz::America::New_York),
            -6 * 3600
        );
    }

    #[test]
    fn test_tz_index_roundtrip() {
        let idx = tz_index_of(chrono_tz::Europe::Berlin);
        assert!(idx > 0);
        assert_eq!(tz_from_index(idx), Some(chrono_tz::Europe::Berlin));
        assert_eq!(tz_from_index(0), None);
    }

    #[test]
    fn test_days_from_pivot() {
        assert_eq!(days_from_pivot_date("2014-01-01T00:00"), 0);
        assert_eq!(days_from_pivot_date("2014-01-31T12:00"), 30);
    }

    #[test]
    fn test_seconds_since_epoch_in_tz() {
        let utc = seconds_since_epoch("2024-01-15T12:00", chrono_tz::UTC).unwrap();
        let berlin = seconds_since_epoch("2024-01-15T13:00", chrono_tz::Europe::Berlin).unwrap();
        assert_eq!(utc, berlin);
    }
}
