//! Time handling utilities for raster timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};

use crate::{GeoError, GeoResult};

/// Length of the `YYYY-MM-DDTHH:MM:SS.sssZ` suffix carried by auto-ingested
/// GeoTIFF file names.
const FILENAME_TIMESTAMP_LEN: usize = 24;

/// Parse an ISO-8601 string. Strings without a zone are taken as UTC.
pub fn parse_iso_datetime(s: &str) -> GeoResult<DateTime<Utc>> {
    let s = s.trim();

    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Without timezone, with or without fractional seconds
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(GeoError::InvalidTime(s.to_string()))
}

/// Extract the UTC timestamp a file name (without extension) ends with.
///
/// `rainfall_2023-01-01T00:00:00.000Z` yields 2023-01-01 00:00 UTC.
/// Returns `None` when the name does not end with that exact pattern.
pub fn extract_iso_date_from_filename(stem: &str) -> Option<DateTime<Utc>> {
    if stem.len() < FILENAME_TIMESTAMP_LEN || !stem.is_char_boundary(stem.len() - FILENAME_TIMESTAMP_LEN) {
        return None;
    }
    let suffix = &stem[stem.len() - FILENAME_TIMESTAMP_LEN..];

    let bytes = suffix.as_bytes();
    let shape_ok = bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        19 => *b == b'.',
        23 => *b == b'Z',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }

    NaiveDateTime::parse_from_str(&suffix[..23], "%Y-%m-%dT%H:%M:%S%.3f")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// ISO form with explicit offset, used in published file names
/// (`2023-01-01T00:00:00+00:00`).
pub fn isoformat(dt: &DateTime<Utc>) -> String {
    let format = if dt.nanosecond() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    dt.to_rfc3339_opts(format, false)
}

/// Naive ISO form (no offset) stored in inspected NetCDF metadata.
pub fn naive_isoformat(dt: &DateTime<Utc>) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Timestamp format advertised to tile clients.
pub fn tile_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_variants() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 6, 0, 0).unwrap();
        assert_eq!(parse_iso_datetime("2023-01-01T06:00:00Z").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2023-01-01T06:00:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2023-01-01T06:00:00.000").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2023-01-01T09:00:00+03:00").unwrap(), expected);
        assert_eq!(parse_iso_datetime("2023-01-01").unwrap().day(), 1);
        assert!(parse_iso_datetime("yesterday").is_err());
    }

    #[test]
    fn test_extract_from_filename() {
        let dt = extract_iso_date_from_filename("rain_2023-02-15T12:30:00.000Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2023, 2, 15, 12, 30, 0).unwrap());

        assert!(extract_iso_date_from_filename("2023-02-15T12:30:00.000Z").is_some());
        assert!(extract_iso_date_from_filename("rain_2023-02-15T12:30:00Z").is_none());
        assert!(extract_iso_date_from_filename("rain_2023-02-15T12:30:00.000Z_v2").is_none());
        assert!(extract_iso_date_from_filename("rain").is_none());
        assert!(extract_iso_date_from_filename("2023-13-45T12:30:00.000Z").is_none());
    }

    #[test]
    fn test_formats() {
        let dt = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(isoformat(&dt), "2023-01-01T00:00:00+00:00");
        assert_eq!(naive_isoformat(&dt), "2023-01-01T00:00:00");
        assert_eq!(tile_timestamp(&dt), "2023-01-01T00:00:00.000Z");
    }
}
