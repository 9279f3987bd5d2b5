use chrono::{DateTime, NaiveDateTime};

// ---------------------------------------------------------------------------
// MATLAB serial date numbers
// ---------------------------------------------------------------------------

/// MATLAB datenum for 1970-01-01T00:00:00 (the Unix epoch).
const UNIX_EPOCH_DATENUM: f64 = 719_529.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert a MATLAB serial date number to a naive calendar timestamp.
///
/// MATLAB counts fractional days from year 0; anchoring on the Unix epoch
/// avoids the ordinal-minus-366-days dance. The result is rounded to the
/// nearest millisecond, which is below the precision an f64 datenum carries
/// for any modern date.
///
/// Returns `None` for non-finite input or dates outside chrono's range.
pub fn datenum_to_datetime(datenum: f64) -> Option<NaiveDateTime> {
    if !datenum.is_finite() {
        return None;
    }
    let millis = ((datenum - UNIX_EPOCH_DATENUM) * SECONDS_PER_DAY * 1_000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Convert a whole array of datenums, failing on the first bad entry.
pub fn datenums_to_datetimes(datenums: &[f64]) -> Option<Vec<NaiveDateTime>> {
    datenums.iter().map(|&d| datenum_to_datetime(d)).collect()
}

/// Inverse conversion, used by the sample generator.
pub fn datetime_to_datenum(dt: NaiveDateTime) -> f64 {
    let millis = dt.and_utc().timestamp_millis() as f64;
    UNIX_EPOCH_DATENUM + millis / (SECONDS_PER_DAY * 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn unix_epoch_anchor() {
        let dt = datenum_to_datetime(719529.0).unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn fractional_day() {
        // 0.5 days past the epoch is noon.
        let dt = datenum_to_datetime(719529.5).unwrap();
        assert_eq!(
            dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            "1970-01-01 12:00:00"
        );
    }

    #[test]
    fn known_modern_date() {
        // datenum('2020-04-17') == 737898
        let dt = datenum_to_datetime(737898.0).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2020, 4, 17).unwrap());
    }

    #[test]
    fn round_trip_millisecond_exact() {
        let dt = NaiveDate::from_ymd_opt(2025, 7, 13)
            .unwrap()
            .and_hms_milli_opt(8, 30, 15, 250)
            .unwrap();
        let back = datenum_to_datetime(datetime_to_datenum(dt)).unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(datenum_to_datetime(f64::NAN).is_none());
        assert!(datenum_to_datetime(f64::INFINITY).is_none());
        assert!(datenums_to_datetimes(&[737898.0, f64::NAN]).is_none());
    }
}
