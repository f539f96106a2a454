//! Epoch-millis conversion for zip entry times and file mtimes, and the date
//! stamp used in report file names.
//!
//! Zip entries carry a local DOS date/time with no zone; they are read as UTC.

use chrono::{DateTime, NaiveDate, Utc};
use std::time::SystemTime;

/// `None` when the DOS fields do not form a real date and time.
pub fn zip_datetime_millis(dt: zip::DateTime) -> Option<i64> {
    let millis = NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?
        .and_hms_opt(u32::from(dt.hour()), u32::from(dt.minute()), u32::from(dt.second()))?
        .and_utc()
        .timestamp_millis();
    Some(millis)
}

pub fn system_time_millis(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp_millis()
}

/// `YYYY-MM-DD` in UTC.
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn zip_times_become_epoch_millis() {
        let dt = zip::DateTime::from_date_and_time(2020, 2, 29, 12, 30, 10).unwrap();
        assert_eq!(zip_datetime_millis(dt), Some(1_582_979_410_000));

        let dos_epoch = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(zip_datetime_millis(dos_epoch), Some(315_532_800_000));
    }

    #[test]
    fn system_times_on_both_sides_of_the_epoch() {
        assert_eq!(system_time_millis(UNIX_EPOCH + Duration::from_millis(1500)), 1500);
        assert_eq!(system_time_millis(UNIX_EPOCH - Duration::from_millis(2000)), -2000);
    }

    #[test]
    fn today_is_iso_formatted() {
        let t = today();
        assert_eq!(t.len(), 10);
        assert!(NaiveDate::parse_from_str(&t, "%Y-%m-%d").is_ok());
    }
}
