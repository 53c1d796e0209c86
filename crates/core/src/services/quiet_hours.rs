//! Quiet hours evaluation.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use vibecheck_common::{AppError, AppResult};

/// Check whether `now` falls inside a do-not-disturb window.
///
/// The window is a pair of local hours in the given IANA timezone. Only
/// the hour component of the local time is considered (truncated, not
/// rounded). A window whose start is later than its end spans midnight,
/// e.g. 23 -> 7 covers hours 23, 0, 1, ..., 6.
///
/// Returns `Ok(false)` when either bound is unset. A malformed timezone
/// identifier is a configuration error rather than a silent UTC fallback,
/// so a user with a broken profile is surfaced instead of being pinged at
/// the wrong local time.
pub fn is_quiet_hours(
    start: Option<i32>,
    end: Option<i32>,
    timezone: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(false);
    };

    let tz: Tz = timezone
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid timezone identifier: {timezone}")))?;

    let current_hour = now.with_timezone(&tz).hour() as i32;

    if start > end {
        // Window spans midnight
        Ok(current_hour >= start || current_hour < end)
    } else {
        Ok(current_hour >= start && current_hour < end)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_utc_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, hour, 15, 0).unwrap()
    }

    #[test]
    fn test_unset_bounds_never_quiet() {
        let now = at_utc_hour(3);
        assert!(!is_quiet_hours(None, None, "UTC", now).unwrap());
        assert!(!is_quiet_hours(Some(23), None, "UTC", now).unwrap());
        assert!(!is_quiet_hours(None, Some(7), "UTC", now).unwrap());
    }

    #[test]
    fn test_daytime_window() {
        // 09:00-17:00
        assert!(!is_quiet_hours(Some(9), Some(17), "UTC", at_utc_hour(8)).unwrap());
        assert!(is_quiet_hours(Some(9), Some(17), "UTC", at_utc_hour(9)).unwrap());
        assert!(is_quiet_hours(Some(9), Some(17), "UTC", at_utc_hour(16)).unwrap());
        assert!(!is_quiet_hours(Some(9), Some(17), "UTC", at_utc_hour(17)).unwrap());
    }

    #[test]
    fn test_midnight_spanning_window() {
        // 23:00-07:00 is quiet for hours 23, 0..=6 and loud for 7..=22
        for hour in 0..24 {
            let quiet = is_quiet_hours(Some(23), Some(7), "UTC", at_utc_hour(hour)).unwrap();
            let expected = hour >= 23 || hour < 7;
            assert_eq!(quiet, expected, "hour {hour}");
        }
    }

    #[test]
    fn test_respects_timezone() {
        // 14:00 UTC is 23:00 in Tokyo (UTC+9)
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 14, 0, 0).unwrap();
        assert!(is_quiet_hours(Some(23), Some(7), "Asia/Tokyo", now).unwrap());
        assert!(!is_quiet_hours(Some(23), Some(7), "UTC", now).unwrap());
    }

    #[test]
    fn test_minutes_are_truncated() {
        // 22:59 local is still hour 22, not rounded up into the window
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 22, 59, 59).unwrap();
        assert!(!is_quiet_hours(Some(23), Some(7), "UTC", now).unwrap());
    }

    #[test]
    fn test_invalid_timezone_is_an_error() {
        let result = is_quiet_hours(Some(23), Some(7), "Mars/Olympus_Mons", at_utc_hour(0));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
