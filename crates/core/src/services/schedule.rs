//! Ping interval scheduling.
//!
//! Computes when a group is next due for a check-in prompt. Two modes:
//!
//! - **Random**: exponentially distributed intervals around the desired
//!   weekly frequency (Poisson-process inter-arrival sampling), clamped so
//!   pings are neither near-instant nor pathologically far out.
//! - **Fixed**: explicit weekday + hour slots in the owner's timezone,
//!   searched forward from now.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rand::Rng;

use vibecheck_db::entities::group::{self, IntervalMode};

/// Hours in one week.
const WEEK_HOURS: f64 = 7.0 * 24.0;

/// Hard cap on a random interval, regardless of frequency.
const MAX_RANDOM_HOURS: f64 = 72.0;

/// Expected hours between pings for a weekly frequency.
///
/// A non-positive frequency is malformed input; it falls back to one ping
/// per week instead of propagating an error.
#[must_use]
pub fn expected_interval_hours(frequency: i32) -> f64 {
    if frequency <= 0 {
        tracing::warn!(frequency, "Non-positive frequency, falling back to 1/week");
        return WEEK_HOURS;
    }
    WEEK_HOURS / f64::from(frequency)
}

/// Weekday indices (0 = Sunday .. 6 = Saturday) derived from a frequency
/// when fixed mode has no explicit day selection.
///
/// The specific day choices are a product heuristic and are load-bearing
/// for observable scheduling behavior; do not redesign them.
#[must_use]
pub fn schedule_days_from_frequency(frequency: i32) -> Vec<u32> {
    match frequency {
        7 => vec![0, 1, 2, 3, 4, 5, 6],
        3 => vec![1, 3, 5], // Mon, Wed, Fri
        2 => vec![1, 4],    // Mon, Thu
        _ => vec![3],       // Wed only
    }
}

/// Compute the next ping instant for a group. Always strictly after `now`.
pub fn next_ping_time(
    frequency: i32,
    mode: IntervalMode,
    schedule_days: Option<&serde_json::Value>,
    schedule_times: Option<&serde_json::Value>,
    timezone: &str,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> DateTime<Utc> {
    match mode {
        IntervalMode::Fixed => {
            let days = effective_days(schedule_days, frequency);
            let hours = effective_hours(schedule_times);
            find_next_scheduled_time(now, &days, &hours, timezone)
        }
        IntervalMode::Random => {
            let expected = expected_interval_hours(frequency);

            // Inverse-CDF sampling of an exponential distribution with
            // mean `expected`.
            let u: f64 = rng.r#gen();
            let raw_hours = -(1.0 - u).ln() * expected;

            // Minimum 1h against near-instant repeats, soft cap at 1.25x
            // the expected interval, hard cap at 72h.
            let hours = raw_hours
                .min(expected * 1.25)
                .min(MAX_RANDOM_HOURS)
                .max(1.0);

            now + Duration::milliseconds((hours * 3_600_000.0) as i64)
        }
    }
}

/// Compute the first ping instant for a group that has never been
/// scheduled.
///
/// Fixed mode runs the same forward search. Random mode deliberately
/// ignores the expected interval and schedules within 1-5 hours so a
/// brand-new group gets quick engagement.
pub fn initialize_next_ping_time(
    frequency: i32,
    mode: IntervalMode,
    schedule_days: Option<&serde_json::Value>,
    schedule_times: Option<&serde_json::Value>,
    timezone: &str,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> DateTime<Utc> {
    match mode {
        IntervalMode::Fixed => {
            let days = effective_days(schedule_days, frequency);
            let hours = effective_hours(schedule_times);
            find_next_scheduled_time(now, &days, &hours, timezone)
        }
        IntervalMode::Random => {
            let hours: f64 = rng.gen_range(1.0..5.0);
            now + Duration::milliseconds((hours * 3_600_000.0) as i64)
        }
    }
}

/// Compute the next ping instant for a stored group model.
pub fn next_ping_for_group(
    group: &group::Model,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> DateTime<Utc> {
    next_ping_time(
        group.frequency,
        group.interval_mode,
        group.schedule_days.as_ref(),
        group.schedule_times.as_ref(),
        &group.owner_timezone,
        now,
        rng,
    )
}

/// Compute the first ping instant for a stored group model.
pub fn initialize_ping_for_group(
    group: &group::Model,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> DateTime<Utc> {
    initialize_next_ping_time(
        group.frequency,
        group.interval_mode,
        group.schedule_days.as_ref(),
        group.schedule_times.as_ref(),
        &group.owner_timezone,
        now,
        rng,
    )
}

/// Find the first configured (weekday, hour) slot after `now`.
///
/// Searches day offsets 0 through 7 (one full week plus today, so a match
/// exists even if every slot today has passed) in the owner's timezone.
/// On offset 0, hours earlier than the current local hour are skipped, as
/// is the current hour itself once the local minute reaches 30; the
/// half-hour margin keeps the cron's own polling cadence from perpetually
/// skipping a just-missed slot. Local civil times are mapped back to
/// instants through the timezone database, so DST transitions resolve
/// correctly; a slot that falls inside a spring-forward gap is skipped.
///
/// An unparseable owner timezone falls back to UTC (with a warning)
/// rather than erroring: scheduling must always produce a next due time,
/// so a corrupt timezone degrades the slot alignment but never wedges
/// the group. The quiet-hours evaluator makes the opposite choice, since
/// suppressing or sending in the wrong window is worse than reporting
/// the broken profile.
#[must_use]
pub fn find_next_scheduled_time(
    now: DateTime<Utc>,
    schedule_days: &[u32],
    schedule_times: &[u32],
    timezone: &str,
) -> DateTime<Utc> {
    if schedule_days.is_empty() || schedule_times.is_empty() {
        return now + Duration::hours(1);
    }

    let tz = parse_tz_or_utc(timezone);

    let mut sorted_hours = schedule_times.to_vec();
    sorted_hours.sort_unstable();

    let now_local = now.with_timezone(&tz);
    let current_hour = now_local.hour();
    let current_minute = now_local.minute();

    for day_offset in 0..=7i64 {
        let date = now_local.date_naive() + Duration::days(day_offset);
        let weekday = date.weekday().num_days_from_sunday();

        if !schedule_days.contains(&weekday) {
            continue;
        }

        for &hour in &sorted_hours {
            if day_offset == 0
                && (hour < current_hour || (hour == current_hour && current_minute >= 30))
            {
                continue;
            }

            let Some(local) = tz
                .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0)
                .earliest()
            else {
                // Nonexistent local time (DST gap)
                continue;
            };

            let candidate = local.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }

    // Unreachable with a non-empty day set, kept as a safety net
    now + Duration::hours(1)
}

fn parse_tz_or_utc(timezone: &str) -> Tz {
    timezone.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone, "Invalid schedule timezone, falling back to UTC");
        chrono_tz::UTC
    })
}

/// Sanitize a stored JSON day array, deriving from frequency when the
/// result is empty.
fn effective_days(schedule_days: Option<&serde_json::Value>, frequency: i32) -> Vec<u32> {
    let days = parse_hour_like_set(schedule_days, 6);
    if days.is_empty() {
        schedule_days_from_frequency(frequency)
    } else {
        days
    }
}

/// Sanitize a stored JSON hour array, defaulting to 09:00 local.
fn effective_hours(schedule_times: Option<&serde_json::Value>) -> Vec<u32> {
    let hours = parse_hour_like_set(schedule_times, 23);
    if hours.is_empty() { vec![9] } else { hours }
}

/// Parse a JSON array of small non-negative integers, dropping anything
/// malformed or out of range.
fn parse_hour_like_set(value: Option<&serde_json::Value>, max: u64) -> Vec<u32> {
    let Some(array) = value.and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };

    let mut out: Vec<u32> = array
        .iter()
        .filter_map(serde_json::Value::as_u64)
        .filter(|&v| v <= max)
        .map(|v| v as u32)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn test_expected_interval_hours() {
        assert_eq!(expected_interval_hours(7), 24.0);
        assert_eq!(expected_interval_hours(2), 84.0);
        assert_eq!(expected_interval_hours(1), 168.0);
        // Malformed input falls back to weekly
        assert_eq!(expected_interval_hours(0), 168.0);
        assert_eq!(expected_interval_hours(-3), 168.0);
    }

    #[test]
    fn test_days_from_frequency_table() {
        assert_eq!(schedule_days_from_frequency(7), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(schedule_days_from_frequency(3), vec![1, 3, 5]);
        assert_eq!(schedule_days_from_frequency(2), vec![1, 4]);
        assert_eq!(schedule_days_from_frequency(1), vec![3]);
        assert_eq!(schedule_days_from_frequency(4), vec![3]);
    }

    #[test]
    fn test_random_mode_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut rng = rng();

        // frequency=2: expected 84h, soft cap 105h, hard cap 72h
        for _ in 0..1000 {
            let next = next_ping_time(2, IntervalMode::Random, None, None, "UTC", now, &mut rng);
            let hours = (next - now).num_minutes() as f64 / 60.0;
            assert!(hours >= 1.0, "interval below 1h floor: {hours}");
            assert!(hours <= 72.0, "interval above 72h cap: {hours}");
        }
    }

    #[test]
    fn test_random_mode_sample_mean() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut rng = rng();

        // frequency=7: expected 24h, clamped to [1, 30]. The clamps pull
        // the sample mean below the raw expectation, so assert a band
        // rather than the unclamped mean.
        let n = 10_000;
        let mut total = 0.0;
        for _ in 0..n {
            let next = next_ping_time(7, IntervalMode::Random, None, None, "UTC", now, &mut rng);
            total += (next - now).num_minutes() as f64 / 60.0;
            let hours = (next - now).num_minutes() as f64 / 60.0;
            assert!((1.0..=30.0).contains(&hours));
        }
        let mean = total / f64::from(n);
        assert!(
            (12.0..24.0).contains(&mean),
            "sample mean {mean} outside tolerance band"
        );
    }

    #[test]
    fn test_initialize_random_within_five_hours() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let mut rng = rng();

        for _ in 0..200 {
            let next =
                initialize_next_ping_time(2, IntervalMode::Random, None, None, "UTC", now, &mut rng);
            let hours = (next - now).num_minutes() as f64 / 60.0;
            assert!((1.0..=5.0).contains(&hours), "initial interval {hours}");
        }
    }

    #[test]
    fn test_fixed_mode_derived_days_scenario() {
        // frequency=3 with no explicit schedule: Mon/Wed/Fri at 09:00.
        // From Tuesday 10:00 the next slot is Wednesday 09:00 same week.
        let tuesday = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let mut rng = rng();

        let next =
            next_ping_time(3, IntervalMode::Fixed, None, None, "UTC", tuesday, &mut rng);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_explicit_schedule() {
        let days = serde_json::json!([2, 5]); // Tue, Fri
        let times = serde_json::json!([8, 20]);
        let mut rng = rng();

        // Tuesday 10:00: 08:00 today has passed, 20:00 today is next
        let tuesday = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let next = next_ping_time(
            2,
            IntervalMode::Fixed,
            Some(&days),
            Some(&times),
            "UTC",
            tuesday,
            &mut rng,
        );
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 11, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_cycles_weekly() {
        let days = vec![1, 3, 5]; // Mon, Wed, Fri
        let hours = vec![9];

        // Walk forward through a full week of slots from Tuesday
        let mut now = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let next = find_next_scheduled_time(now, &days, &hours, "UTC");
            assert!(next > now);
            seen.push(next);
            now = next;
        }

        // Wed 12th, Fri 14th, Mon 17th, Wed 19th
        assert_eq!(seen[0], Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap());
        assert_eq!(seen[1], Utc.with_ymd_and_hms(2024, 6, 14, 9, 0, 0).unwrap());
        assert_eq!(seen[2], Utc.with_ymd_and_hms(2024, 6, 17, 9, 0, 0).unwrap());
        assert_eq!(seen[3], Utc.with_ymd_and_hms(2024, 6, 19, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_half_hour_margin() {
        let days = vec![2]; // Tuesday
        let hours = vec![10];

        // Tuesday 10:40 local: the 10:00 slot is gone, next is a week out
        let late = Utc.with_ymd_and_hms(2024, 6, 11, 10, 40, 0).unwrap();
        let next = find_next_scheduled_time(late, &days, &hours, "UTC");
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 18, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_timezone_conversion() {
        let days = vec![0]; // Sunday
        let hours = vec![9];

        // Saturday 12:00 UTC; next Sunday 09:00 in Amsterdam is the day
        // after the spring-forward transition, so CEST (UTC+2) applies.
        let saturday = Utc.with_ymd_and_hms(2024, 3, 30, 12, 0, 0).unwrap();
        let next = find_next_scheduled_time(saturday, &days, &hours, "Europe/Amsterdam");
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 31, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_fixed_mode_empty_input_falls_back() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let next = find_next_scheduled_time(now, &[], &[9], "UTC");
        assert_eq!(next, now + Duration::hours(1));
    }

    #[test]
    fn test_malformed_schedule_json_is_dropped() {
        // Out-of-range and non-numeric entries are filtered; an all-bad
        // day list falls back to the frequency table.
        let days = serde_json::json!([9, "wed", -1]);
        let times = serde_json::json!([25, 9]);
        let tuesday = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let mut rng = rng();

        let next = next_ping_time(
            3,
            IntervalMode::Fixed,
            Some(&days),
            Some(&times),
            "UTC",
            tuesday,
            &mut rng,
        );
        // Derived Mon/Wed/Fri at the one valid hour
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_always_strictly_after_now() {
        let mut rng = rng();
        let days = serde_json::json!([0, 1, 2, 3, 4, 5, 6]);
        let times = serde_json::json!([0, 6, 12, 18]);

        let mut now = Utc.with_ymd_and_hms(2024, 6, 9, 0, 0, 0).unwrap();
        for _ in 0..50 {
            let next = next_ping_time(
                7,
                IntervalMode::Fixed,
                Some(&days),
                Some(&times),
                "UTC",
                now,
                &mut rng,
            );
            assert!(next > now);
            now = next;
        }
    }
}
