//! Wall-clock aligned polling
//!
//! When the poll interval divides a day evenly, each sleep is chosen so that the
//! next cycle lands on a multiple of the interval since midnight. Late cycles are
//! pulled back onto the grid, early ones pushed forward, so latency and clock
//! drift never accumulate.

use chrono::{NaiveTime, Timelike};

const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds to sleep after a cycle whose last observed clock read `time_of_day`.
///
/// Intervals that do not divide a day are returned unchanged.
pub fn compute_sleep(interval: u64, time_of_day: NaiveTime) -> u64 {
    if interval == 0 || SECONDS_PER_DAY % interval != 0 {
        return interval;
    }

    let interval = interval as i64;
    let mut remainder = time_of_day.num_seconds_from_midnight() as i64 % interval;
    if remainder * 2 > interval {
        remainder -= interval;
    }
    (interval - remainder) as u64
}

/// Time of day from the trailing `HH:MM:SS` of a device time string
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let clock = value.trim().rsplit(' ').next()?;
    NaiveTime::parse_from_str(clock, "%H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[rstest]
    #[case(60, at(10, 15, 5), 55)]
    #[case(60, at(10, 15, 35), 85)]
    #[case(60, at(10, 15, 30), 30)]
    #[case(60, at(10, 15, 0), 60)]
    #[case(300, at(23, 59, 50), 310)]
    #[case(3600, at(7, 20, 0), 2400)]
    fn test_aligned_sleep(#[case] interval: u64, #[case] time: NaiveTime, #[case] expected: u64) {
        assert_eq!(compute_sleep(interval, time), expected);
    }

    #[rstest]
    #[case(97)]
    #[case(7)]
    #[case(1000)]
    fn test_non_divisor_interval_is_unaligned(#[case] interval: u64) {
        assert_eq!(compute_sleep(interval, at(10, 15, 5)), interval);
        assert_eq!(compute_sleep(interval, at(0, 0, 0)), interval);
    }

    #[test]
    fn test_sleep_lands_on_grid() {
        for second in 0..86_400u32 {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(second, 0).unwrap();
            let sleep = compute_sleep(120, time);
            assert_eq!((second as u64 + sleep) % 120, 0);
            assert!((60..=180).contains(&sleep));
        }
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("2024-01-15 10:15:05"), Some(at(10, 15, 5)));
        assert_eq!(parse_time_of_day("23:59:59"), Some(at(23, 59, 59)));
        assert_eq!(parse_time_of_day("2024-01-15"), None);
        assert_eq!(parse_time_of_day(""), None);
    }
}
