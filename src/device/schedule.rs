//! Comfort and timer values derived from a snapshot's schedules

use super::snapshot::{ComfortLevel, ThermostatSnapshot, TimerSlot};
use chrono::{Datelike, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Comfort targets in force at the snapshot's time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ComfortState {
    /// Level currently in force
    pub comfort: f64,
    /// Level the schedule moves to next
    pub next_comfort: f64,
    /// Hours until `next_comfort` takes over
    pub next_in_hours: f64,
}

fn sorted_levels(levels: &[ComfortLevel]) -> Vec<ComfortLevel> {
    let mut levels = levels.to_vec();
    levels.sort_by_key(|level| level.time);
    levels
}

/// Seconds from `from` to `to` when `to` lies `days` whole days ahead
fn seconds_between(from: NaiveTime, to: NaiveTime, days: i64) -> i64 {
    days * 86_400 + to.signed_duration_since(from).num_seconds()
}

/// Current and next comfort level from the weekly schedule.
///
/// Returns `None` when the device has no comfort schedule.
pub fn derive_comfort(snapshot: &ThermostatSnapshot) -> Option<ComfortState> {
    let schedule = &snapshot.comfort;
    if schedule.is_empty() {
        return None;
    }

    let today = snapshot.time.weekday().num_days_from_monday() as usize;
    let now = snapshot.time.time().with_nanosecond(0).unwrap_or(snapshot.time.time());

    // Latest level at or before now, looking back a full week.
    let mut current = None;
    for offset in 0..=7usize {
        let day = sorted_levels(&schedule.days[(today + 7 - offset % 7) % 7]);
        let found = if offset == 0 {
            day.iter().rev().find(|level| level.time <= now).copied()
        } else {
            day.last().copied()
        };
        if found.is_some() {
            current = found;
            break;
        }
    }

    // Earliest level strictly after now, looking forward a full week.
    let mut next = None;
    for offset in 0..=7i64 {
        let day = sorted_levels(&schedule.days[(today + offset as usize) % 7]);
        let found = if offset == 0 {
            day.iter().find(|level| level.time > now).copied()
        } else {
            day.first().copied()
        };
        if let Some(level) = found {
            next = Some((level, seconds_between(now, level.time, offset)));
            break;
        }
    }

    let current = current?;
    let (next, seconds) = next?;
    Some(ComfortState {
        comfort: current.temperature,
        next_comfort: next.temperature,
        next_in_hours: seconds as f64 / 3600.0,
    })
}

fn slot_contains(slot: &TimerSlot, now: NaiveTime) -> bool {
    if slot.on <= slot.off {
        slot.on <= now && now < slot.off
    } else {
        // runs past midnight
        now >= slot.on || now < slot.off
    }
}

/// Whether today's hot-water timer is on at the snapshot's time
pub fn derive_timer(snapshot: &ThermostatSnapshot) -> bool {
    let today = snapshot.time.weekday().num_days_from_monday() as usize;
    let now = snapshot.time.time();
    snapshot.timer.days[today]
        .iter()
        .any(|slot| slot_contains(slot, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::snapshot::{ComfortSchedule, TimerSchedule};
    use crate::device::testing::snapshot_at;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn level(h: u32, m: u32, temperature: f64) -> ComfortLevel {
        ComfortLevel {
            time: at(h, m),
            temperature,
        }
    }

    fn weekday_schedule() -> ComfortSchedule {
        let day = vec![
            level(6, 30, 21.0),
            level(8, 0, 16.0),
            level(17, 0, 21.0),
            level(22, 0, 16.0),
        ];
        ComfortSchedule {
            days: std::array::from_fn(|_| day.clone()),
        }
    }

    #[test]
    fn test_comfort_between_levels() {
        // 2024-01-15 is a Monday
        let mut snapshot = snapshot_at("2024-01-15 16:30:00");
        snapshot.comfort = weekday_schedule();

        let state = derive_comfort(&snapshot).unwrap();
        assert_eq!(state.comfort, 16.0);
        assert_eq!(state.next_comfort, 21.0);
        assert!((state.next_in_hours - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_comfort_before_first_level_uses_previous_day() {
        let mut snapshot = snapshot_at("2024-01-15 05:00:00");
        snapshot.comfort = weekday_schedule();

        let state = derive_comfort(&snapshot).unwrap();
        assert_eq!(state.comfort, 16.0);
        assert_eq!(state.next_comfort, 21.0);
        assert!((state.next_in_hours - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_comfort_after_last_level_wraps_to_next_day() {
        let mut snapshot = snapshot_at("2024-01-15 23:00:00");
        snapshot.comfort = weekday_schedule();

        let state = derive_comfort(&snapshot).unwrap();
        assert_eq!(state.comfort, 16.0);
        assert_eq!(state.next_comfort, 21.0);
        assert!((state.next_in_hours - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_comfort_single_level_week() {
        let mut schedule = ComfortSchedule::default();
        schedule.days[2].push(level(7, 0, 20.0));
        // Friday: only Wednesday carries a level
        let mut snapshot = snapshot_at("2024-01-19 12:00:00");
        snapshot.comfort = schedule;

        let state = derive_comfort(&snapshot).unwrap();
        assert_eq!(state.comfort, 20.0);
        assert_eq!(state.next_comfort, 20.0);
        // Fri 12:00 -> Wed 07:00 = 4 days 19 hours
        assert!((state.next_in_hours - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_comfort_schedule() {
        let snapshot = snapshot_at("2024-01-15 12:00:00");
        assert_eq!(derive_comfort(&snapshot), None);
    }

    #[test]
    fn test_timer_slots() {
        let mut timer = TimerSchedule::default();
        timer.days[0] = vec![
            TimerSlot { on: at(6, 0), off: at(7, 30) },
            TimerSlot { on: at(23, 0), off: at(1, 0) },
        ];

        let mut snapshot = snapshot_at("2024-01-15 06:45:00");
        snapshot.timer = timer.clone();
        assert!(derive_timer(&snapshot));

        let mut snapshot = snapshot_at("2024-01-15 07:30:00");
        snapshot.timer = timer.clone();
        assert!(!derive_timer(&snapshot));

        let mut snapshot = snapshot_at("2024-01-15 23:15:00");
        snapshot.timer = timer.clone();
        assert!(derive_timer(&snapshot));

        // Tuesday has no slots
        let mut snapshot = snapshot_at("2024-01-16 06:45:00");
        snapshot.timer = timer;
        assert!(!derive_timer(&snapshot));
    }
}
