//! Edge-triggered change tracking
//!
//! Each thermostat carries a `CauseRecord` with the last derived heating and
//! hot-water tuples. Events are emitted only when a tuple differs from the
//! record; the record is refreshed on every observation. The record starts out
//! empty, which no real observation can equal, so the first observation after
//! startup always emits.

use super::cause::{HeatCause, HotwaterCause};
use crate::device::ThermostatSnapshot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event kinds as stored
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    Heating,
    Target,
    Hotwater,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Target => "target",
            Self::Hotwater => "hotwater",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum EventPayload {
    /// Heating relay switched
    Heating { on: bool },
    /// Heating target or its cause changed
    Target { cause: HeatCause, target: f64 },
    /// Hot-water state or its cause changed
    Hotwater { on: bool, cause: HotwaterCause },
}

/// A recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub thermostat: String,
    /// Device clock at the observation
    pub time: NaiveDateTime,
    pub payload: EventPayload,
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

impl Event {
    pub fn class(&self) -> EventClass {
        match self.payload {
            EventPayload::Heating { .. } => EventClass::Heating,
            EventPayload::Target { .. } => EventClass::Target,
            EventPayload::Hotwater { .. } => EventClass::Hotwater,
        }
    }

    /// Primary state column: relay position, or the cause for target changes
    pub fn state(&self) -> &'static str {
        match self.payload {
            EventPayload::Heating { on } => on_off(on),
            EventPayload::Target { cause, .. } => cause.as_str(),
            EventPayload::Hotwater { on, .. } => on_off(on),
        }
    }

    pub fn cause(&self) -> Option<&'static str> {
        match self.payload {
            EventPayload::Heating { .. } => None,
            EventPayload::Target { cause, .. } => Some(cause.as_str()),
            EventPayload::Hotwater { cause, .. } => Some(cause.as_str()),
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        match self.payload {
            EventPayload::Target { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Last heating tuple seen; `None` fields are the startup sentinel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastHeat {
    pub cause: Option<HeatCause>,
    pub state: Option<bool>,
    pub target: Option<f64>,
}

/// Last hot-water tuple seen; `None` fields are the startup sentinel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastHotwater {
    pub cause: Option<HotwaterCause>,
    pub state: Option<bool>,
}

/// Per-thermostat change-detection memory, lives for one process run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CauseRecord {
    pub heat: LastHeat,
    pub hotwater: LastHotwater,
}

/// Heating and target events for one observation
pub fn emit_heat_events(
    thermostat: &str,
    snapshot: &ThermostatSnapshot,
    target: f64,
    cause: HeatCause,
    last: &mut LastHeat,
) -> Vec<Event> {
    let mut events = Vec::new();
    let state = snapshot.heating.map(|heating| heating.on);

    if let Some(on) = state {
        if last.state != Some(on) {
            events.push(Event {
                thermostat: thermostat.to_string(),
                time: snapshot.time,
                payload: EventPayload::Heating { on },
            });
        }
    }

    if last.cause != Some(cause) || last.target != Some(target) {
        events.push(Event {
            thermostat: thermostat.to_string(),
            time: snapshot.time,
            payload: EventPayload::Target { cause, target },
        });
    }

    *last = LastHeat {
        cause: Some(cause),
        state,
        target: Some(target),
    };
    events
}

/// Hot-water event for one observation
pub fn emit_hotwater_events(
    thermostat: &str,
    snapshot: &ThermostatSnapshot,
    state: bool,
    cause: HotwaterCause,
    last: &mut LastHotwater,
) -> Vec<Event> {
    let mut events = Vec::new();

    if last.state != Some(state) || last.cause != Some(cause) {
        events.push(Event {
            thermostat: thermostat.to_string(),
            time: snapshot.time,
            payload: EventPayload::Hotwater { on: state, cause },
        });
    }

    *last = LastHotwater {
        cause: Some(cause),
        state: Some(state),
    };
    events
}

/// Cause records for every thermostat seen so far
#[derive(Debug, Default)]
pub struct ChangeTracker {
    records: HashMap<String, CauseRecord>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `thermostat`, created at the sentinel on first use
    pub fn record_mut(&mut self, thermostat: &str) -> &mut CauseRecord {
        self.records.entry(thermostat.to_string()).or_default()
    }

    pub fn record(&self, thermostat: &str) -> Option<&CauseRecord> {
        self.records.get(thermostat)
    }

    /// Events for one snapshot, given its derived heating and hot-water tuples.
    ///
    /// Subsystems the device lacks are not tracked.
    pub fn observe(
        &mut self,
        thermostat: &str,
        snapshot: &ThermostatSnapshot,
        heat: (f64, HeatCause),
        hotwater: (bool, HotwaterCause),
    ) -> Vec<Event> {
        let record = self.record_mut(thermostat);
        let mut events = Vec::new();

        if snapshot.heating.is_some() {
            events.extend(emit_heat_events(
                thermostat,
                snapshot,
                heat.0,
                heat.1,
                &mut record.heat,
            ));
        }
        if snapshot.hotwater.is_some() {
            events.extend(emit_hotwater_events(
                thermostat,
                snapshot,
                hotwater.0,
                hotwater.1,
                &mut record.hotwater,
            ));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::snapshot::{HeatingBlock, HotwaterBlock};
    use crate::device::testing::snapshot_at;
    use pretty_assertions::assert_eq;

    fn heating_snapshot(on: bool) -> ThermostatSnapshot {
        let mut snapshot = snapshot_at("2024-01-15 10:00:00");
        snapshot.heating = Some(HeatingBlock {
            on,
            target: 21.0,
            hold: false,
        });
        snapshot
    }

    #[test]
    fn test_first_observation_emits_both_heat_events() {
        let mut last = LastHeat::default();
        let snapshot = heating_snapshot(true);
        let events = emit_heat_events("hall", &snapshot, 21.0, HeatCause::ComfortLevel, &mut last);

        let classes: Vec<_> = events.iter().map(Event::class).collect();
        assert_eq!(classes, vec![EventClass::Heating, EventClass::Target]);
        assert_eq!(events[1].state(), "comfortlevel");
        assert_eq!(events[1].temperature(), Some(21.0));
        assert_eq!(
            last,
            LastHeat {
                cause: Some(HeatCause::ComfortLevel),
                state: Some(true),
                target: Some(21.0),
            }
        );
    }

    #[test]
    fn test_identical_observations_emit_once() {
        let mut last = LastHeat::default();
        let snapshot = heating_snapshot(false);

        let total: usize = (0..10)
            .map(|_| emit_heat_events("hall", &snapshot, 21.0, HeatCause::Manual, &mut last).len())
            .sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_heating_switch_only() {
        let mut last = LastHeat::default();
        let (off, on) = (heating_snapshot(false), heating_snapshot(true));
        emit_heat_events("hall", &off, 21.0, HeatCause::Manual, &mut last);

        let events = emit_heat_events("hall", &on, 21.0, HeatCause::Manual, &mut last);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, EventPayload::Heating { on: true });
        assert_eq!(events[0].state(), "on");
    }

    #[test]
    fn test_target_change_with_same_cause() {
        let mut last = LastHeat::default();
        let snapshot = heating_snapshot(true);
        emit_heat_events("hall", &snapshot, 21.0, HeatCause::Manual, &mut last);

        let events = emit_heat_events("hall", &snapshot, 22.5, HeatCause::Manual, &mut last);
        assert_eq!(
            events.iter().map(|e| e.payload).collect::<Vec<_>>(),
            vec![EventPayload::Target {
                cause: HeatCause::Manual,
                target: 22.5
            }]
        );
    }

    #[test]
    fn test_hotwater_edges() {
        let mut last = LastHotwater::default();
        let snapshot = snapshot_at("2024-01-15 10:00:00");
        let mut emit = |cause| emit_hotwater_events("hall", &snapshot, true, cause, &mut last);

        assert_eq!(emit(HotwaterCause::Timer).len(), 1);
        assert!(emit(HotwaterCause::Timer).is_empty());
        // same state, different cause
        let events = emit(HotwaterCause::Boost);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cause(), Some("boost"));
        assert!(emit(HotwaterCause::Boost).is_empty());
    }

    #[test]
    fn test_tracker_skips_missing_subsystems() {
        let mut tracker = ChangeTracker::new();
        let mut snapshot = snapshot_at("2024-01-15 10:00:00");
        snapshot.heating = None;

        let idle = (0.0, HeatCause::None);

        let events = tracker.observe("hall", &snapshot, idle, (false, HotwaterCause::None));
        assert!(events.is_empty());

        snapshot.hotwater = Some(HotwaterBlock { on: false, boost: false });
        let events = tracker.observe("hall", &snapshot, idle, (false, HotwaterCause::Timer));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class(), EventClass::Hotwater);
    }

    #[test]
    fn test_tracker_keeps_records_apart() {
        let mut tracker = ChangeTracker::new();
        let snapshot = heating_snapshot(true);

        let heat = (21.0, HeatCause::Manual);
        let hotwater = (false, HotwaterCause::None);

        assert_eq!(tracker.observe("hall", &snapshot, heat, hotwater).len(), 2);
        assert_eq!(tracker.observe("loft", &snapshot, heat, hotwater).len(), 2);
        assert!(tracker.observe("hall", &snapshot, heat, hotwater).is_empty());
        assert!(tracker.record("loft").is_some());
    }
}
