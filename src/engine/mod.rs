//! Decision logic: cause derivation and change detection

pub mod cause;
pub mod tracker;

pub use cause::{action_heat, action_hotwater, HeatCause, HotwaterCause};
pub use tracker::{
    emit_heat_events, emit_hotwater_events, CauseRecord, ChangeTracker, Event, EventClass,
    EventPayload, LastHeat, LastHotwater,
};
