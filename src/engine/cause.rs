//! Cause derivation for heating and hot water
//!
//! Both functions walk a fixed precedence list and stop at the first rule that
//! matches. They only read the snapshot.

use crate::device::snapshot::{AwayMode, RunMode, ThermostatSnapshot};
use crate::device::ComfortState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the heating target is what it is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HeatCause {
    /// Device has no heating capability
    #[serde(rename = "")]
    None,
    Off,
    Holiday,
    Away,
    Hold,
    ComfortLevel,
    OptimumStart,
    Manual,
}

impl HeatCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Off => "off",
            Self::Holiday => "holiday",
            Self::Away => "away",
            Self::Hold => "hold",
            Self::ComfortLevel => "comfortlevel",
            Self::OptimumStart => "optimumstart",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for HeatCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why hot water is in its current state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HotwaterCause {
    /// Device has no hot-water capability
    #[serde(rename = "")]
    None,
    Off,
    Holiday,
    Away,
    Boost,
    Timer,
    Override,
}

impl HotwaterCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Off => "off",
            Self::Holiday => "holiday",
            Self::Away => "away",
            Self::Boost => "boost",
            Self::Timer => "timer",
            Self::Override => "override",
        }
    }
}

impl fmt::Display for HotwaterCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heating target and the reason for it.
///
/// `comfort` is `None` for devices without a comfort schedule, in which case
/// neither the comfort-level nor the optimum-start rule can match.
pub fn action_heat(
    snapshot: &ThermostatSnapshot,
    comfort: Option<&ComfortState>,
) -> (f64, HeatCause) {
    let Some(heating) = snapshot.heating else {
        return (0.0, HeatCause::None);
    };

    if !snapshot.enabled {
        return (0.0, HeatCause::Off);
    }

    if snapshot.run_mode == RunMode::Frost {
        let target = if snapshot.frost_protect.enabled {
            snapshot.frost_protect.target
        } else {
            0.0
        };
        let cause = if snapshot.holiday.enabled {
            HeatCause::Holiday
        } else {
            HeatCause::Away
        };
        return (target, cause);
    }

    let target = heating.target;
    let cause = if heating.hold {
        HeatCause::Hold
    } else {
        match comfort {
            Some(c) if target == c.comfort => HeatCause::ComfortLevel,
            Some(c)
                if target == c.next_comfort
                    && c.comfort < c.next_comfort
                    && c.next_in_hours <= snapshot.config.optimum_start_hours =>
            {
                HeatCause::OptimumStart
            }
            _ => HeatCause::Manual,
        }
    };
    (target, cause)
}

/// Hot-water state and the reason for it
pub fn action_hotwater(snapshot: &ThermostatSnapshot, timer_on: bool) -> (bool, HotwaterCause) {
    let Some(hotwater) = snapshot.hotwater else {
        return (false, HotwaterCause::None);
    };

    let state = hotwater.on;
    let cause = if !snapshot.enabled {
        HotwaterCause::Off
    } else if snapshot.holiday.enabled {
        HotwaterCause::Holiday
    } else if snapshot.away == AwayMode::Away {
        HotwaterCause::Away
    } else if hotwater.boost {
        HotwaterCause::Boost
    } else if state == timer_on {
        HotwaterCause::Timer
    } else {
        HotwaterCause::Override
    };
    (state, cause)
}
