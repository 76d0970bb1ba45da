//! Server behavior configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_broadcast_capacity, default_pump_tick_millis, default_room_sweep_interval_secs,
};

/// Runtime knobs for the pump, sweeps, and fan-out.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Timer Pump tick granularity (milliseconds)
    #[serde(default = "default_pump_tick_millis")]
    pub pump_tick_millis: u64,
    /// Interval for the waiting-room expiry sweep (seconds)
    #[serde(default = "default_room_sweep_interval_secs")]
    pub room_sweep_interval_secs: u64,
    /// Per-channel broadcast buffer depth
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pump_tick_millis: default_pump_tick_millis(),
            room_sweep_interval_secs: default_room_sweep_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Room-creation defaults for the per-phase countdown budgets (seconds).
/// Owners may override per room within [`crate::protocol::PhaseTimers`] bounds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TimersConfig {
    #[serde(default = "super::defaults::default_night_seconds")]
    pub night_seconds: u64,
    #[serde(default = "super::defaults::default_day_speech_seconds")]
    pub day_speech_seconds: u64,
    #[serde(default = "super::defaults::default_day_vote_seconds")]
    pub day_vote_seconds: u64,
    #[serde(default = "super::defaults::default_settlement_seconds")]
    pub settlement_seconds: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            night_seconds: super::defaults::default_night_seconds(),
            day_speech_seconds: super::defaults::default_day_speech_seconds(),
            day_vote_seconds: super::defaults::default_day_vote_seconds(),
            settlement_seconds: super::defaults::default_settlement_seconds(),
        }
    }
}

impl TimersConfig {
    /// Convert into the per-room timer block.
    pub fn to_phase_timers(&self) -> crate::protocol::PhaseTimers {
        crate::protocol::PhaseTimers {
            night_seconds: self.night_seconds,
            day_speech_seconds: self.day_speech_seconds,
            day_vote_seconds: self.day_vote_seconds,
            settlement_seconds: self.settlement_seconds,
        }
    }
}
