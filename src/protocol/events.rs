//! Replay event log entries.
//!
//! Every mutation appends to the game's chronological event log; at game end
//! the whole log is archived as a replay document.

use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::roles::Role;
use super::types::Seat;

/// Why a seat left the living.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EliminationReason {
    Wolf,
    Poison,
    Vote,
    Hunter,
}

/// Side that won the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Villagers,
    Werewolves,
}

impl Winner {
    /// Public log line announcing the verdict.
    pub fn announcement(self) -> &'static str {
        match self {
            Winner::Werewolves => "狼人胜利",
            Winner::Villagers => "好人胜利",
        }
    }
}

/// Which ballot a `vote_result` event tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Day,
    Sheriff,
}

/// One seat's accumulated vote total, in half-vote units so the sheriff's
/// 1.5-weight ballot stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatTally {
    pub seat: Seat,
    pub half_votes: u32,
}

/// Role reveal entry included in the final `game_result` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReveal {
    pub seat: Seat,
    pub nickname: String,
    pub role: Role,
}

/// Typed replay event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ReplayEvent {
    #[serde(rename_all = "camelCase")]
    PhaseChanged { phase: Phase, day_no: u32 },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        seat: Seat,
        nickname: String,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ActionSubmitted { seat: Seat, action: String },
    #[serde(rename_all = "camelCase")]
    VoteResult {
        kind: VoteKind,
        stage: u8,
        tally: Vec<SeatTally>,
        eliminated_seat: Option<Seat>,
    },
    #[serde(rename_all = "camelCase")]
    NightResult { eliminated_seats: Vec<Seat> },
    #[serde(rename_all = "camelCase")]
    PlayerEliminated {
        seat: Seat,
        reason: EliminationReason,
    },
    #[serde(rename_all = "camelCase")]
    GameResult {
        winner: Winner,
        roles: Vec<RoleReveal>,
    },
    #[serde(rename_all = "camelCase")]
    SpeakerChanged { seat: Option<Seat> },
    #[serde(rename_all = "camelCase")]
    SheriffElected { seat: Option<Seat> },
}

/// An event as stored in the append-only log: payload plus milliseconds since
/// game start. Timestamps are derived from the server wall clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Milliseconds since `started_at`
    pub t: i64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}
