//! Wire protocol: closed sum types for everything externally visible.
//!
//! Roles, phases, actions, error codes, replay events, and the public /
//! private state payloads all live here so the engine never dispatches on
//! open strings.

pub mod actions;
pub mod error_codes;
pub mod events;
pub mod payloads;
pub mod phase;
pub mod roles;
pub mod types;

pub use actions::{ChatChannel, PlayerAction};

pub use error_codes::{ErrorBody, GameError};

pub use events::{
    EliminationReason, GameEvent, ReplayEvent, RoleReveal, SeatTally, VoteKind, Winner,
};

pub use payloads::{
    ChatMessage, GamePrivateState, GamePublicState, PhaseTimers, PlayerPublic, PrivateActions,
    PublicLogEntry, RoomState, SeatState, UserRef, VoiceTurnInfo, WitchInfo, WolfTeammate,
};

pub use phase::Phase;

pub use roles::{NightRole, Role, RoleConfig};

pub use types::{
    now_ms, sanitize_channel_component, GameId, RoomId, RoomStatus, Seat, UserId,
    GAME_OVER_LINGER_MS, MAX_ROOM_PLAYERS, MIN_ROOM_PLAYERS, SHERIFF_ELECTION_MIN_PLAYERS,
    SHERIFF_ELECTION_SECS, SHERIFF_VOTE_SECS, WAITING_ROOM_EXPIRY_SECS,
};
