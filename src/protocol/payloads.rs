//! Wire payloads projected from game and room state.

use serde::{Deserialize, Serialize};

use super::actions::ChatChannel;
use super::phase::Phase;
use super::roles::{NightRole, Role, RoleConfig};
use super::types::{GameId, RoomId, RoomStatus, Seat, UserId};

/// Identity block nested in player listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    pub nickname: String,
}

/// One seat as every observer sees it. Roles are never present here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPublic {
    pub seat: Seat,
    pub user: UserRef,
    pub is_alive: bool,
}

/// Public log line visible to all observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLogEntry {
    pub id: u64,
    /// Epoch milliseconds
    pub at: i64,
    pub text: String,
}

/// Game state as broadcast to the room channel.
///
/// `server_now` accompanies every emission so clients can correct for clock
/// skew when rendering the `phase_ends_at` countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePublicState {
    pub game_id: GameId,
    pub room_id: RoomId,
    pub phase: Phase,
    pub day_no: u32,
    pub server_now: i64,
    pub phase_ends_at: i64,
    pub players: Vec<PlayerPublic>,
    pub public_log: Vec<PublicLogEntry>,
    pub active_role: Option<NightRole>,
    pub active_speaker_seat: Option<Seat>,
    pub speaking_queue: Vec<Seat>,
    pub sheriff_seat: Option<Seat>,
}

/// Per-role affordances the client may currently render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateActions {
    pub hunter_shoot: bool,
}

/// Night-victim context shown to the witch while her sub-role is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitchInfo {
    pub night_victim_seat: Option<Seat>,
    pub save_used: bool,
    pub poison_used: bool,
}

/// Teammate listing shown only to werewolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WolfTeammate {
    pub seat: Seat,
    pub nickname: String,
    pub is_alive: bool,
}

/// Game state as delivered to exactly one player's user channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePrivateState {
    pub role: Role,
    pub seat: Seat,
    pub hints: Vec<PublicLogEntry>,
    pub actions: PrivateActions,
    pub selected_target_seat: Option<Seat>,
    pub witch_save_decision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witch_info: Option<WitchInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wolf_team: Option<Vec<WolfTeammate>>,
}

/// A chat line as fanned out to its audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    /// Epoch milliseconds
    pub at: i64,
    pub seat: Seat,
    pub nickname: String,
    pub text: String,
    pub channel: ChatChannel,
}

/// Signaling-authority projection for the voice relay.
///
/// The relay enforces: offers only from the active speaker to non-speakers;
/// answers and candidates only between speaker and listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceTurnInfo {
    pub game_id: GameId,
    pub phase: Phase,
    pub is_speech_phase: bool,
    pub active_speaker_seat: Option<Seat>,
    pub active_speaker_user_id: Option<UserId>,
    pub seat: Seat,
    pub user_id: UserId,
    pub is_current_speaker: bool,
}

/// One seat of a room listing, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatState {
    pub seat: Seat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub is_ready: bool,
    pub is_alive: bool,
    pub is_bot: bool,
}

/// Room state as broadcast to the room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub room_id: RoomId,
    pub room_number: String,
    pub name: String,
    pub owner_user_id: UserId,
    pub status: RoomStatus,
    pub max_players: u8,
    pub members: Vec<SeatState>,
    pub role_config: RoleConfig,
    pub timers: PhaseTimers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Per-phase countdown budgets, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimers {
    pub night_seconds: u64,
    pub day_speech_seconds: u64,
    pub day_vote_seconds: u64,
    pub settlement_seconds: u64,
}

impl Default for PhaseTimers {
    fn default() -> Self {
        Self {
            night_seconds: 30,
            day_speech_seconds: 45,
            day_vote_seconds: 30,
            settlement_seconds: 20,
        }
    }
}

impl PhaseTimers {
    /// Bounds accepted from room configuration.
    pub const MIN_SECONDS: u64 = 5;
    pub const MAX_SECONDS: u64 = 300;

    /// Whether every budget sits inside the accepted bounds.
    pub fn is_valid(&self) -> bool {
        [
            self.night_seconds,
            self.day_speech_seconds,
            self.day_vote_seconds,
            self.settlement_seconds,
        ]
        .iter()
        .all(|s| (Self::MIN_SECONDS..=Self::MAX_SECONDS).contains(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_state_serializes_camel_case() {
        let state = GamePublicState {
            game_id: uuid::Uuid::nil(),
            room_id: uuid::Uuid::nil(),
            phase: Phase::Night,
            day_no: 0,
            server_now: 1,
            phase_ends_at: 2,
            players: vec![],
            public_log: vec![],
            active_role: Some(NightRole::Werewolf),
            active_speaker_seat: None,
            speaking_queue: vec![],
            sheriff_seat: None,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("phaseEndsAt").is_some());
        assert!(json.get("serverNow").is_some());
        assert_eq!(json["activeRole"], "werewolf");
    }

    #[test]
    fn test_private_state_omits_absent_sections() {
        let state = GamePrivateState {
            role: Role::Villager,
            seat: 3,
            hints: vec![],
            actions: PrivateActions::default(),
            selected_target_seat: None,
            witch_save_decision: None,
            witch_info: None,
            wolf_team: None,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("witchInfo").is_none());
        assert!(json.get("wolfTeam").is_none());
    }

    #[test]
    fn test_phase_timer_bounds() {
        assert!(PhaseTimers::default().is_valid());
        let too_fast = PhaseTimers {
            night_seconds: 1,
            ..PhaseTimers::default()
        };
        assert!(!too_fast.is_valid());
        let too_slow = PhaseTimers {
            day_vote_seconds: 3600,
            ..PhaseTimers::default()
        };
        assert!(!too_slow.is_valid());
    }
}
