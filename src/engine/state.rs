//! Per-game mutable state: the snapshot blob the engine reads, mutates, and
//! atomically replaces on every transition.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::protocol::{
    now_ms, GameEvent, GameId, GamePrivateState, GamePublicState, NightRole, Phase, PhaseTimers,
    PlayerPublic, PrivateActions, PublicLogEntry, ReplayEvent, Role, RoleConfig, RoomId, Seat,
    UserId, UserRef, VoiceTurnInfo, Winner, WitchInfo, WolfTeammate,
};

/// Number of log lines / hints retained in serialized payloads.
pub const LOG_WINDOW: usize = 60;

/// One seated player, sealed at game start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub seat: Seat,
    pub user_id: UserId,
    pub nickname: String,
    pub role: Role,
    pub is_alive: bool,
    pub is_bot: bool,
}

/// Night scratch. The two potion flags persist across nights; everything
/// else clears on each night entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NightScratch {
    /// Wolf ballots in submission order; order breaks victim ties.
    pub wolf_votes: Vec<(UserId, Seat)>,
    pub seer_target: Option<Seat>,
    pub guard_target: Option<Seat>,
    /// `None` = undecided, `Some(use)` = decided
    pub witch_save: Option<bool>,
    /// `None` = undecided, `Some(None)` = decided not to poison
    pub witch_poison: Option<Option<Seat>>,
    pub witch_save_used: bool,
    pub witch_poison_used: bool,
    /// Users done with the active sub-role; cleared at each sub-role entry
    pub acted: Vec<UserId>,
}

/// Day vote scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayScratch {
    /// Ballot per user; `None` target is an abstention
    pub votes: Vec<(UserId, Option<Seat>)>,
    pub stage: u8,
    /// Runoff restriction, present in stage 2 only
    pub candidates: Option<Vec<Seat>>,
}

/// Sheriff election scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionScratch {
    /// Enrolled seats in enrollment order
    pub candidates: Vec<Seat>,
    pub votes: Vec<(UserId, Option<Seat>)>,
    pub stage: u8,
}

/// Settlement scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementScratch {
    pub pending_hunter_seat: Option<Seat>,
}

/// The complete serialized state of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub game_id: GameId,
    pub room_id: RoomId,
    pub room_name: String,
    /// Epoch milliseconds
    pub started_at: i64,

    pub phase: Phase,
    pub day_no: u32,
    /// Epoch milliseconds; strictly monotonically set at each phase entry
    pub phase_ends_at: i64,

    pub players: Vec<Player>,
    pub role_config: RoleConfig,
    pub timers: PhaseTimers,

    pub public_log: Vec<PublicLogEntry>,
    pub hints_by_user_id: HashMap<UserId, Vec<PublicLogEntry>>,

    pub night: NightScratch,
    pub day: DayScratch,
    pub election: ElectionScratch,
    pub settlement: SettlementScratch,

    pub active_role: Option<NightRole>,
    pub active_speaker_seat: Option<Seat>,
    pub speaking_queue: Vec<Seat>,
    pub sheriff_seat: Option<Seat>,

    /// Seats eliminated by the most recent night, in kill order; seeds the
    /// day-speech queue start
    pub last_night_eliminated: Vec<Seat>,

    pub winner: Option<Winner>,
    /// Set once the replay has been archived at finalization
    pub replay_id: Option<uuid::Uuid>,

    next_log_id: u64,
    pub events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(
        game_id: GameId,
        room_id: RoomId,
        room_name: String,
        players: Vec<Player>,
        role_config: RoleConfig,
        timers: PhaseTimers,
        now: i64,
    ) -> Self {
        Self {
            game_id,
            room_id,
            room_name,
            started_at: now,
            phase: Phase::Night,
            day_no: 0,
            phase_ends_at: now,
            players,
            role_config,
            timers,
            public_log: Vec::new(),
            hints_by_user_id: HashMap::new(),
            night: NightScratch::default(),
            day: DayScratch::default(),
            election: ElectionScratch::default(),
            settlement: SettlementScratch::default(),
            active_role: None,
            active_speaker_seat: None,
            speaking_queue: Vec::new(),
            sheriff_seat: None,
            last_night_eliminated: Vec::new(),
            winner: None,
            replay_id: None,
            next_log_id: 0,
            events: Vec::new(),
        }
    }

    // ---- lookups ----

    pub fn player_by_user(&self, user_id: &UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == *user_id)
    }

    pub fn player_by_seat(&self, seat: Seat) -> Option<&Player> {
        self.players.iter().find(|p| p.seat == seat)
    }

    pub fn player_by_seat_mut(&mut self, seat: Seat) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.seat == seat)
    }

    /// Living players, in seat order.
    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    /// Living holders of a role.
    pub fn alive_with_role(&self, role: Role) -> impl Iterator<Item = &Player> {
        self.alive().filter(move |p| p.role == role)
    }

    pub fn is_seat_alive(&self, seat: Seat) -> bool {
        self.player_by_seat(seat).is_some_and(|p| p.is_alive)
    }

    // ---- log / hint / event appenders ----

    fn next_id(&mut self) -> u64 {
        self.next_log_id += 1;
        self.next_log_id
    }

    /// Append a line every observer sees.
    pub fn push_public_log(&mut self, text: impl Into<String>) {
        let entry = PublicLogEntry {
            id: self.next_id(),
            at: now_ms(),
            text: text.into(),
        };
        self.public_log.push(entry);
    }

    /// Append a line only one user sees.
    pub fn push_hint(&mut self, user_id: &UserId, text: impl Into<String>) {
        let entry = PublicLogEntry {
            id: self.next_id(),
            at: now_ms(),
            text: text.into(),
        };
        self.hints_by_user_id
            .entry(user_id.clone())
            .or_default()
            .push(entry);
    }

    /// Append to the replay event log, timestamped against game start.
    pub fn push_event(&mut self, event: ReplayEvent) {
        self.events.push(GameEvent {
            t: now_ms() - self.started_at,
            event,
        });
    }

    /// Allocate a chat message id from the shared counter.
    pub fn next_chat_id(&mut self) -> u64 {
        self.next_id()
    }

    // ---- phase clock ----

    /// Set the phase deadline `duration_secs` from `now`. Deadlines are
    /// strictly monotonic even when cascaded transitions land on the same
    /// millisecond.
    pub fn arm_phase_clock(&mut self, now: i64, duration_secs: u64) {
        let proposed = now + (duration_secs as i64) * 1000;
        self.phase_ends_at = proposed.max(self.phase_ends_at + 1);
    }

    // ---- win evaluation ----

    /// §win rule: no wolves → villagers; wolves ≥ others → werewolves.
    pub fn compute_winner(&self) -> Option<Winner> {
        let alive_wolves = self.alive().filter(|p| p.role.is_wolf()).count();
        let alive_others = self.alive().count() - alive_wolves;
        if alive_wolves == 0 {
            Some(Winner::Villagers)
        } else if alive_wolves >= alive_others {
            Some(Winner::Werewolves)
        } else {
            None
        }
    }

    // ---- projections ----

    /// State every observer may see.
    pub fn to_public(&self, now: i64) -> GamePublicState {
        let mut players: Vec<PlayerPublic> = self
            .players
            .iter()
            .map(|p| PlayerPublic {
                seat: p.seat,
                user: UserRef {
                    id: p.user_id.clone(),
                    nickname: p.nickname.clone(),
                },
                is_alive: p.is_alive,
            })
            .collect();
        players.sort_by_key(|p| p.seat);

        let log_start = self.public_log.len().saturating_sub(LOG_WINDOW);
        GamePublicState {
            game_id: self.game_id,
            room_id: self.room_id,
            phase: self.phase,
            day_no: self.day_no,
            server_now: now,
            phase_ends_at: self.phase_ends_at,
            players,
            public_log: self.public_log[log_start..].to_vec(),
            active_role: self.active_role,
            active_speaker_seat: self.active_speaker_seat,
            speaking_queue: self.speaking_queue.clone(),
            sheriff_seat: self.sheriff_seat,
        }
    }

    /// State only `user_id` may see. `None` when the user is not seated.
    pub fn to_private(&self, user_id: &UserId) -> Option<GamePrivateState> {
        let player = self.player_by_user(user_id)?;

        let hints = self
            .hints_by_user_id
            .get(user_id)
            .map(|hints| {
                let start = hints.len().saturating_sub(LOG_WINDOW);
                hints[start..].to_vec()
            })
            .unwrap_or_default();

        let selected_target_seat = match self.phase {
            Phase::Night => match player.role {
                Role::Werewolf => self
                    .night
                    .wolf_votes
                    .iter()
                    .find(|(uid, _)| uid == user_id)
                    .map(|(_, seat)| *seat),
                Role::Seer => self.night.seer_target,
                Role::Guard => self.night.guard_target,
                Role::Witch => self.night.witch_poison.flatten(),
                _ => None,
            },
            Phase::DayVote => self
                .day
                .votes
                .iter()
                .find(|(uid, _)| uid == user_id)
                .and_then(|(_, seat)| *seat),
            Phase::SheriffVote => self
                .election
                .votes
                .iter()
                .find(|(uid, _)| uid == user_id)
                .and_then(|(_, seat)| *seat),
            _ => None,
        };

        let witch_info = (player.role == Role::Witch).then(|| WitchInfo {
            night_victim_seat: (self.phase == Phase::Night)
                .then(|| self.wolf_victim())
                .flatten(),
            save_used: self.night.witch_save_used,
            poison_used: self.night.witch_poison_used,
        });

        let wolf_team = player.role.is_wolf().then(|| {
            self.players
                .iter()
                .filter(|p| p.role.is_wolf())
                .map(|p| WolfTeammate {
                    seat: p.seat,
                    nickname: p.nickname.clone(),
                    is_alive: p.is_alive,
                })
                .collect()
        });

        Some(GamePrivateState {
            role: player.role,
            seat: player.seat,
            hints,
            actions: PrivateActions {
                hunter_shoot: self.phase == Phase::Settlement
                    && self.settlement.pending_hunter_seat == Some(player.seat),
            },
            selected_target_seat,
            witch_save_decision: self.night.witch_save,
            witch_info,
            wolf_team,
        })
    }

    /// Signaling-authority projection for the voice relay.
    pub fn to_voice_turn(&self, user_id: &UserId) -> Option<VoiceTurnInfo> {
        let player = self.player_by_user(user_id)?;
        let active_speaker_user_id = self
            .active_speaker_seat
            .and_then(|seat| self.player_by_seat(seat))
            .map(|p| p.user_id.clone());
        Some(VoiceTurnInfo {
            game_id: self.game_id,
            phase: self.phase,
            is_speech_phase: self.phase.is_speech_phase(),
            active_speaker_seat: self.active_speaker_seat,
            active_speaker_user_id,
            seat: player.seat,
            user_id: user_id.clone(),
            is_current_speaker: self.phase.is_speech_phase()
                && self.active_speaker_seat == Some(player.seat),
        })
    }

    /// Current wolf-vote plurality victim: most votes, ties broken by the
    /// insertion order of the first ballot naming the seat.
    pub fn wolf_victim(&self) -> Option<Seat> {
        let mut counts: Vec<(Seat, u32)> = Vec::new();
        for (_, seat) in &self.night.wolf_votes {
            match counts.iter_mut().find(|(s, _)| s == seat) {
                Some((_, n)) => *n += 1,
                None => counts.push((*seat, 1)),
            }
        }
        let best = counts.iter().map(|(_, n)| *n).max()?;
        counts
            .iter()
            .find(|(_, n)| *n == best)
            .map(|(seat, _)| *seat)
    }
}
