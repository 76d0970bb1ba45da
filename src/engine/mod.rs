//! Game Engine: phase state machine, action resolver, bot driver, timer
//! advancer, and win evaluator.
//!
//! Every operation on a game is a locked read-modify-write against the
//! snapshot store: load snapshot, mutate, store snapshot. The per-game lock
//! spans the whole cycle; the only suspension points inside it are the
//! collaborator calls (store, document store, broadcaster, room registry).
//! Cross-game operations run fully parallel.

pub mod bots;
pub mod night;
pub mod settlement;
pub mod speech;
pub mod state;
pub mod vote;

use dashmap::DashMap;
use rand::rngs::{StdRng, SysRng};
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::broadcast::{Broadcaster, RecipientList};
use crate::database::{DocumentStore, ReplayDoc};
use crate::protocol::{
    now_ms, ChatChannel, ChatMessage, GameError, GameId, GamePrivateState, GamePublicState, Phase,
    PlayerAction, RoomId, RoomState, UserId, VoiceTurnInfo,
};
use crate::rooms::{RoomRegistry, RoomRuntime};
use crate::store::{game_key, SnapshotStore, ACTIVE_GAMES_SET};

use state::{GameState, Player};

/// How long a finished game's snapshot stays readable for late pollers.
const GAME_OVER_SNAPSHOT_TTL: Duration = Duration::from_secs(600);

/// Result of a player action: fresh projections plus the users whose private
/// view changed.
#[derive(Debug)]
pub struct ActionOutcome {
    pub room_state: Option<RoomState>,
    pub game_public: GamePublicState,
    pub private_user_ids: Vec<UserId>,
}

/// Result of a timeout advance, forwarded to the broadcaster by the pump.
///
/// Private projections ride along because the game may have been finalized
/// within the very tick that produced them.
#[derive(Debug)]
pub struct AdvanceOutcome {
    pub room_id: RoomId,
    pub game_public: GamePublicState,
    pub room_state: Option<RoomState>,
    pub private_user_ids: Vec<UserId>,
    pub private_states: Vec<(UserId, GamePrivateState)>,
}

/// The core engine. Holds no game state of its own; everything lives in the
/// snapshot store and is serialized per game id through `locks`.
pub struct GameEngine {
    store: Arc<dyn SnapshotStore>,
    db: Arc<dyn DocumentStore>,
    broadcaster: Arc<dyn Broadcaster>,
    rooms: Arc<RoomRegistry>,
    locks: DashMap<GameId, Arc<Mutex<()>>>,
    rng: Mutex<StdRng>,
}

impl GameEngine {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        db: Arc<dyn DocumentStore>,
        broadcaster: Arc<dyn Broadcaster>,
        rooms: Arc<RoomRegistry>,
    ) -> Self {
        Self::with_rng(
            store,
            db,
            broadcaster,
            rooms,
            StdRng::try_from_rng(&mut SysRng).expect("failed to seed RNG from OS entropy source"),
        )
    }

    /// Deterministic RNG for tests: role shuffles and bot moves replay
    /// identically for a given seed.
    pub fn with_rng(
        store: Arc<dyn SnapshotStore>,
        db: Arc<dyn DocumentStore>,
        broadcaster: Arc<dyn Broadcaster>,
        rooms: Arc<RoomRegistry>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            db,
            broadcaster,
            rooms,
            locks: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    fn lock_for(&self, game_id: &GameId) -> Arc<Mutex<()>> {
        self.locks
            .entry(*game_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- snapshot plumbing ----

    async fn load_state(&self, game_id: &GameId) -> Result<GameState, GameError> {
        let blob = self
            .store
            .get(&game_key(game_id))
            .await
            .map_err(GameError::from)?
            .ok_or(GameError::GameNotFound)?;
        serde_json::from_slice(&blob)
            .map_err(|e| GameError::SnapshotUnavailable(format!("corrupt game snapshot: {e}")))
    }

    async fn store_state(&self, state: &GameState) -> Result<(), GameError> {
        let blob = serde_json::to_vec(state)
            .map_err(|e| GameError::SnapshotUnavailable(format!("encode game snapshot: {e}")))?;
        let ttl = (state.phase == Phase::GameOver).then_some(GAME_OVER_SNAPSHOT_TTL);
        self.store
            .set(&game_key(&state.game_id), blob, ttl)
            .await
            .map_err(GameError::from)
    }

    async fn game_id_of_room(&self, room_id: &RoomId) -> Result<(RoomRuntime, GameId), GameError> {
        let room = self.rooms.load(room_id).await?;
        let game_id = room.game_id.ok_or(GameError::NotPlaying)?;
        Ok((room, game_id))
    }

    // ---- fan-out ----

    async fn push_game_state(&self, state: &GameState, private_user_ids: &[UserId]) {
        let now = now_ms();
        if let Ok(payload) = serde_json::to_value(state.to_public(now)) {
            self.broadcaster
                .emit_room(&state.room_id, "game:state", payload)
                .await;
        }
        for user_id in private_user_ids {
            if let Some(private) = state.to_private(user_id) {
                if let Ok(payload) = serde_json::to_value(private) {
                    self.broadcaster
                        .emit_user(user_id, "game:private", payload)
                        .await;
                }
            }
        }
    }

    fn all_user_ids(state: &GameState) -> Vec<UserId> {
        state.players.iter().map(|p| p.user_id.clone()).collect()
    }

    // ---- operations ----

    /// Start the game in a full, all-ready room. Owner only.
    pub async fn start_game(
        &self,
        room_id: &RoomId,
        requester: &UserId,
    ) -> Result<(RoomState, GamePublicState), GameError> {
        let mut room = self.rooms.load(room_id).await?;

        if room.owner_user_id != *requester {
            return Err(GameError::OnlyOwnerMayStart);
        }
        if room.status != crate::protocol::RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }
        let seated = room.seated_count();
        let capacity = usize::from(room.max_players);
        if seated < capacity {
            return Err(GameError::NeedBots((capacity - seated) as u8));
        }
        if !room.all_ready() {
            return Err(GameError::NotAllReady);
        }
        room.role_config.validate(capacity)?;

        let roles = {
            let mut rng = self.rng.lock().await;
            room.role_config.deal(capacity, &mut *rng)?
        };
        let players: Vec<Player> = room
            .members
            .iter()
            .zip(roles)
            .map(|(member, role)| Player {
                seat: member.seat,
                // Preconditions guarantee every seat is occupied
                user_id: member.user_id.clone().unwrap_or_default(),
                nickname: member.nickname.clone().unwrap_or_default(),
                role,
                is_alive: true,
                is_bot: member.is_bot,
            })
            .collect();

        let game_id = Uuid::new_v4();
        let now = now_ms();
        let mut state = GameState::new(
            game_id,
            *room_id,
            room.name.clone(),
            players,
            room.role_config,
            room.timers,
            now,
        );
        state.begin_night(now);

        self.store_state(&state).await?;
        self.store
            .s_add(ACTIVE_GAMES_SET, &game_id.to_string())
            .await
            .map_err(GameError::from)?;
        self.rooms.mark_playing(&mut room, game_id).await?;

        tracing::info!(%game_id, %room_id, players = state.players.len(), "Game started");

        let private_user_ids = Self::all_user_ids(&state);
        self.push_game_state(&state, &private_user_ids).await;
        if let Ok(payload) = serde_json::to_value(room.to_state()) {
            self.broadcaster
                .emit_room(room_id, "room:state", payload)
                .await;
        }
        Ok((room.to_state(), state.to_public(now)))
    }

    /// Validate and apply one player action, cascading any phase advance it
    /// completes.
    pub async fn submit_action(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        action: PlayerAction,
    ) -> Result<ActionOutcome, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let lock = self.lock_for(&game_id);
        let _guard = lock.lock().await;

        let mut state = self.load_state(&game_id).await?;
        if state.phase == Phase::GameOver {
            return Err(GameError::PhaseForbidsAction);
        }
        if state.player_by_user(user_id).is_none() {
            return Err(GameError::NotInGame);
        }

        let now = now_ms();
        let before = (state.phase, state.active_role, state.active_speaker_seat);

        let mut private_user_ids: Vec<UserId> = Vec::new();
        match &action {
            PlayerAction::WolfKill { target_seat } => {
                state.apply_wolf_kill(user_id, *target_seat)?;
                Self::cascade_night(&mut state, now);
            }
            PlayerAction::SeerCheck { target_seat } => {
                state.apply_seer_check(user_id, *target_seat)?;
                private_user_ids.push(user_id.clone());
                Self::cascade_night(&mut state, now);
            }
            PlayerAction::GuardProtect { target_seat } => {
                state.apply_guard_protect(user_id, *target_seat)?;
                Self::cascade_night(&mut state, now);
            }
            PlayerAction::WitchSave { use_potion } => {
                state.apply_witch_save(user_id, *use_potion)?;
                Self::cascade_night(&mut state, now);
            }
            PlayerAction::WitchPoison { target_seat } => {
                state.apply_witch_poison(user_id, *target_seat)?;
                Self::cascade_night(&mut state, now);
            }
            PlayerAction::SheriffEnroll => state.apply_sheriff_enroll(user_id)?,
            PlayerAction::SheriffQuit => state.apply_sheriff_quit(user_id)?,
            PlayerAction::SheriffVote { target_seat } => {
                state.apply_sheriff_vote(user_id, *target_seat)?;
                self.fill_sheriff_bot_votes(&mut state).await;
                if state.sheriff_votes_complete() {
                    state.resolve_sheriff_vote(now);
                }
            }
            PlayerAction::DayVote { target_seat } => {
                state.apply_day_vote(user_id, *target_seat)?;
                self.fill_day_bot_votes(&mut state).await;
                if state.day_votes_complete() {
                    state.resolve_day_vote(now);
                }
            }
            PlayerAction::HunterShoot { target_seat } => {
                state.apply_hunter_shoot(user_id, *target_seat)?;
            }
            PlayerAction::NextSpeaker => {
                state.apply_next_speaker(user_id)?;
                if state.advance_speaker(now) {
                    match state.phase {
                        Phase::SheriffSpeech => state.begin_sheriff_vote(now),
                        _ => state.begin_day_vote(now),
                    }
                }
            }
        }

        let room_state = self.finalize_if_over(&mut state).await?;
        self.store_state(&state).await?;

        let after = (state.phase, state.active_role, state.active_speaker_seat);
        if before != after || state.phase == Phase::GameOver {
            // A cascaded transition changes what every player may see
            private_user_ids = Self::all_user_ids(&state);
        }

        self.push_game_state(&state, &private_user_ids).await;

        Ok(ActionOutcome {
            room_state,
            game_public: state.to_public(now_ms()),
            private_user_ids,
        })
    }

    /// Advance a game whose phase deadline has passed. Returns `None` while
    /// the deadline is in the future or the game is already over; repeated
    /// calls after a deadline are idempotent up to the next transition.
    pub async fn advance_game_on_timeout(
        &self,
        game_id: &GameId,
    ) -> Result<Option<AdvanceOutcome>, GameError> {
        let lock = self.lock_for(game_id);
        let _guard = lock.lock().await;

        let mut state = match self.load_state(game_id).await {
            Ok(state) => state,
            Err(GameError::GameNotFound) => {
                // Stale id in the active set; drop it
                self.store
                    .s_rem(ACTIVE_GAMES_SET, &game_id.to_string())
                    .await
                    .map_err(GameError::from)?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if state.phase == Phase::GameOver {
            return Ok(None);
        }
        let now = now_ms();
        if now < state.phase_ends_at {
            return Ok(None);
        }

        match state.phase {
            Phase::Night => {
                self.fill_night_bot_actions(&mut state).await;
                if state.advance_subrole(now) {
                    state.resolve_night(now);
                }
            }
            Phase::SheriffElection => state.finish_sheriff_election(now),
            Phase::SheriffSpeech => {
                if state.advance_speaker(now) {
                    state.begin_sheriff_vote(now);
                }
            }
            Phase::SheriffVote => {
                self.fill_sheriff_bot_votes(&mut state).await;
                state.resolve_sheriff_vote(now);
            }
            Phase::DaySpeech => {
                if state.advance_speaker(now) {
                    state.begin_day_vote(now);
                }
            }
            Phase::DayVote => {
                self.fill_day_bot_votes(&mut state).await;
                state.resolve_day_vote(now);
            }
            Phase::Settlement => {
                if let Some(seat) = state.settlement.pending_hunter_seat {
                    let shot = if bots::pending_hunter_is_bot(&state) {
                        let mut rng = self.rng.lock().await;
                        bots::hunter_shot(&state, &mut *rng)
                    } else {
                        None
                    };
                    state.resolve_hunter_shot(seat, shot, now);
                }
            }
            Phase::GameOver => unreachable!("terminal phase checked above"),
        }

        let room_state = self.finalize_if_over(&mut state).await?;
        self.store_state(&state).await?;

        let private_user_ids = Self::all_user_ids(&state);
        let private_states = private_user_ids
            .iter()
            .filter_map(|uid| state.to_private(uid).map(|p| (uid.clone(), p)))
            .collect();
        Ok(Some(AdvanceOutcome {
            room_id: state.room_id,
            game_public: state.to_public(now_ms()),
            room_state,
            private_user_ids,
            private_states,
        }))
    }

    /// Append a chat line. Public chat requires the floor; wolf chat fans
    /// out to wolves only and is never recorded.
    pub async fn append_chat(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        nickname: &str,
        text: &str,
        channel: ChatChannel,
    ) -> Result<ChatMessage, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let lock = self.lock_for(&game_id);
        let _guard = lock.lock().await;

        let mut state = self.load_state(&game_id).await?;
        if state.phase == Phase::GameOver {
            return Err(GameError::PhaseForbidsAction);
        }
        let player = state.player_by_user(user_id).ok_or(GameError::NotInGame)?;
        if !player.is_alive {
            return Err(GameError::PlayerDead);
        }
        let seat = player.seat;
        let is_wolf = player.role.is_wolf();

        match channel {
            ChatChannel::Public => {
                if !state.phase.is_speech_phase() {
                    return Err(GameError::PhaseForbidsAction);
                }
                if state.active_speaker_seat != Some(seat) {
                    return Err(GameError::NotYourTurn);
                }
                let message = ChatMessage {
                    id: state.next_chat_id(),
                    at: now_ms(),
                    seat,
                    nickname: nickname.to_string(),
                    text: text.to_string(),
                    channel,
                };
                state.push_public_log(format!("{seat}号：{text}"));
                state.push_event(crate::protocol::ReplayEvent::ChatMessage {
                    seat,
                    nickname: nickname.to_string(),
                    text: text.to_string(),
                });
                self.store_state(&state).await?;

                if let Ok(payload) = serde_json::to_value(&message) {
                    self.broadcaster
                        .emit_room(room_id, "chat:new", payload)
                        .await;
                }
                Ok(message)
            }
            ChatChannel::Wolf => {
                if !is_wolf {
                    return Err(GameError::NotWolfChannel);
                }
                // Ephemeral by design: not in the public log, not in the
                // replay events, and the snapshot is left untouched
                let message = ChatMessage {
                    id: now_ms() as u64,
                    at: now_ms(),
                    seat,
                    nickname: nickname.to_string(),
                    text: text.to_string(),
                    channel,
                };
                let wolves: RecipientList = state
                    .players
                    .iter()
                    .filter(|p| p.role.is_wolf())
                    .map(|p| p.user_id.clone())
                    .collect();
                if let Ok(payload) = serde_json::to_value(&message) {
                    for wolf in &wolves {
                        self.broadcaster
                            .emit_user(wolf, "chat:new", payload.clone())
                            .await;
                    }
                }
                Ok(message)
            }
        }
    }

    // ---- bot helpers ----

    fn cascade_night(state: &mut GameState, now: i64) {
        // Humans completing a sub-role advance it; bots hold theirs until
        // the timeout tick so clients see the announcement frame first
        while state.phase == Phase::Night && state.subrole_complete() {
            if state.advance_subrole(now) {
                state.resolve_night(now);
            }
        }
    }

    async fn fill_night_bot_actions(&self, state: &mut GameState) {
        let actions = {
            let mut rng = self.rng.lock().await;
            bots::night_actions(state, &mut *rng)
        };
        for (user_id, action) in actions {
            let applied = match action {
                PlayerAction::WolfKill { target_seat } => {
                    state.apply_wolf_kill(&user_id, target_seat)
                }
                PlayerAction::SeerCheck { target_seat } => {
                    state.apply_seer_check(&user_id, target_seat)
                }
                PlayerAction::GuardProtect { target_seat } => {
                    state.apply_guard_protect(&user_id, target_seat)
                }
                PlayerAction::WitchSave { use_potion } => {
                    state.apply_witch_save(&user_id, use_potion)
                }
                PlayerAction::WitchPoison { target_seat } => {
                    state.apply_witch_poison(&user_id, target_seat)
                }
                _ => Ok(()),
            };
            if let Err(e) = applied {
                tracing::debug!(%user_id, error = %e, "Bot night action rejected");
            }
        }
    }

    async fn fill_day_bot_votes(&self, state: &mut GameState) {
        let fills = {
            let mut rng = self.rng.lock().await;
            bots::day_vote_fills(state, &mut *rng)
        };
        for (user_id, action) in fills {
            if let PlayerAction::DayVote { target_seat } = action {
                if let Err(e) = state.apply_day_vote(&user_id, target_seat) {
                    tracing::debug!(%user_id, error = %e, "Bot day vote rejected");
                }
            }
        }
    }

    async fn fill_sheriff_bot_votes(&self, state: &mut GameState) {
        let fills = {
            let mut rng = self.rng.lock().await;
            bots::sheriff_vote_fills(state, &mut *rng)
        };
        for (user_id, action) in fills {
            if let PlayerAction::SheriffVote { target_seat } = action {
                if let Err(e) = state.apply_sheriff_vote(&user_id, target_seat) {
                    tracing::debug!(%user_id, error = %e, "Bot sheriff vote rejected");
                }
            }
        }
    }

    // ---- finalization ----

    /// If the game just reached `game_over`, archive the replay, retire the
    /// game from the active set, and end the room. Returns the updated room
    /// state when that happened.
    async fn finalize_if_over(
        &self,
        state: &mut GameState,
    ) -> Result<Option<RoomState>, GameError> {
        if state.phase != Phase::GameOver || state.replay_id.is_some() {
            return Ok(None);
        }
        let winner = match state.winner {
            Some(winner) => winner,
            None => return Ok(None),
        };

        let now = now_ms();
        let replay_id = Uuid::new_v4();
        let mut owner_user_ids: Vec<UserId> = Vec::new();
        for player in &state.players {
            if !owner_user_ids.contains(&player.user_id) {
                owner_user_ids.push(player.user_id.clone());
            }
        }

        self.db
            .insert_replay(ReplayDoc {
                id: replay_id,
                game_id: state.game_id,
                room_id: state.room_id,
                room_name: state.room_name.clone(),
                owner_user_ids: owner_user_ids.clone(),
                created_at: now,
                duration_ms: now - state.started_at,
                result_summary: winner.announcement().to_string(),
                events: state.events.clone(),
            })
            .await
            .map_err(GameError::from)?;

        state.replay_id = Some(replay_id);
        for user_id in owner_user_ids {
            state.push_hint(&user_id, format!("对局已结束，回放编号：{replay_id}"));
        }

        self.store
            .s_rem(ACTIVE_GAMES_SET, &state.game_id.to_string())
            .await
            .map_err(GameError::from)?;
        self.rooms.mark_ended(&state.room_id).await?;

        tracing::info!(
            game_id = %state.game_id,
            %replay_id,
            winner = ?winner,
            "Game finished"
        );
        let room = self.rooms.load(&state.room_id).await?;
        Ok(Some(room.to_state()))
    }

    // ---- read-only projections ----

    /// Public game state for a room's running game.
    pub async fn get_game_public_state(
        &self,
        room_id: &RoomId,
    ) -> Result<GamePublicState, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let state = self.load_state(&game_id).await?;
        Ok(state.to_public(now_ms()))
    }

    /// Private game state for one seated user.
    pub async fn get_game_private_state(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<GamePrivateState, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let state = self.load_state(&game_id).await?;
        state.to_private(user_id).ok_or(GameError::NotInGame)
    }

    /// User ids of every werewolf, for wolf-channel fan-out.
    pub async fn get_wolf_user_ids(&self, room_id: &RoomId) -> Result<Vec<UserId>, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let state = self.load_state(&game_id).await?;
        Ok(state
            .players
            .iter()
            .filter(|p| p.role.is_wolf())
            .map(|p| p.user_id.clone())
            .collect())
    }

    /// Signaling-authority projection for the voice relay.
    pub async fn get_voice_turn_info(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<VoiceTurnInfo, GameError> {
        let (_, game_id) = self.game_id_of_room(room_id).await?;
        let state = self.load_state(&game_id).await?;
        state.to_voice_turn(user_id).ok_or(GameError::NotInGame)
    }

    /// Games the Timer Pump should tick.
    pub async fn list_active_game_ids(&self) -> Result<Vec<GameId>, GameError> {
        let members = self
            .store
            .s_members(ACTIVE_GAMES_SET)
            .await
            .map_err(GameError::from)?;
        Ok(members
            .iter()
            .filter_map(|raw| raw.parse::<Uuid>().ok())
            .collect())
    }
}
