//! Room Registry: membership, seats, ready flags, role composition, timers,
//! and the waiting-room lifecycle.
//!
//! Durable metadata lives in the document store; the runtime mirror (seats,
//! ready flags, timers) is a snapshot blob under `roomrt:<roomId>` and every
//! mutation is a locked read-modify-write, the same discipline the engine
//! applies to games.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::broadcast::Broadcaster;
use crate::database::{DocumentStore, RoomDoc};
use crate::protocol::{
    now_ms, GameError, GameId, PhaseTimers, RoleConfig, RoomId, RoomState, RoomStatus, SeatState,
    UserId, MAX_ROOM_PLAYERS, MIN_ROOM_PLAYERS, WAITING_ROOM_EXPIRY_SECS,
};
use crate::store::{room_key, SnapshotStore, ROOM_KEY_PREFIX};

/// One seat of the runtime mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMember {
    pub seat: u8,
    pub user_id: Option<UserId>,
    pub nickname: Option<String>,
    pub is_ready: bool,
    pub is_alive: bool,
    pub is_bot: bool,
}

impl SeatMember {
    fn empty(seat: u8) -> Self {
        Self {
            seat,
            user_id: None,
            nickname: None,
            is_ready: false,
            is_alive: true,
            is_bot: false,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Runtime mirror of a room, stored as a snapshot blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRuntime {
    pub room_id: RoomId,
    pub room_number: String,
    pub name: String,
    pub owner_user_id: UserId,
    pub status: RoomStatus,
    pub max_players: u8,
    pub members: Vec<SeatMember>,
    pub role_config: RoleConfig,
    pub timers: PhaseTimers,
    pub game_id: Option<GameId>,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds, refreshed on every mutation; drives the expiry sweep
    pub last_activity_at: i64,
}

impl RoomRuntime {
    /// Occupied seats.
    pub fn seated(&self) -> impl Iterator<Item = &SeatMember> {
        self.members.iter().filter(|m| m.is_occupied())
    }

    pub fn seated_count(&self) -> usize {
        self.seated().count()
    }

    /// Whether every occupied seat has readied up.
    pub fn all_ready(&self) -> bool {
        self.seated().all(|m| m.is_ready)
    }

    /// Seat held by a user, if any.
    pub fn member_of(&self, user_id: &UserId) -> Option<&SeatMember> {
        self.members
            .iter()
            .find(|m| m.user_id.as_ref() == Some(user_id))
    }

    fn member_of_mut(&mut self, user_id: &UserId) -> Option<&mut SeatMember> {
        self.members
            .iter_mut()
            .find(|m| m.user_id.as_ref() == Some(user_id))
    }

    fn first_free_seat(&self) -> Option<u8> {
        self.members.iter().find(|m| !m.is_occupied()).map(|m| m.seat)
    }

    /// Non-bot occupants.
    pub fn human_count(&self) -> usize {
        self.seated().filter(|m| !m.is_bot).count()
    }

    /// Projection broadcast on the room channel.
    pub fn to_state(&self) -> RoomState {
        RoomState {
            room_id: self.room_id,
            room_number: self.room_number.clone(),
            name: self.name.clone(),
            owner_user_id: self.owner_user_id.clone(),
            status: self.status,
            max_players: self.max_players,
            members: self
                .members
                .iter()
                .map(|m| SeatState {
                    seat: m.seat,
                    user_id: m.user_id.clone(),
                    nickname: m.nickname.clone(),
                    is_ready: m.is_ready,
                    is_alive: m.is_alive,
                    is_bot: m.is_bot,
                })
                .collect(),
            role_config: self.role_config,
            timers: self.timers,
            game_id: self.game_id,
            created_at: self.created_at,
        }
    }
}

/// Room Registry service. Conflict domain is `roomId`; cross-room operations
/// run fully parallel.
pub struct RoomRegistry {
    store: Arc<dyn SnapshotStore>,
    db: Arc<dyn DocumentStore>,
    broadcaster: Arc<dyn Broadcaster>,
    default_timers: PhaseTimers,
    locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomRegistry {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        db: Arc<dyn DocumentStore>,
        broadcaster: Arc<dyn Broadcaster>,
        default_timers: PhaseTimers,
    ) -> Self {
        Self {
            store,
            db,
            broadcaster,
            default_timers,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, room_id: &RoomId) -> Arc<Mutex<()>> {
        self.locks
            .entry(*room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load a room's runtime mirror.
    pub async fn load(&self, room_id: &RoomId) -> Result<RoomRuntime, GameError> {
        let blob = self
            .store
            .get(&room_key(room_id))
            .await
            .map_err(GameError::from)?
            .ok_or(GameError::RoomNotFound)?;
        serde_json::from_slice(&blob)
            .map_err(|e| GameError::SnapshotUnavailable(format!("corrupt room snapshot: {e}")))
    }

    async fn save(&self, room: &RoomRuntime) -> Result<(), GameError> {
        let blob = serde_json::to_vec(room)
            .map_err(|e| GameError::SnapshotUnavailable(format!("encode room snapshot: {e}")))?;
        self.store
            .set(&room_key(&room.room_id), blob, None)
            .await
            .map_err(GameError::from)
    }

    async fn push_state(&self, room: &RoomRuntime) {
        let payload = match serde_json::to_value(room.to_state()) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        self.broadcaster
            .emit_room(&room.room_id, "room:state", payload)
            .await;
    }

    /// Create a room owned by `owner_user_id`, seating the owner at seat 1.
    pub async fn create_room(
        &self,
        owner_user_id: UserId,
        owner_nickname: String,
        name: String,
        max_players: u8,
    ) -> Result<RoomState, GameError> {
        if !(MIN_ROOM_PLAYERS..=MAX_ROOM_PLAYERS).contains(&max_players) {
            return Err(GameError::InvalidRoleConfig);
        }

        let room_id = Uuid::new_v4();
        let now = now_ms();
        let mut members: Vec<SeatMember> =
            (1..=max_players).map(SeatMember::empty).collect();
        members[0].user_id = Some(owner_user_id.clone());
        members[0].nickname = Some(owner_nickname);

        let room = RoomRuntime {
            room_id,
            room_number: format!("{}", fastrand::u32(1000..10000)),
            name: name.clone(),
            owner_user_id: owner_user_id.clone(),
            status: RoomStatus::Waiting,
            max_players,
            members,
            role_config: RoleConfig::default(),
            timers: self.default_timers,
            game_id: None,
            created_at: now,
            last_activity_at: now,
        };

        self.db
            .insert_room(RoomDoc {
                id: room_id,
                name,
                owner_user_id,
                status: RoomStatus::Waiting,
                max_players,
                room_number: room.room_number.clone(),
                created_at: now,
            })
            .await
            .map_err(GameError::from)?;
        self.save(&room).await?;

        tracing::info!(%room_id, room_number = %room.room_number, "Room created");
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Seat a user at the first free seat.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        nickname: String,
    ) -> Result<RoomState, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        if room.status != RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }
        if room.member_of(&user_id).is_some() {
            // Rejoining refreshes the nickname and is otherwise a no-op
            if let Some(member) = room.member_of_mut(&user_id) {
                member.nickname = Some(nickname);
            }
        } else {
            let seat = room.first_free_seat().ok_or(GameError::RoomFull)?;
            let member = &mut room.members[usize::from(seat) - 1];
            member.user_id = Some(user_id);
            member.nickname = Some(nickname);
            member.is_ready = false;
            member.is_bot = false;
        }
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Vacate a user's seat. The owner leaving, or the last human leaving,
    /// dissolves the room.
    pub async fn leave_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<Option<RoomState>, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        let seat = room
            .member_of(user_id)
            .map(|m| m.seat)
            .ok_or(GameError::NotInGame)?;

        let leaver_is_owner = room.owner_user_id == *user_id;
        let last_human = room.human_count() <= 1;
        if leaver_is_owner || last_human {
            self.dissolve_locked(room, "owner_left").await?;
            return Ok(None);
        }

        room.members[usize::from(seat) - 1] = SeatMember::empty(seat);
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(Some(room.to_state()))
    }

    /// Flip a member's ready flag.
    pub async fn set_ready(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        ready: bool,
    ) -> Result<RoomState, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        if room.status != RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }
        let member = room.member_of_mut(user_id).ok_or(GameError::NotInGame)?;
        member.is_ready = ready;
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Fill `count` free seats with ready bots. Owner only.
    pub async fn add_bots(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        count: u8,
    ) -> Result<RoomState, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        if room.owner_user_id != *requester {
            return Err(GameError::OnlyOwnerMayConfig);
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }

        for _ in 0..count {
            let Some(seat) = room.first_free_seat() else {
                return Err(GameError::RoomFull);
            };
            let member = &mut room.members[usize::from(seat) - 1];
            member.user_id = Some(format!("bot-{}-{seat}", room.room_number));
            member.nickname = Some(format!("机器人{seat}号"));
            member.is_ready = true;
            member.is_bot = true;
        }
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Replace the room's role composition. Owner only, waiting only.
    pub async fn update_role_config(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        role_config: RoleConfig,
    ) -> Result<RoomState, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        if room.owner_user_id != *requester {
            return Err(GameError::OnlyOwnerMayConfig);
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }
        role_config.validate(usize::from(room.max_players))?;
        room.role_config = role_config;
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Replace the room's phase timers. Owner only, waiting only.
    pub async fn update_timers(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        timers: PhaseTimers,
    ) -> Result<RoomState, GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        if room.owner_user_id != *requester {
            return Err(GameError::OnlyOwnerMayConfig);
        }
        if room.status != RoomStatus::Waiting {
            return Err(GameError::NotPlaying);
        }
        if !timers.is_valid() {
            return Err(GameError::InvalidRoleConfig);
        }
        room.timers = timers;
        room.last_activity_at = now_ms();
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(room.to_state())
    }

    /// Transition a room into `playing` with its game id. Called by the
    /// engine inside `start_game`; the engine holds its own per-room checks.
    pub async fn mark_playing(
        &self,
        room: &mut RoomRuntime,
        game_id: GameId,
    ) -> Result<(), GameError> {
        room.status = RoomStatus::Playing;
        room.game_id = Some(game_id);
        room.last_activity_at = now_ms();
        self.db
            .set_room_status(&room.room_id, RoomStatus::Playing)
            .await
            .map_err(GameError::from)?;
        self.save(room).await
    }

    /// Transition a room into `ended` at game completion.
    pub async fn mark_ended(&self, room_id: &RoomId) -> Result<(), GameError> {
        let lock = self.lock_for(room_id);
        let _guard = lock.lock().await;

        let mut room = self.load(room_id).await?;
        room.status = RoomStatus::Ended;
        room.game_id = None;
        room.last_activity_at = now_ms();
        self.db
            .set_room_status(room_id, RoomStatus::Ended)
            .await
            .map_err(GameError::from)?;
        self.save(&room).await?;
        self.push_state(&room).await;
        Ok(())
    }

    async fn dissolve_locked(&self, room: RoomRuntime, reason: &str) -> Result<(), GameError> {
        self.store
            .del(&room_key(&room.room_id))
            .await
            .map_err(GameError::from)?;
        self.db
            .delete_room(&room.room_id)
            .await
            .map_err(GameError::from)?;
        self.locks.remove(&room.room_id);

        tracing::info!(room_id = %room.room_id, %reason, "Room dissolved");
        self.broadcaster
            .emit_room(
                &room.room_id,
                "room:dissolved",
                serde_json::json!({ "roomId": room.room_id, "reason": reason }),
            )
            .await;
        Ok(())
    }

    /// Dissolve waiting rooms idle longer than the expiry window. Returns the
    /// number of rooms removed.
    pub async fn sweep_expired(&self) -> Result<usize, GameError> {
        let keys = self
            .store
            .keys(ROOM_KEY_PREFIX)
            .await
            .map_err(GameError::from)?;
        let cutoff = now_ms() - WAITING_ROOM_EXPIRY_SECS * 1000;

        let mut dissolved = 0usize;
        for key in keys {
            let Some(room_id) = key
                .strip_prefix(ROOM_KEY_PREFIX)
                .and_then(|raw| raw.parse::<Uuid>().ok())
            else {
                continue;
            };
            let lock = self.lock_for(&room_id);
            let _guard = lock.lock().await;
            let Ok(room) = self.load(&room_id).await else {
                continue;
            };
            if room.status == RoomStatus::Waiting && room.last_activity_at <= cutoff {
                self.dissolve_locked(room, "waiting_expired").await?;
                dissolved += 1;
            }
        }
        Ok(dissolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;
    use crate::database::InMemoryDocumentStore;
    use crate::store::InMemorySnapshotStore;

    fn registry() -> (RoomRegistry, Arc<RecordingBroadcaster>) {
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let registry = RoomRegistry::new(
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
            broadcaster.clone(),
            PhaseTimers::default(),
        );
        (registry, broadcaster)
    }

    #[tokio::test]
    async fn test_create_room_seats_owner_first() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "爱丽丝".into(), "狼人局".into(), 6)
            .await
            .unwrap();

        assert_eq!(state.members.len(), 6);
        assert_eq!(state.members[0].user_id.as_deref(), Some("alice"));
        assert_eq!(state.room_number.len(), 4);
        assert_eq!(state.status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn test_join_fills_seats_until_full() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 4)
            .await
            .unwrap();
        for (i, name) in ["bob", "carol", "dave"].iter().enumerate() {
            let joined = registry
                .join_room(&state.room_id, name.to_string(), name.to_string())
                .await
                .unwrap();
            assert_eq!(joined.members[i + 1].user_id.as_deref(), Some(*name));
        }

        let overflow = registry
            .join_room(&state.room_id, "eve".into(), "eve".into())
            .await;
        assert_eq!(overflow.unwrap_err(), GameError::RoomFull);
    }

    #[tokio::test]
    async fn test_owner_leaving_dissolves_room() {
        let (registry, broadcaster) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 4)
            .await
            .unwrap();
        registry
            .join_room(&state.room_id, "bob".into(), "bob".into())
            .await
            .unwrap();

        let outcome = registry
            .leave_room(&state.room_id, &"alice".to_string())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(
            registry.load(&state.room_id).await.unwrap_err(),
            GameError::RoomNotFound
        );

        let emissions = broadcaster.emissions().await;
        assert!(emissions.iter().any(|e| e.event == "room:dissolved"));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_configure() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 6)
            .await
            .unwrap();
        registry
            .join_room(&state.room_id, "bob".into(), "bob".into())
            .await
            .unwrap();

        let result = registry
            .update_role_config(&state.room_id, &"bob".to_string(), RoleConfig::default())
            .await;
        assert_eq!(result.unwrap_err(), GameError::OnlyOwnerMayConfig);

        let result = registry
            .add_bots(&state.room_id, &"bob".to_string(), 1)
            .await;
        assert_eq!(result.unwrap_err(), GameError::OnlyOwnerMayConfig);
    }

    #[tokio::test]
    async fn test_add_bots_fills_ready_seats() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 4)
            .await
            .unwrap();
        let state = registry
            .add_bots(&state.room_id, &"alice".to_string(), 3)
            .await
            .unwrap();

        let bots: Vec<_> = state.members.iter().filter(|m| m.is_bot).collect();
        assert_eq!(bots.len(), 3);
        assert!(bots.iter().all(|m| m.is_ready));
    }

    #[tokio::test]
    async fn test_invalid_timers_rejected() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 6)
            .await
            .unwrap();
        let bad = PhaseTimers {
            night_seconds: 0,
            ..PhaseTimers::default()
        };
        let result = registry
            .update_timers(&state.room_id, &"alice".to_string(), bad)
            .await;
        assert_eq!(result.unwrap_err(), GameError::InvalidRoleConfig);
    }

    #[tokio::test]
    async fn test_sweep_dissolves_stale_waiting_rooms() {
        let (registry, _) = registry();
        let state = registry
            .create_room("alice".into(), "a".into(), "room".into(), 4)
            .await
            .unwrap();

        // Nothing stale yet
        assert_eq!(registry.sweep_expired().await.unwrap(), 0);

        // Backdate the room's activity past the expiry window
        let mut room = registry.load(&state.room_id).await.unwrap();
        room.last_activity_at = now_ms() - (WAITING_ROOM_EXPIRY_SECS + 1) * 1000;
        registry.save(&room).await.unwrap();

        assert_eq!(registry.sweep_expired().await.unwrap(), 1);
        assert_eq!(
            registry.load(&state.room_id).await.unwrap_err(),
            GameError::RoomNotFound
        );
    }
}
