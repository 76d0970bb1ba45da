//! Document Store port: durable room metadata and replay archives.
//!
//! Two collections, `rooms` and `replays`. The engine writes a replay
//! exactly once per game, at finalization; room documents track the durable
//! half of the room lifecycle while the snapshot store holds the runtime
//! mirror.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::protocol::{GameEvent, GameError, GameId, RoomId, RoomStatus, UserId};

/// Errors surfaced by document store backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for GameError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Unavailable(msg) => GameError::DbUnavailable(msg),
        }
    }
}

/// Durable room document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoc {
    #[serde(rename = "_id")]
    pub id: RoomId,
    pub name: String,
    pub owner_user_id: UserId,
    pub status: RoomStatus,
    pub max_players: u8,
    pub room_number: String,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Archived replay of one completed game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayDoc {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub game_id: GameId,
    pub room_id: RoomId,
    pub room_name: String,
    pub owner_user_ids: Vec<UserId>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub duration_ms: i64,
    pub result_summary: String,
    pub events: Vec<GameEvent>,
}

/// Database abstraction over the two durable collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a freshly created room document.
    async fn insert_room(&self, room: RoomDoc) -> Result<(), DbError>;

    /// Fetch a room document by id.
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomDoc>, DbError>;

    /// Update a room's lifecycle status.
    async fn set_room_status(&self, room_id: &RoomId, status: RoomStatus) -> Result<(), DbError>;

    /// Remove a dissolved room's document.
    async fn delete_room(&self, room_id: &RoomId) -> Result<(), DbError>;

    /// Archive a completed game's replay. Returns the replay id.
    async fn insert_replay(&self, replay: ReplayDoc) -> Result<Uuid, DbError>;

    /// Replays owned by a user, newest first.
    async fn replays_by_owner(&self, user_id: &UserId) -> Result<Vec<ReplayDoc>, DbError>;

    /// Health check.
    async fn health_check(&self) -> bool;
}

/// In-memory document store for tests and single-instance deployments.
pub struct InMemoryDocumentStore {
    rooms: Arc<RwLock<HashMap<RoomId, RoomDoc>>>,
    replays: Arc<RwLock<Vec<ReplayDoc>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            replays: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_room(&self, room: RoomDoc) -> Result<(), DbError> {
        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id, room);
        Ok(())
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomDoc>, DbError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).cloned())
    }

    async fn set_room_status(&self, room_id: &RoomId, status: RoomStatus) -> Result<(), DbError> {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(room_id) {
            room.status = status;
        }
        Ok(())
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<(), DbError> {
        let mut rooms = self.rooms.write().await;
        rooms.remove(room_id);
        Ok(())
    }

    async fn insert_replay(&self, replay: ReplayDoc) -> Result<Uuid, DbError> {
        let id = replay.id;
        let mut replays = self.replays.write().await;
        replays.push(replay);
        Ok(id)
    }

    async fn replays_by_owner(&self, user_id: &UserId) -> Result<Vec<ReplayDoc>, DbError> {
        let replays = self.replays.read().await;
        let mut owned: Vec<ReplayDoc> = replays
            .iter()
            .filter(|replay| replay.owner_user_ids.iter().any(|owner| owner == user_id))
            .cloned()
            .collect();
        owned.sort_by_key(|replay| std::cmp::Reverse(replay.created_at));
        Ok(owned)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::now_ms;

    fn sample_room(owner: &str) -> RoomDoc {
        RoomDoc {
            id: Uuid::new_v4(),
            name: "狼人杀".to_string(),
            owner_user_id: owner.to_string(),
            status: RoomStatus::Waiting,
            max_players: 9,
            room_number: "1024".to_string(),
            created_at: now_ms(),
        }
    }

    fn sample_replay(owners: &[&str], created_at: i64) -> ReplayDoc {
        ReplayDoc {
            id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            room_name: "room".to_string(),
            owner_user_ids: owners.iter().map(|s| s.to_string()).collect(),
            created_at,
            duration_ms: 90_000,
            result_summary: "狼人胜利".to_string(),
            events: vec![],
        }
    }

    #[tokio::test]
    async fn test_room_lifecycle() {
        let db = InMemoryDocumentStore::new();
        let room = sample_room("alice");
        let room_id = room.id;

        db.insert_room(room).await.unwrap();
        assert_eq!(
            db.get_room(&room_id).await.unwrap().unwrap().status,
            RoomStatus::Waiting
        );

        db.set_room_status(&room_id, RoomStatus::Playing)
            .await
            .unwrap();
        assert_eq!(
            db.get_room(&room_id).await.unwrap().unwrap().status,
            RoomStatus::Playing
        );

        db.delete_room(&room_id).await.unwrap();
        assert!(db.get_room(&room_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replays_by_owner_newest_first() {
        let db = InMemoryDocumentStore::new();
        db.insert_replay(sample_replay(&["alice", "bob"], 100))
            .await
            .unwrap();
        db.insert_replay(sample_replay(&["alice"], 300))
            .await
            .unwrap();
        db.insert_replay(sample_replay(&["carol"], 200))
            .await
            .unwrap();

        let alices = db.replays_by_owner(&"alice".to_string()).await.unwrap();
        assert_eq!(alices.len(), 2);
        assert_eq!(alices[0].created_at, 300);
        assert_eq!(alices[1].created_at, 100);

        assert!(db
            .replays_by_owner(&"nobody".to_string())
            .await
            .unwrap()
            .is_empty());
    }
}
