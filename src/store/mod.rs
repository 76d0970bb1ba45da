//! Snapshot Store port: opaque blob get/put plus the `games:active` set.
//!
//! The engine performs all game mutations as read-modify-write cycles against
//! this store; the in-memory adapter backs tests and single-instance
//! deployments. A Redis-shaped backend can implement the same trait without
//! touching the engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::protocol::{GameError, GameId, RoomId};

/// Set holding the ids the Timer Pump ticks.
pub const ACTIVE_GAMES_SET: &str = "games:active";

/// Key prefix for game runtime snapshots.
pub const GAME_KEY_PREFIX: &str = "gamert:";
/// Key prefix for room runtime snapshots.
pub const ROOM_KEY_PREFIX: &str = "roomrt:";

/// Snapshot key for one game.
pub fn game_key(game_id: &GameId) -> String {
    format!("{GAME_KEY_PREFIX}{game_id}")
}

/// Snapshot key for one room.
pub fn room_key(room_id: &RoomId) -> String {
    format!("{ROOM_KEY_PREFIX}{room_id}")
}

/// Errors surfaced by snapshot store backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => GameError::SnapshotUnavailable(msg),
        }
    }
}

/// Key-value + set store holding per-game runtime snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch a blob, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a blob, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    /// Delete a blob. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Add a member to an ordered set. Re-adding keeps the original position.
    async fn s_add(&self, set: &str, member: &str) -> Result<(), StoreError>;

    /// Remove a member from a set.
    async fn s_rem(&self, set: &str, member: &str) -> Result<(), StoreError>;

    /// Enumerate a set in insertion order. The view may be eventually
    /// consistent with concurrent adds and removes.
    async fn s_members(&self, set: &str) -> Result<Vec<String>, StoreError>;

    /// Enumerate keys under a prefix. Used by expiry sweeps; may be
    /// approximate.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Whether a key currently holds a live blob.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct BlobEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl BlobEntry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }
}

/// In-memory snapshot store for tests and single-instance deployments.
///
/// Expired entries are dropped lazily on access, the same way the lock
/// registry cleans up in passing.
pub struct InMemorySnapshotStore {
    blobs: Arc<RwLock<HashMap<String, BlobEntry>>>,
    /// Insertion-ordered sets
    sets: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            sets: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(
            key.to_string(),
            BlobEntry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut blobs = self.blobs.write().await;
        blobs.remove(key);
        Ok(())
    }

    async fn s_add(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        let members = sets.entry(set.to_string()).or_default();
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
        }
        Ok(())
    }

    async fn s_rem(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        if let Some(members) = sets.get_mut(set) {
            members.retain(|m| m != member);
        }
        Ok(())
    }

    async fn s_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        let sets = self.sets.read().await;
        Ok(sets.get(set).cloned().unwrap_or_default())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live())
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(key).is_some_and(BlobEntry::is_live))
    }
}
