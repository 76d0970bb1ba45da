//! Broadcaster port: fire-and-forget fan-out to room and user channels.
//!
//! Delivery is best-effort and unordered relative to other channels; emit
//! failures are swallowed by callers. Clients that miss a push recover via
//! the poll endpoint.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::protocol::{sanitize_channel_component, RoomId, UserId};

/// Typical seat count; recipient lists up to this size stay on the stack.
pub const TYPICAL_ROOM_SIZE: usize = 12;

/// Stack-friendly list of user ids receiving a private emission.
pub type RecipientList = SmallVec<[UserId; TYPICAL_ROOM_SIZE]>;

/// Channel name for a room.
pub fn room_channel(room_id: &RoomId) -> String {
    format!("room-{room_id}")
}

/// Channel name for a user, with the id sanitized to the safe alphabet.
pub fn user_channel(user_id: &str) -> String {
    format!("user-{}", sanitize_channel_component(user_id))
}

/// A single pushed message: channel, event name, JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

/// Fan-out abstraction the engine and pump emit through.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Emit to everyone subscribed to a room.
    async fn emit_room(&self, room_id: &RoomId, event: &str, payload: Value);

    /// Emit to a single user's private channel.
    async fn emit_user(&self, user_id: &UserId, event: &str, payload: Value);
}

/// Broadcast hub backed by per-channel `tokio::sync::broadcast` senders.
///
/// Subscribers (the websocket layer, or tests) attach with [`Self::subscribe`];
/// senders never block and drop messages for lagging receivers, which matches
/// the best-effort contract.
pub struct ChannelBroadcaster {
    channels: DashMap<String, broadcast::Sender<Emission>>,
    capacity: usize,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to a channel by name, creating it if needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Emission> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    fn send(&self, channel: String, event: &str, payload: Value) {
        if let Some(sender) = self.channels.get(&channel) {
            // No receivers is fine; fire-and-forget
            let _ = sender.send(Emission {
                channel: channel.clone(),
                event: event.to_string(),
                payload,
            });
        }
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn emit_room(&self, room_id: &RoomId, event: &str, payload: Value) {
        self.send(room_channel(room_id), event, payload);
    }

    async fn emit_user(&self, user_id: &UserId, event: &str, payload: Value) {
        self.send(user_channel(user_id), event, payload);
    }
}

/// Test broadcaster that records every emission in order.
pub struct RecordingBroadcaster {
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self {
            emissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of everything emitted so far.
    pub async fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().await.clone()
    }

    /// Emissions addressed to one channel, in send order.
    pub async fn channel_emissions(&self, channel: &str) -> Vec<Emission> {
        self.emissions
            .lock()
            .await
            .iter()
            .filter(|emission| emission.channel == channel)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.emissions.lock().await.clear();
    }
}

impl Default for RecordingBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn emit_room(&self, room_id: &RoomId, event: &str, payload: Value) {
        self.emissions.lock().await.push(Emission {
            channel: room_channel(room_id),
            event: event.to_string(),
            payload,
        });
    }

    async fn emit_user(&self, user_id: &UserId, event: &str, payload: Value) {
        self.emissions.lock().await.push(Emission {
            channel: user_channel(user_id),
            event: event.to_string(),
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_names() {
        let room_id = uuid::Uuid::nil();
        assert_eq!(
            room_channel(&room_id),
            "room-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(user_channel("u@1"), "user-u-1");
    }

    #[tokio::test]
    async fn test_channel_broadcaster_delivers_in_send_order() {
        let hub = ChannelBroadcaster::default();
        let room_id = uuid::Uuid::new_v4();
        let mut rx = hub.subscribe(&room_channel(&room_id));

        hub.emit_room(&room_id, "game:state", json!({"n": 1})).await;
        hub.emit_room(&room_id, "game:state", json!({"n": 2})).await;

        assert_eq!(rx.recv().await.unwrap().payload["n"], 1);
        assert_eq!(rx.recv().await.unwrap().payload["n"], 2);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let hub = ChannelBroadcaster::default();
        let room_id = uuid::Uuid::new_v4();
        // No panic, no error
        hub.emit_room(&room_id, "toast", json!({})).await;
    }

    #[tokio::test]
    async fn test_recording_broadcaster_filters_by_channel() {
        let recorder = RecordingBroadcaster::new();
        let room_id = uuid::Uuid::new_v4();
        recorder.emit_room(&room_id, "room:state", json!({})).await;
        recorder
            .emit_user(&"wolf1".to_string(), "chat:new", json!({"text": "hi"}))
            .await;

        let user_msgs = recorder.channel_emissions("user-wolf1").await;
        assert_eq!(user_msgs.len(), 1);
        assert_eq!(user_msgs[0].event, "chat:new");
        assert_eq!(recorder.emissions().await.len(), 2);
    }
}
