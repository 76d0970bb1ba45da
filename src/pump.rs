//! Timer Pump: the ~1 s loop that drives phase timeouts.
//!
//! Each tick enumerates `games:active` and asks the engine to advance every
//! game whose deadline has passed, forwarding the resulting diffs to the
//! broadcaster. All errors are swallowed so one sick game never poisons the
//! loop; timeout-triggered cascades run to their fixpoint inside the engine
//! call.

use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::engine::{AdvanceOutcome, GameEngine};
use crate::rooms::RoomRegistry;

pub struct TimerPump {
    engine: Arc<GameEngine>,
    rooms: Arc<RoomRegistry>,
    broadcaster: Arc<dyn Broadcaster>,
    tick: Duration,
    room_sweep_interval: Duration,
}

impl TimerPump {
    pub fn new(
        engine: Arc<GameEngine>,
        rooms: Arc<RoomRegistry>,
        broadcaster: Arc<dyn Broadcaster>,
        tick: Duration,
        room_sweep_interval: Duration,
    ) -> Self {
        Self {
            engine,
            rooms,
            broadcaster,
            tick,
            room_sweep_interval,
        }
    }

    /// Run forever. Ticks are independent: one tick processing a slow game
    /// never blocks the next game in the same enumeration.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut sweep_interval = tokio::time::interval(self.room_sweep_interval);
        sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick_games().await,
                _ = sweep_interval.tick() => self.sweep_rooms().await,
            }
        }
    }

    /// One pass over the active set.
    pub async fn tick_games(&self) {
        let game_ids = match self.engine.list_active_game_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate active games");
                return;
            }
        };

        for game_id in game_ids {
            match self.engine.advance_game_on_timeout(&game_id).await {
                Ok(Some(outcome)) => self.push_outcome(outcome).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%game_id, error = %e, "Timeout advance failed");
                }
            }
        }
    }

    async fn push_outcome(&self, outcome: AdvanceOutcome) {
        if let Ok(payload) = serde_json::to_value(&outcome.game_public) {
            self.broadcaster
                .emit_room(&outcome.room_id, "game:state", payload)
                .await;
        }
        for (user_id, private) in &outcome.private_states {
            if let Ok(payload) = serde_json::to_value(private) {
                self.broadcaster
                    .emit_user(user_id, "game:private", payload)
                    .await;
            }
        }
    }

    async fn sweep_rooms(&self) {
        match self.rooms.sweep_expired().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Dissolved expired waiting rooms"),
            Err(e) => tracing::warn!(error = %e, "Room sweep failed"),
        }
    }
}
