//! Timer Pump integration: an all-bot game plays itself to completion under
//! ticks alone, with diffs fanned out along the way.


use std::sync::Arc;
use std::time::Duration;

use test_helpers::{expire_deadline, harness_with_seed, install_game, load_game};
use werewolf_server::broadcast::room_channel;
use werewolf_server::database::DocumentStore;
use werewolf_server::protocol::{Phase, Role};
use werewolf_server::pump::TimerPump;

#[tokio::test]
async fn all_bot_game_plays_to_completion_on_ticks() {
    let h = harness_with_seed(7);
    use Role::*;
    let (room_id, game_id) =
        install_game(&h, &[Werewolf, Seer, Villager, Villager], &[1, 2, 3, 4]).await;

    let pump = TimerPump::new(
        h.engine.clone(),
        h.rooms.clone(),
        h.broadcaster.clone(),
        Duration::from_millis(1000),
        Duration::from_secs(30),
    );

    let mut ticks = 0;
    loop {
        let state = load_game(&h, &game_id).await;
        if state.phase == Phase::GameOver {
            break;
        }
        ticks += 1;
        assert!(ticks < 200, "bot game should finish, stuck in {:?}", state.phase);

        expire_deadline(&h, &game_id).await;
        pump.tick_games().await;
    }

    // The game retired itself and archived a replay for its players
    assert!(h.engine.list_active_game_ids().await.unwrap().is_empty());
    let state = load_game(&h, &game_id).await;
    let replay_id = state.replay_id.expect("replay should be archived");
    let replays = h
        .db
        .replays_by_owner(&test_helpers::uid(1))
        .await
        .unwrap();
    assert_eq!(replays.len(), 1);
    assert_eq!(replays[0].id, replay_id);

    // Ticks fanned out public and private diffs
    let emissions = h.broadcaster.emissions().await;
    assert!(emissions
        .iter()
        .any(|e| e.channel == room_channel(&room_id) && e.event == "game:state"));
    assert!(emissions.iter().any(|e| e.event == "game:private"));

    // Ticking a finished board is a no-op
    pump.tick_games().await;
}

#[tokio::test]
async fn tick_with_no_active_games_is_silent() {
    let h = harness_with_seed(8);
    let pump = TimerPump::new(
        h.engine.clone(),
        h.rooms.clone(),
        h.broadcaster.clone(),
        Duration::from_millis(1000),
        Duration::from_secs(30),
    );
    pump.tick_games().await;
    assert!(h.broadcaster.emissions().await.is_empty());
}

/// Dropping the per-game lock between ticks lets two pumps coexist: the
/// second advance observes the refreshed deadline and does nothing.
#[tokio::test]
async fn concurrent_advances_are_serialized() {
    let h = harness_with_seed(9);
    use Role::*;
    let (_room_id, game_id) =
        install_game(&h, &[Werewolf, Seer, Villager, Villager], &[1, 2, 3, 4]).await;
    let h = Arc::new(h);

    expire_deadline(&h, &game_id).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.engine.advance_game_on_timeout(&game_id).await.unwrap()
        }));
    }

    let advanced = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|outcome| outcome.is_some())
        .count();
    assert_eq!(advanced, 1, "exactly one concurrent advance may transition");
}
