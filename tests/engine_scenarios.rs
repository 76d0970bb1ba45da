//! End-to-end engine scenarios over in-memory collaborators.


use test_helpers::{expire_deadline, harness, install_game, load_game, uid};
use werewolf_server::broadcast::user_channel;
use werewolf_server::database::DocumentStore;
use werewolf_server::protocol::{
    now_ms, ChatChannel, GameError, Phase, PlayerAction, ReplayEvent, Role, Winner,
};

/// Minimal wolf win: wolf kills the seer at night, the day vote takes a
/// villager, and parity ends the game with a saved replay.
#[tokio::test]
async fn scenario_a_minimal_wolf_win() {
    let h = harness();
    use Role::*;
    let (room_id, game_id) = install_game(&h, &[Werewolf, Seer, Villager, Villager], &[]).await;

    // Night 0: the lone wolf picks seat 2; the sub-role completes at once
    h.engine
        .submit_action(&room_id, &uid(1), PlayerAction::WolfKill { target_seat: 2 })
        .await
        .unwrap();

    // Seer checks seat 1 before dying at dawn
    h.engine
        .submit_action(&room_id, &uid(2), PlayerAction::SeerCheck { target_seat: 1 })
        .await
        .unwrap();
    let seer_view = h
        .engine
        .get_game_private_state(&room_id, &uid(2))
        .await
        .unwrap();
    assert!(seer_view
        .hints
        .iter()
        .any(|hint| hint.text == "你查验了 1 号：狼人"));

    // No witch and no guard: the night resolved into day speech
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::DaySpeech);
    assert_eq!(state.day_no, 1);
    assert!(!state.player_by_seat(2).unwrap().is_alive);
    assert_eq!(state.active_speaker_seat, Some(3));

    // Only the active speaker may yield the floor
    let err = h
        .engine
        .submit_action(&room_id, &uid(1), PlayerAction::NextSpeaker)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::NotYourTurn);

    // Walk the queue 3 → 4 → 1, then the vote opens
    for _ in 0..3 {
        let state = load_game(&h, &game_id).await;
        let speaker = state.active_speaker_seat.unwrap();
        h.engine
            .submit_action(&room_id, &uid(speaker), PlayerAction::NextSpeaker)
            .await
            .unwrap();
    }
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::DayVote);

    for voter in [1, 3, 4] {
        h.engine
            .submit_action(
                &room_id,
                &uid(voter),
                PlayerAction::DayVote {
                    target_seat: Some(3),
                },
            )
            .await
            .unwrap();
    }

    // One wolf against one villager: werewolves win
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::GameOver);
    assert_eq!(state.winner, Some(Winner::Werewolves));
    assert!(state.public_log.iter().any(|e| e.text == "狼人胜利"));
    assert!(state
        .events
        .iter()
        .any(|e| matches!(e.event, ReplayEvent::GameResult { .. })));

    // Replay archived for every seated user, game retired, room ended
    let replays = h.db.replays_by_owner(&uid(1)).await.unwrap();
    assert_eq!(replays.len(), 1);
    assert_eq!(
        replays[0].owner_user_ids,
        vec![uid(1), uid(2), uid(3), uid(4)]
    );
    assert_eq!(replays[0].result_summary, "狼人胜利");
    assert!(h.engine.list_active_game_ids().await.unwrap().is_empty());
    let room = h.rooms.load(&room_id).await.unwrap();
    assert_eq!(room.status, werewolf_server::protocol::RoomStatus::Ended);

    // Terminal phase is absorbing
    assert!(h
        .engine
        .advance_game_on_timeout(&game_id)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .engine
        .submit_action(
            &room_id,
            &uid(1),
            PlayerAction::DayVote { target_seat: None }
        )
        .await
        .is_err());

    // Every player got the replay pointer as a private hint
    let state = load_game(&h, &game_id).await;
    let replay_id = state.replay_id.unwrap();
    for seat in 1..=4 {
        let hints = &state.hints_by_user_id[&uid(seat)];
        assert!(hints
            .iter()
            .any(|hint| hint.text.contains(&replay_id.to_string())));
    }
}

/// Witch saves the victim and poisons another seat in the same night; both
/// potions are spent for the rest of the game.
#[tokio::test]
async fn scenario_b_witch_save_and_poison_same_night() {
    let h = harness();
    use Role::*;
    let (room_id, game_id) = install_game(
        &h,
        &[Werewolf, Witch, Villager, Villager, Villager, Villager],
        &[],
    )
    .await;

    h.engine
        .submit_action(&room_id, &uid(1), PlayerAction::WolfKill { target_seat: 4 })
        .await
        .unwrap();

    // Witch window: antidote on the victim, poison on seat 5
    h.engine
        .submit_action(&room_id, &uid(2), PlayerAction::WitchSave { use_potion: true })
        .await
        .unwrap();
    h.engine
        .submit_action(
            &room_id,
            &uid(2),
            PlayerAction::WitchPoison {
                target_seat: Some(5),
            },
        )
        .await
        .unwrap();

    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::DaySpeech);
    assert!(state.player_by_seat(4).unwrap().is_alive, "saved by witch");
    assert!(!state.player_by_seat(5).unwrap().is_alive, "poisoned");
    assert!(state.night.witch_save_used);
    assert!(state.night.witch_poison_used);

    // Walk the day to its empty vote: nobody is eliminated, night returns
    for _ in 0..5 {
        let state = load_game(&h, &game_id).await;
        let speaker = state.active_speaker_seat.unwrap();
        h.engine
            .submit_action(&room_id, &uid(speaker), PlayerAction::NextSpeaker)
            .await
            .unwrap();
    }
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::DayVote);
    for seat in [1, 2, 3, 4, 6] {
        h.engine
            .submit_action(
                &room_id,
                &uid(seat),
                PlayerAction::DayVote { target_seat: None },
            )
            .await
            .unwrap();
    }
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::Night);

    // Reach the witch window of night 2
    h.engine
        .submit_action(&room_id, &uid(1), PlayerAction::WolfKill { target_seat: 3 })
        .await
        .unwrap();
    let state = load_game(&h, &game_id).await;
    assert_eq!(
        state.active_role,
        Some(werewolf_server::protocol::NightRole::Witch)
    );

    // Both potions are gone: any potion action fails
    let err = h
        .engine
        .submit_action(&room_id, &uid(2), PlayerAction::WitchSave { use_potion: true })
        .await
        .unwrap_err();
    assert_eq!(err, GameError::PotionUsed);
    let err = h
        .engine
        .submit_action(
            &room_id,
            &uid(2),
            PlayerAction::WitchPoison {
                target_seat: Some(3),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, GameError::PotionUsed);
}

/// The sheriff's ballot weighs exactly 1.5 in the day tally.
#[tokio::test]
async fn scenario_c_sheriff_ballot_weighs_one_and_a_half() {
    use werewolf_server::engine::state::{GameState, Player};
    use werewolf_server::protocol::{PhaseTimers, RoleConfig};

    fn twelve_player_day_vote() -> GameState {
        let players = (1..=12u8)
            .map(|seat| Player {
                seat,
                user_id: uid(seat),
                nickname: format!("玩家{seat}号"),
                role: if seat <= 3 {
                    Role::Werewolf
                } else {
                    Role::Villager
                },
                is_alive: true,
                is_bot: false,
            })
            .collect();
        let mut state = GameState::new(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            "room".into(),
            players,
            RoleConfig::default(),
            PhaseTimers::default(),
            now_ms(),
        );
        state.day_no = 1;
        state.sheriff_seat = Some(1);
        state.day.stage = 1;
        state.begin_day_vote(now_ms());
        state
    }

    // Sheriff + 4 on seat 9 (5.5) against 6 on seat 10 (6.0): seat 10 falls
    let mut state = twelve_player_day_vote();
    let now = now_ms();
    state.apply_day_vote(&uid(1), Some(9)).unwrap();
    for seat in 2..=5 {
        state.apply_day_vote(&uid(seat), Some(9)).unwrap();
    }
    for seat in 6..=11 {
        state.apply_day_vote(&uid(seat), Some(10)).unwrap();
    }
    state.apply_day_vote(&uid(12), None).unwrap();
    assert!(state.day_votes_complete());
    state.resolve_day_vote(now);
    assert!(state.player_by_seat(9).unwrap().is_alive);
    assert!(!state.player_by_seat(10).unwrap().is_alive);

    // Sheriff + 4 on seat 9 (5.5) against 5 on seat 10 (5.0): seat 9 falls
    let mut state = twelve_player_day_vote();
    state.apply_day_vote(&uid(1), Some(9)).unwrap();
    for seat in 2..=5 {
        state.apply_day_vote(&uid(seat), Some(9)).unwrap();
    }
    for seat in 6..=10 {
        state.apply_day_vote(&uid(seat), Some(10)).unwrap();
    }
    for seat in [11, 12] {
        state.apply_day_vote(&uid(seat), None).unwrap();
    }
    state.resolve_day_vote(now);
    assert!(!state.player_by_seat(9).unwrap().is_alive);
    assert!(state.player_by_seat(10).unwrap().is_alive);
}

/// Day vote eliminates a hunter; the hunter's shot chains a second death and
/// the game moves on to night.
#[tokio::test]
async fn scenario_d_hunter_chain() {
    let h = harness();
    use Role::*;
    let (room_id, game_id) = install_game(
        &h,
        &[
            Werewolf, Werewolf, Hunter, Villager, Villager, Villager, Villager, Villager,
        ],
        &[],
    )
    .await;

    // Night 0: both wolves take seat 4
    for wolf in [1, 2] {
        h.engine
            .submit_action(
                &room_id,
                &uid(wolf),
                PlayerAction::WolfKill { target_seat: 4 },
            )
            .await
            .unwrap();
    }
    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::DaySpeech);

    // Walk the speeches, then everyone votes the hunter at seat 3
    for _ in 0..7 {
        let state = load_game(&h, &game_id).await;
        let speaker = state.active_speaker_seat.unwrap();
        h.engine
            .submit_action(&room_id, &uid(speaker), PlayerAction::NextSpeaker)
            .await
            .unwrap();
    }
    for seat in [1, 2, 3, 5, 6, 7, 8] {
        h.engine
            .submit_action(
                &room_id,
                &uid(seat),
                PlayerAction::DayVote {
                    target_seat: Some(3),
                },
            )
            .await
            .unwrap();
    }

    let state = load_game(&h, &game_id).await;
    assert_eq!(state.phase, Phase::Settlement);
    assert_eq!(state.settlement.pending_hunter_seat, Some(3));

    // Nobody else may shoot
    let err = h
        .engine
        .submit_action(
            &room_id,
            &uid(5),
            PlayerAction::HunterShoot {
                target_seat: Some(7),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, GameError::NotYourTurn);

    h.engine
        .submit_action(
            &room_id,
            &uid(3),
            PlayerAction::HunterShoot {
                target_seat: Some(7),
            },
        )
        .await
        .unwrap();

    let state = load_game(&h, &game_id).await;
    assert!(!state.player_by_seat(7).unwrap().is_alive);
    assert!(state.events.iter().any(|e| matches!(
        e.event,
        ReplayEvent::PlayerEliminated {
            seat: 7,
            reason: werewolf_server::protocol::EliminationReason::Hunter,
        }
    )));
    // Two wolves against three villagers: the game continues into night
    assert_eq!(state.phase, Phase::Night);
}

/// Phase deadlines are logical: advancing before the deadline is a no-op,
/// the first call after it transitions, and repeats are no-ops again.
#[tokio::test]
async fn scenario_e_timeout_determinism() {
    let h = harness();
    use Role::*;
    let (_room_id, game_id) = install_game(&h, &[Werewolf, Seer, Villager, Villager], &[]).await;

    let before = load_game(&h, &game_id).await;
    assert!(
        h.engine
            .advance_game_on_timeout(&game_id)
            .await
            .unwrap()
            .is_none(),
        "deadline is in the future"
    );
    let after = load_game(&h, &game_id).await;
    assert_eq!(before, after, "no-op advance must not mutate the snapshot");

    expire_deadline(&h, &game_id).await;
    let outcome = h.engine.advance_game_on_timeout(&game_id).await.unwrap();
    assert!(outcome.is_some(), "expired deadline must advance");
    let advanced = load_game(&h, &game_id).await;
    assert_eq!(
        advanced.active_role,
        Some(werewolf_server::protocol::NightRole::Seer),
        "wolf sub-role timed out into the seer sub-role"
    );

    // Fresh deadline: advancing again is a no-op
    assert!(h
        .engine
        .advance_game_on_timeout(&game_id)
        .await
        .unwrap()
        .is_none());
}

/// Wolf chat is fanned out to wolves only and never recorded anywhere.
#[tokio::test]
async fn scenario_f_wolf_channel_isolation() {
    let h = harness();
    use Role::*;
    let (room_id, game_id) =
        install_game(&h, &[Werewolf, Werewolf, Villager, Villager], &[]).await;
    h.broadcaster.clear().await;

    let message = h
        .engine
        .append_chat(&room_id, &uid(2), "玩家2号", "hi", ChatChannel::Wolf)
        .await
        .unwrap();
    assert_eq!(message.channel, ChatChannel::Wolf);

    // Exactly the two wolves received it, on their private channels
    let emissions = h.broadcaster.emissions().await;
    let chat_emissions: Vec<_> = emissions.iter().filter(|e| e.event == "chat:new").collect();
    assert_eq!(chat_emissions.len(), 2);
    let channels: Vec<_> = chat_emissions.iter().map(|e| e.channel.clone()).collect();
    assert!(channels.contains(&user_channel(&uid(1))));
    assert!(channels.contains(&user_channel(&uid(2))));

    // No trace in the public log or the replay events
    let state = load_game(&h, &game_id).await;
    assert!(!state.public_log.iter().any(|e| e.text.contains("hi")));
    assert!(!state
        .events
        .iter()
        .any(|e| matches!(e.event, ReplayEvent::ChatMessage { .. })));

    // A villager is refused outright
    let err = h
        .engine
        .append_chat(&room_id, &uid(3), "玩家3号", "let me in", ChatChannel::Wolf)
        .await
        .unwrap_err();
    assert_eq!(err, GameError::NotWolfChannel);
}
