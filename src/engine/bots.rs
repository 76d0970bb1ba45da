//! Bot driver: uniformly random legal moves for unclaimed seats.
//!
//! Night moves are generated on the phase-advancing tick rather than at
//! submission time, so human clients always see the role announcement frame
//! first. Ballot fill-ins run after each human vote and at timeout.

use rand::seq::IndexedRandom;
use rand::Rng;
use rand::RngExt;

use crate::protocol::{NightRole, PlayerAction, Seat, UserId};

use super::state::GameState;

/// Probability a bot witch spends the antidote on the victim.
const BOT_SAVE_PROBABILITY: f64 = 0.5;
/// Probability a bot witch poisons somebody.
const BOT_POISON_PROBABILITY: f64 = 0.15;

/// Pending night moves for every bot holding the active sub-role.
pub fn night_actions<R: Rng + ?Sized>(
    state: &GameState,
    rng: &mut R,
) -> Vec<(UserId, PlayerAction)> {
    let Some(role) = state.active_role else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    let bots: Vec<_> = state
        .alive_with_role(role.role())
        .filter(|p| p.is_bot)
        .map(|p| (p.user_id.clone(), p.seat))
        .collect();

    for (user_id, seat) in bots {
        match role {
            NightRole::Werewolf => {
                if state
                    .night
                    .wolf_votes
                    .iter()
                    .any(|(uid, _)| *uid == user_id)
                {
                    continue;
                }
                let prey: Vec<Seat> = state
                    .alive()
                    .filter(|p| !p.role.is_wolf())
                    .map(|p| p.seat)
                    .collect();
                if let Some(target) = prey.choose(rng) {
                    actions.push((user_id, PlayerAction::WolfKill { target_seat: *target }));
                }
            }
            NightRole::Seer => {
                if state.night.acted.contains(&user_id) {
                    continue;
                }
                let unknown: Vec<Seat> = state
                    .alive()
                    .filter(|p| p.seat != seat)
                    .map(|p| p.seat)
                    .collect();
                if let Some(target) = unknown.choose(rng) {
                    actions.push((user_id, PlayerAction::SeerCheck { target_seat: *target }));
                }
            }
            NightRole::Guard => {
                if state.night.acted.contains(&user_id) {
                    continue;
                }
                let protectable: Vec<Seat> = state.alive().map(|p| p.seat).collect();
                if let Some(target) = protectable.choose(rng) {
                    actions.push((
                        user_id,
                        PlayerAction::GuardProtect {
                            target_seat: *target,
                        },
                    ));
                }
            }
            NightRole::Witch => {
                if state.night.witch_save.is_none() {
                    let use_potion =
                        state.wolf_victim().is_some() && rng.random_bool(BOT_SAVE_PROBABILITY);
                    actions.push((
                        user_id.clone(),
                        PlayerAction::WitchSave {
                            use_potion,
                        },
                    ));
                }
                if state.night.witch_poison.is_none() {
                    let target = if rng.random_bool(BOT_POISON_PROBABILITY) {
                        let others: Vec<Seat> = state
                            .alive()
                            .filter(|p| p.seat != seat)
                            .map(|p| p.seat)
                            .collect();
                        others.choose(rng).copied()
                    } else {
                        None
                    };
                    actions.push((
                        user_id,
                        PlayerAction::WitchPoison {
                            target_seat: target,
                        },
                    ));
                }
            }
        }
    }
    actions
}

/// Day-vote ballots for every living bot that has not voted yet.
pub fn day_vote_fills<R: Rng + ?Sized>(
    state: &GameState,
    rng: &mut R,
) -> Vec<(UserId, PlayerAction)> {
    let legal: Vec<Seat> = match &state.day.candidates {
        Some(candidates) => candidates.clone(),
        None => state.alive().map(|p| p.seat).collect(),
    };

    state
        .alive()
        .filter(|p| p.is_bot)
        .filter(|p| !state.day.votes.iter().any(|(uid, _)| *uid == p.user_id))
        .map(|p| {
            (
                p.user_id.clone(),
                PlayerAction::DayVote {
                    target_seat: legal.choose(rng).copied(),
                },
            )
        })
        .collect()
}

/// Sheriff ballots for every living non-candidate bot that has not voted yet.
pub fn sheriff_vote_fills<R: Rng + ?Sized>(
    state: &GameState,
    rng: &mut R,
) -> Vec<(UserId, PlayerAction)> {
    state
        .alive()
        .filter(|p| p.is_bot && !state.election.candidates.contains(&p.seat))
        .filter(|p| !state.election.votes.iter().any(|(uid, _)| *uid == p.user_id))
        .map(|p| {
            (
                p.user_id.clone(),
                PlayerAction::SheriffVote {
                    target_seat: state.election.candidates.choose(rng).copied(),
                },
            )
        })
        .collect()
}

/// A bot hunter's shot: uniform over every living seat plus holding fire.
pub fn hunter_shot<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Option<Seat> {
    let living: Vec<Seat> = state.alive().map(|p| p.seat).collect();
    // index == len means holding fire
    let pick = rng.random_range(0..=living.len());
    living.get(pick).copied()
}

/// Whether the seat pending in settlement belongs to a bot.
pub fn pending_hunter_is_bot(state: &GameState) -> bool {
    state
        .settlement
        .pending_hunter_seat
        .and_then(|seat| state.player_by_seat(seat))
        .is_some_and(|p| p.is_bot)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::protocol::{now_ms, Phase, PhaseTimers, Role, RoleConfig};

    use super::super::state::Player;
    use super::*;

    fn state_of(layout: &[(Role, bool)]) -> GameState {
        let players = layout
            .iter()
            .enumerate()
            .map(|(i, (role, is_bot))| Player {
                seat: i as Seat + 1,
                user_id: format!("u{}", i + 1),
                nickname: format!("玩家{}号", i + 1),
                role: *role,
                is_alive: true,
                is_bot: *is_bot,
            })
            .collect();
        GameState::new(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            "room".into(),
            players,
            RoleConfig::default(),
            PhaseTimers::default(),
            now_ms(),
        )
    }

    #[test]
    fn test_bot_wolves_only_target_non_wolves() {
        use Role::*;
        let mut state = state_of(&[
            (Werewolf, true),
            (Werewolf, true),
            (Seer, false),
            (Villager, false),
        ]);
        state.phase = Phase::Night;
        state.active_role = Some(NightRole::Werewolf);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            for (_, action) in night_actions(&state, &mut rng) {
                match action {
                    PlayerAction::WolfKill { target_seat } => {
                        assert!(target_seat == 3 || target_seat == 4);
                    }
                    other => panic!("unexpected bot action: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_bot_witch_decides_both_potions() {
        use Role::*;
        let mut state = state_of(&[(Werewolf, false), (Witch, true), (Villager, false)]);
        state.phase = Phase::Night;
        state.active_role = Some(NightRole::Witch);
        state.night.wolf_votes.push(("u1".into(), 3));

        let mut rng = StdRng::seed_from_u64(2);
        let actions = night_actions(&state, &mut rng);
        assert_eq!(actions.len(), 2);
        assert!(matches!(actions[0].1, PlayerAction::WitchSave { .. }));
        assert!(matches!(actions[1].1, PlayerAction::WitchPoison { .. }));
    }

    #[test]
    fn test_day_vote_fills_skip_voters_and_humans() {
        use Role::*;
        let mut state = state_of(&[
            (Werewolf, false),
            (Villager, true),
            (Villager, true),
            (Seer, false),
        ]);
        state.phase = Phase::DayVote;
        state.day.votes.push(("u2".into(), Some(1)));

        let mut rng = StdRng::seed_from_u64(3);
        let fills = day_vote_fills(&state, &mut rng);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].0, "u3");
    }

    #[test]
    fn test_sheriff_fills_exclude_candidate_bots() {
        use Role::*;
        let mut state = state_of(&[(Villager, true), (Villager, true), (Werewolf, false)]);
        state.phase = Phase::SheriffVote;
        state.election.candidates = vec![1];

        let mut rng = StdRng::seed_from_u64(4);
        let fills = sheriff_vote_fills(&state, &mut rng);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].0, "u2");
        assert!(matches!(
            fills[0].1,
            PlayerAction::SheriffVote {
                target_seat: Some(1)
            }
        ));
    }
}
