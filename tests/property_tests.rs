//! Property-based invariants over the protocol and state types.

use proptest::prelude::*;

use werewolf_server::engine::state::{GameState, Player};
use werewolf_server::protocol::{
    now_ms, sanitize_channel_component, PhaseTimers, Role, RoleConfig, Winner,
};

fn state_of(roles: Vec<Role>, alive: Vec<bool>) -> GameState {
    let players = roles
        .iter()
        .zip(alive)
        .enumerate()
        .map(|(i, (role, is_alive))| Player {
            seat: i as u8 + 1,
            user_id: format!("u{}", i + 1),
            nickname: format!("玩家{}号", i + 1),
            role: *role,
            is_alive,
            is_bot: false,
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

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Werewolf),
        Just(Role::Seer),
        Just(Role::Witch),
        Just(Role::Hunter),
        Just(Role::Guard),
        Just(Role::Villager),
    ]
}

proptest! {
    /// The dealt deck always preserves the configured multiset and pads the
    /// rest with villagers.
    #[test]
    fn deal_preserves_role_counts(
        werewolf in 1u8..=4,
        seer in 0u8..=2,
        witch in 0u8..=2,
        hunter in 0u8..=2,
        guard in 0u8..=2,
        extra in 0usize..=6,
        seed in any::<u64>(),
    ) {
        let config = RoleConfig { werewolf, seer, witch, hunter, guard };
        let player_count = config.special_count() + extra;
        let mut rng = <rand::rngs::StdRng as rand::SeedableRng>::seed_from_u64(seed);
        let deck = config.deal(player_count, &mut rng).unwrap();

        prop_assert_eq!(deck.len(), player_count);
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Werewolf).count(), usize::from(werewolf));
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Seer).count(), usize::from(seer));
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Witch).count(), usize::from(witch));
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Hunter).count(), usize::from(hunter));
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Guard).count(), usize::from(guard));
        prop_assert_eq!(deck.iter().filter(|r| **r == Role::Villager).count(), extra);
    }

    /// Sanitized channel components only ever contain the safe alphabet and
    /// keep their length.
    #[test]
    fn sanitize_stays_in_alphabet(raw in ".{0,64}") {
        let cleaned = sanitize_channel_component(&raw);
        prop_assert_eq!(cleaned.chars().count(), raw.chars().count());
        prop_assert!(cleaned
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    /// The winner rule matches its definition for any alive pattern.
    #[test]
    fn winner_matches_definition(
        roles in prop::collection::vec(arb_role(), 1..16),
        alive_bits in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let n = roles.len().min(alive_bits.len());
        let roles = roles[..n].to_vec();
        let alive = alive_bits[..n].to_vec();
        let state = state_of(roles.clone(), alive.clone());

        let alive_wolves = roles
            .iter()
            .zip(&alive)
            .filter(|(role, alive)| **alive && **role == Role::Werewolf)
            .count();
        let alive_others = alive.iter().filter(|a| **a).count() - alive_wolves;

        let expected = if alive_wolves == 0 {
            Some(Winner::Villagers)
        } else if alive_wolves >= alive_others {
            Some(Winner::Werewolves)
        } else {
            None
        };
        prop_assert_eq!(state.compute_winner(), expected);
    }

    /// Phase deadlines are strictly monotonic no matter how transitions
    /// cascade within a tick.
    #[test]
    fn phase_deadlines_strictly_increase(
        durations in prop::collection::vec(0u64..120, 1..20),
    ) {
        let mut state = state_of(
            vec![Role::Werewolf, Role::Villager, Role::Villager],
            vec![true, true, true],
        );
        let now = now_ms();
        let mut last = state.phase_ends_at;
        for duration in durations {
            state.arm_phase_clock(now, duration);
            prop_assert!(state.phase_ends_at > last);
            last = state.phase_ends_at;
        }
    }

    /// Potion flags are monotonic: once spent, never refunded, whatever the
    /// witch decides on later nights.
    #[test]
    fn potion_flags_are_monotonic(
        nights in prop::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 1..8),
    ) {
        let mut state = state_of(
            vec![Role::Werewolf, Role::Witch, Role::Villager, Role::Villager,
                 Role::Villager, Role::Villager, Role::Villager, Role::Villager],
            vec![true; 8],
        );
        let now = now_ms();
        let mut save_seen = false;
        let mut poison_seen = false;

        for (wolf_votes, save, poison) in nights {
            if state.compute_winner().is_some() {
                break;
            }
            state.begin_night(now);
            if wolf_votes {
                let prey = state
                    .alive()
                    .find(|p| p.role != Role::Werewolf)
                    .map(|p| p.seat);
                if let Some(prey) = prey {
                    state.night.wolf_votes.push(("u1".to_string(), prey));
                }
            }
            state.night.witch_save = Some(save);
            let poison_target = poison
                .then(|| state.alive().find(|p| p.seat != 2).map(|p| p.seat))
                .flatten();
            state.night.witch_poison = Some(poison_target);
            state.resolve_night(now);

            // Monotonic: never flips back to false
            prop_assert!(!(save_seen && !state.night.witch_save_used));
            prop_assert!(!(poison_seen && !state.night.witch_poison_used));
            save_seen = state.night.witch_save_used;
            poison_seen = state.night.witch_poison_used;
        }
    }
}
