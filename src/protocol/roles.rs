//! Role identities and the per-room role composition.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::error_codes::GameError;

/// Role a seat holds for the whole game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Werewolf,
    Seer,
    Witch,
    Hunter,
    Guard,
    Villager,
}

impl Role {
    /// Whether this role belongs to the wolf faction.
    pub fn is_wolf(self) -> bool {
        matches!(self, Role::Werewolf)
    }

    /// Alignment label a seer receives for this role.
    pub fn seer_label(self) -> &'static str {
        if self.is_wolf() {
            "狼人"
        } else {
            "好人"
        }
    }
}

/// The night sub-phase during which exactly one role class acts.
///
/// Sub-roles cycle in [`NightRole::ORDER`]; sub-roles with no living holders
/// are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NightRole {
    Werewolf,
    Seer,
    Witch,
    Guard,
}

impl NightRole {
    /// Fixed cycling order inside a night.
    pub const ORDER: [NightRole; 4] = [
        NightRole::Werewolf,
        NightRole::Seer,
        NightRole::Witch,
        NightRole::Guard,
    ];

    /// The player role that owns this sub-phase.
    pub fn role(self) -> Role {
        match self {
            NightRole::Werewolf => Role::Werewolf,
            NightRole::Seer => Role::Seer,
            NightRole::Witch => Role::Witch,
            NightRole::Guard => Role::Guard,
        }
    }

    /// Sub-role following this one, or `None` after the last.
    pub fn next(self) -> Option<NightRole> {
        let idx = Self::ORDER.iter().position(|r| *r == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    /// Public log line announcing this sub-role's turn.
    pub fn announcement(self) -> &'static str {
        match self {
            NightRole::Werewolf => "狼人请睁眼",
            NightRole::Seer => "预言家请睁眼",
            NightRole::Witch => "女巫请睁眼",
            NightRole::Guard => "守卫请睁眼",
        }
    }
}

/// Special-role counts configured per room; remaining seats become villagers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleConfig {
    pub werewolf: u8,
    pub seer: u8,
    pub witch: u8,
    pub hunter: u8,
    pub guard: u8,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            werewolf: 1,
            seer: 1,
            witch: 0,
            hunter: 0,
            guard: 0,
        }
    }
}

impl RoleConfig {
    /// Total number of non-villager seats this composition claims.
    pub fn special_count(&self) -> usize {
        usize::from(self.werewolf)
            + usize::from(self.seer)
            + usize::from(self.witch)
            + usize::from(self.hunter)
            + usize::from(self.guard)
    }

    /// Validate against a player count: at least one wolf, and the specials
    /// must fit. Guard-only-in-large-rooms is a presentation default, not
    /// enforced here.
    pub fn validate(&self, player_count: usize) -> Result<(), GameError> {
        if self.werewolf == 0 {
            return Err(GameError::InvalidRoleConfig);
        }
        if self.special_count() > player_count {
            return Err(GameError::InvalidRoleConfig);
        }
        Ok(())
    }

    /// Build the shuffled role deck for `player_count` seats.
    ///
    /// The multiset is derived from the configured counts, padded with
    /// villagers, then uniformly shuffled with the caller's RNG so tests can
    /// pin the layout.
    pub fn deal<R: rand::Rng + ?Sized>(
        &self,
        player_count: usize,
        rng: &mut R,
    ) -> Result<Vec<Role>, GameError> {
        self.validate(player_count)?;
        let mut deck = Vec::with_capacity(player_count);
        deck.extend(std::iter::repeat_n(Role::Werewolf, usize::from(self.werewolf)));
        deck.extend(std::iter::repeat_n(Role::Seer, usize::from(self.seer)));
        deck.extend(std::iter::repeat_n(Role::Witch, usize::from(self.witch)));
        deck.extend(std::iter::repeat_n(Role::Hunter, usize::from(self.hunter)));
        deck.extend(std::iter::repeat_n(Role::Guard, usize::from(self.guard)));
        deck.resize(player_count, Role::Villager);
        deck.shuffle(rng);
        Ok(deck)
    }
}
