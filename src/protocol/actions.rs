//! Player-submitted actions, dispatched on `(phase, actionType)`.
//!
//! The wire shape is a tagged union: `{"actionType": "...", "payload": {...}}`.

use serde::{Deserialize, Serialize};

use super::types::Seat;

/// Every action a seated player (or bot) may submit to a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actionType", content = "payload")]
pub enum PlayerAction {
    /// Wolf votes a victim. Target must be alive and not a wolf.
    #[serde(rename = "night.wolfKill", rename_all = "camelCase")]
    WolfKill { target_seat: Seat },

    /// Seer divines one living player's alignment. Not self.
    #[serde(rename = "night.seerCheck", rename_all = "camelCase")]
    SeerCheck { target_seat: Seat },

    /// Guard protects one living player, or seat 0 to protect nobody.
    #[serde(rename = "night.guardProtect", rename_all = "camelCase")]
    GuardProtect { target_seat: Seat },

    /// Witch decides whether to spend the antidote on tonight's victim.
    #[serde(rename = "night.witch.save")]
    WitchSave {
        #[serde(rename = "use")]
        use_potion: bool,
    },

    /// Witch decides whom to poison, or `null` to hold the potion.
    #[serde(rename = "night.witch.poison", rename_all = "camelCase")]
    WitchPoison { target_seat: Option<Seat> },

    /// Stand for sheriff during the enrollment window.
    #[serde(rename = "sheriff.enroll")]
    SheriffEnroll,

    /// Withdraw a sheriff candidacy.
    #[serde(rename = "sheriff.quit")]
    SheriffQuit,

    /// Non-candidate ballot for sheriff, `null` to abstain.
    #[serde(rename = "sheriff.vote", rename_all = "camelCase")]
    SheriffVote { target_seat: Option<Seat> },

    /// Daytime elimination ballot, `null` to abstain.
    #[serde(rename = "day.vote", rename_all = "camelCase")]
    DayVote { target_seat: Option<Seat> },

    /// Eliminated hunter's parting shot, `null` to hold fire.
    #[serde(rename = "settlement.hunterShoot", rename_all = "camelCase")]
    HunterShoot { target_seat: Option<Seat> },

    /// Active speaker yields the floor early.
    #[serde(rename = "game.nextSpeaker")]
    NextSpeaker,
}

impl PlayerAction {
    /// Wire name used in replay `action_submitted` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WolfKill { .. } => "night.wolfKill",
            Self::SeerCheck { .. } => "night.seerCheck",
            Self::GuardProtect { .. } => "night.guardProtect",
            Self::WitchSave { .. } => "night.witch.save",
            Self::WitchPoison { .. } => "night.witch.poison",
            Self::SheriffEnroll => "sheriff.enroll",
            Self::SheriffQuit => "sheriff.quit",
            Self::SheriffVote { .. } => "sheriff.vote",
            Self::DayVote { .. } => "day.vote",
            Self::HunterShoot { .. } => "settlement.hunterShoot",
            Self::NextSpeaker => "game.nextSpeaker",
        }
    }
}

/// Chat routing: public table talk or the wolves' private channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatChannel {
    Public,
    Wolf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format_round_trip() {
        let action: PlayerAction =
            serde_json::from_str(r#"{"actionType":"night.wolfKill","payload":{"targetSeat":3}}"#)
                .unwrap();
        assert_eq!(action, PlayerAction::WolfKill { target_seat: 3 });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["actionType"], "night.wolfKill");
        assert_eq!(json["payload"]["targetSeat"], 3);
    }

    #[test]
    fn test_witch_save_uses_use_key() {
        let action: PlayerAction =
            serde_json::from_str(r#"{"actionType":"night.witch.save","payload":{"use":true}}"#)
                .unwrap();
        assert_eq!(action, PlayerAction::WitchSave { use_potion: true });
    }

    #[test]
    fn test_null_target_is_abstain() {
        let action: PlayerAction =
            serde_json::from_str(r#"{"actionType":"day.vote","payload":{"targetSeat":null}}"#)
                .unwrap();
        assert_eq!(action, PlayerAction::DayVote { target_seat: None });
    }

    #[test]
    fn test_unknown_action_type_is_rejected() {
        let parsed: Result<PlayerAction, _> =
            serde_json::from_str(r#"{"actionType":"night.sing","payload":{}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let action = PlayerAction::HunterShoot { target_seat: Some(7) };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["actionType"], action.kind());
    }
}
