use serde::{Deserialize, Serialize};

/// Segment of the game cycle with its own timer budget and permitted actions.
///
/// `GameOver` is terminal: no transition ever leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Night,
    SheriffElection,
    SheriffSpeech,
    SheriffVote,
    DaySpeech,
    DayVote,
    Settlement,
    GameOver,
}

impl Phase {
    /// Phases during which the active speaker may talk publicly.
    pub fn is_speech_phase(self) -> bool {
        matches!(self, Phase::DaySpeech | Phase::SheriffSpeech)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::GameOver)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Night => "night",
            Phase::SheriffElection => "sheriff_election",
            Phase::SheriffSpeech => "sheriff_speech",
            Phase::SheriffVote => "sheriff_vote",
            Phase::DaySpeech => "day_speech",
            Phase::DayVote => "day_vote",
            Phase::Settlement => "settlement",
            Phase::GameOver => "game_over",
        };
        write!(f, "{name}")
    }
}
