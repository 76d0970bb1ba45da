use serde::Serialize;

/// Typed error taxonomy surfaced at the boundary.
///
/// Every variant maps to a stable string code that clients display as a
/// toast. State, permission, and composition errors are returned without any
/// mutation or broadcast; infrastructure errors may be retried by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    // State errors
    #[error("room not found")]
    RoomNotFound,
    #[error("game not found")]
    GameNotFound,
    #[error("user is not seated in this game")]
    NotInGame,
    #[error("room is not in a running game")]
    NotPlaying,
    #[error("the current phase forbids this action")]
    PhaseForbidsAction,
    #[error("actor already acted in this phase")]
    AlreadyActed,
    #[error("target seat is invalid for this action")]
    TargetInvalid,
    #[error("that potion was already spent this game")]
    PotionUsed,

    // Permission errors
    #[error("only the room owner may start the game")]
    OnlyOwnerMayStart,
    #[error("only the room owner may change the configuration")]
    OnlyOwnerMayConfig,
    #[error("the wolf channel is reserved for werewolves")]
    NotWolfChannel,
    #[error("it is not this player's turn to speak")]
    NotYourTurn,
    #[error("dead players cannot act")]
    PlayerDead,

    // Composition errors
    #[error("role configuration is invalid")]
    InvalidRoleConfig,
    #[error("{0} more players (or bots) needed to fill the room")]
    NeedBots(u8),
    #[error("room is full")]
    RoomFull,
    #[error("not all seated players are ready")]
    NotAllReady,

    // Infrastructure errors
    #[error("snapshot store unavailable: {0}")]
    SnapshotUnavailable(String),
    #[error("document store unavailable: {0}")]
    DbUnavailable(String),
}

impl GameError {
    /// Stable string code shown to clients.
    ///
    /// `NEED_BOTS` carries the missing-seat count in its code, matching the
    /// wire contract.
    pub fn code(&self) -> String {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND".into(),
            Self::GameNotFound => "GAME_NOT_FOUND".into(),
            Self::NotInGame => "NOT_IN_GAME".into(),
            Self::NotPlaying => "NOT_PLAYING".into(),
            Self::PhaseForbidsAction => "PHASE_FORBIDS_ACTION".into(),
            Self::AlreadyActed => "ALREADY_ACTED".into(),
            Self::TargetInvalid => "TARGET_INVALID".into(),
            Self::PotionUsed => "POTION_USED".into(),
            Self::OnlyOwnerMayStart => "ONLY_OWNER_MAY_START".into(),
            Self::OnlyOwnerMayConfig => "ONLY_OWNER_MAY_CONFIG".into(),
            Self::NotWolfChannel => "NOT_WOLF_CHANNEL".into(),
            Self::NotYourTurn => "NOT_YOUR_TURN".into(),
            Self::PlayerDead => "PLAYER_DEAD".into(),
            Self::InvalidRoleConfig => "INVALID_ROLE_CONFIG".into(),
            Self::NeedBots(n) => format!("NEED_BOTS:{n}"),
            Self::RoomFull => "ROOM_FULL".into(),
            Self::NotAllReady => "NOT_ALL_READY".into(),
            Self::SnapshotUnavailable(_) => "SNAPSHOT_UNAVAILABLE".into(),
            Self::DbUnavailable(_) => "DB_UNAVAILABLE".into(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SnapshotUnavailable(_) | Self::DbUnavailable(_)
        )
    }
}

/// Wire shape of an error response: `{ "code": "...", "message": "..." }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&GameError> for ErrorBody {
    fn from(err: &GameError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
