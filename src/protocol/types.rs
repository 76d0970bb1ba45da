use uuid::Uuid;

/// Unique identifier for rooms
pub type RoomId = Uuid;
/// Unique identifier for games
pub type GameId = Uuid;
/// Opaque caller-supplied user identifier
pub type UserId = String;
/// Seat position inside a room, `1..=max_players`, stable for the whole game
pub type Seat = u8;

/// Smallest room the server will create
pub const MIN_ROOM_PLAYERS: u8 = 4;
/// Largest room the server will create
pub const MAX_ROOM_PLAYERS: u8 = 18;
/// Rooms with at least this many seats hold a sheriff election on day 1
pub const SHERIFF_ELECTION_MIN_PLAYERS: usize = 12;

/// Seconds granted to the sheriff enrollment window
pub const SHERIFF_ELECTION_SECS: u64 = 20;
/// Seconds granted to the sheriff ballot
pub const SHERIFF_VOTE_SECS: u64 = 30;
/// Milliseconds a finished game's snapshot stays addressable before clients move on
pub const GAME_OVER_LINGER_MS: i64 = 10_000;

/// Waiting rooms idle longer than this are dissolved by the sweep
pub const WAITING_ROOM_EXPIRY_SECS: i64 = 120;

/// Status of a room over its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

/// Current wall-clock time in epoch milliseconds.
///
/// All phase deadlines (`phase_ends_at`) and event timestamps derive from this
/// single clock so that the `server_now` broadcast to clients is comparable.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Replace every character outside `[A-Za-z0-9_-]` with `-`.
///
/// User ids are caller-supplied opaque strings; broadcaster channel names
/// must stay within the safe alphabet.
pub fn sanitize_channel_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_alphabet() {
        assert_eq!(sanitize_channel_component("abc_DEF-123"), "abc_DEF-123");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_channel_component("user@host.cn"), "user-host-cn");
        assert_eq!(sanitize_channel_component("小明"), "--");
        assert_eq!(sanitize_channel_component("a b\tc"), "a-b-c");
    }

    #[test]
    fn test_room_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RoomStatus::Waiting).unwrap(),
            "\"waiting\""
        );
        assert_eq!(
            serde_json::to_string(&RoomStatus::Playing).unwrap(),
            "\"playing\""
        );
    }
}
