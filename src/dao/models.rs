use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Key of the singleton document holding the current game.
pub const CURRENT_GAME_KEY: &str = "current-game";

/// Player record as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Stable identifier, assigned sequentially from 1.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Seconds banked as of the last turn boundary.
    pub accumulated_seconds: u64,
}

/// Singleton game document persisted by the storage layer.
///
/// The layout mirrors the JSON document shared with existing clients: the
/// active player uses `-1` when nobody is active and timestamps are RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Number of players, always equal to `players.len()`.
    pub player_count: u32,
    /// Participating players in turn order.
    pub players: Vec<PlayerEntity>,
    /// Index of the active player or `-1`.
    pub active_player_index: i32,
    /// `count-up` or `count-down`.
    pub timer_mode: String,
    /// Per-player budget used in count-down mode.
    pub countdown_seconds: u32,
    /// Whether the clock is paused.
    pub is_paused: bool,
    /// Start of the currently running turn.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub turn_started_at: Option<OffsetDateTime>,
    /// Moment the clock was paused.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub paused_at: Option<OffsetDateTime>,
}
