//! Request and response bodies of the game API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::storage::Versioned,
    dto::format_timestamp,
    state::{
        elapsed::all_elapsed_at,
        game::{GameState, TimerMode},
        transitions::ConfigUpdate,
    },
};

/// Longest concurrency token accepted from a client.
const MAX_ETAG_LEN: u64 = 256;

/// Body of the pause, resume, switch-turn and reset endpoints.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Concurrency token from the last read; `If-Match` takes precedence.
    #[serde(default)]
    #[validate(length(max = MAX_ETAG_LEN))]
    pub etag: Option<String>,
}

/// Bulk configuration update; at least one optional field must be present.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    #[serde(default)]
    #[validate(length(max = MAX_ETAG_LEN))]
    pub etag: Option<String>,
    /// Between 2 and 6 players.
    #[serde(default)]
    #[validate(range(min = 2, max = 6))]
    pub player_count: Option<i64>,
    /// `count-up` or `count-down`.
    #[serde(default)]
    pub timer_mode: Option<String>,
    /// Strictly positive per-player budget for count-down mode.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub countdown_seconds: Option<i64>,
    /// One name per player, in turn order, matching the resulting player count.
    #[serde(default)]
    pub player_names: Option<Vec<String>>,
}

impl From<UpdateConfigRequest> for ConfigUpdate {
    fn from(value: UpdateConfigRequest) -> Self {
        Self {
            player_count: value.player_count,
            timer_mode: value.timer_mode,
            countdown_seconds: value.countdown_seconds,
            player_names: value.player_names,
        }
    }
}

/// Rename a single player addressed by 0-based index.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenamePlayerRequest {
    #[serde(default)]
    #[validate(length(max = MAX_ETAG_LEN))]
    pub etag: Option<String>,
    #[serde(default)]
    #[validate(required, range(min = 0))]
    pub player_index: Option<i64>,
    #[serde(default)]
    #[validate(required)]
    pub name: Option<String>,
}

/// Player entry of [`GameStateResponse`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    /// Seconds banked at the last turn boundary.
    pub accumulated_seconds: u64,
    /// Banked seconds plus the running turn as of `serverTime`.
    pub elapsed_seconds: u64,
    /// Whether this player's clock is ticking right now.
    pub is_active: bool,
    /// Seconds left in count-down mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

/// Current game state together with its concurrency token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    /// Token to present on the next write.
    pub etag: String,
    pub player_count: usize,
    pub players: Vec<PlayerView>,
    /// `-1` until the game starts.
    pub active_player_index: i64,
    pub timer_mode: TimerMode,
    pub countdown_seconds: u32,
    pub is_paused: bool,
    pub turn_started_at: Option<String>,
    pub paused_at: Option<String>,
    /// Instant the elapsed values were computed at.
    pub server_time: String,
}

impl GameStateResponse {
    /// Project a stored game, computing live elapsed times as of `now`.
    pub fn at(game: &Versioned<GameState>, now: OffsetDateTime) -> Self {
        let state = &game.value;
        let players = state
            .players
            .iter()
            .zip(all_elapsed_at(state, now))
            .map(|(player, time)| PlayerView {
                id: player.id,
                name: player.name.clone(),
                accumulated_seconds: player.accumulated_seconds,
                elapsed_seconds: time.elapsed_seconds,
                is_active: time.is_active,
                remaining_seconds: (state.timer_mode == TimerMode::CountDown).then(|| {
                    u64::from(state.countdown_seconds).saturating_sub(time.elapsed_seconds)
                }),
            })
            .collect();

        Self {
            etag: game.etag.to_string(),
            player_count: state.player_count(),
            players,
            active_player_index: state.active_player.map_or(-1, |index| index as i64),
            timer_mode: state.timer_mode,
            countdown_seconds: state.countdown_seconds,
            is_paused: state.is_paused,
            turn_started_at: state.turn_started_at.map(format_timestamp),
            paused_at: state.paused_at.map(format_timestamp),
            server_time: format_timestamp(now),
        }
    }
}
