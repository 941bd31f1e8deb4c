//! Pure state transitions applied to the shared game document.
//!
//! Every function derives a candidate [`GameState`] from the current one and
//! the caller-supplied `now`; persisting the candidate is the caller's job.

use thiserror::Error;
use time::OffsetDateTime;

use crate::state::{
    elapsed::elapsed_seconds_at,
    game::{
        DEFAULT_PLAYER_COUNT, GameState, MAX_PLAYER_COUNT, MAX_PLAYER_NAME_CHARS,
        MIN_PLAYER_COUNT, Player, TimerMode,
    },
};

/// Client input rejected by a transition. No transition mutates anything on error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("player count must be between 2 and 6 (got {0})")]
    PlayerCountOutOfRange(i64),
    #[error("timer mode must be `count-up` or `count-down` (got `{0}`)")]
    InvalidTimerMode(String),
    #[error("countdown seconds must be a positive number (got {0})")]
    InvalidCountdown(i64),
    #[error("expected {expected} player names, got {actual}")]
    PlayerNamesLengthMismatch { expected: usize, actual: usize },
    #[error("nothing to update")]
    NothingToUpdate,
    #[error("player index {index} is out of range for {count} players")]
    PlayerIndexOutOfRange { index: i64, count: usize },
    #[error("invalid player name: {0}")]
    InvalidPlayerName(&'static str),
}

impl TransitionError {
    /// Stable machine-readable tag reported to clients.
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::PlayerCountOutOfRange(_) => "invalid_player_count",
            TransitionError::InvalidTimerMode(_) => "invalid_timer_mode",
            TransitionError::InvalidCountdown(_) => "invalid_countdown",
            TransitionError::PlayerNamesLengthMismatch { .. } => "player_names_mismatch",
            TransitionError::NothingToUpdate => "nothing_to_update",
            TransitionError::PlayerIndexOutOfRange { .. } => "invalid_player_index",
            TransitionError::InvalidPlayerName(_) => "invalid_player_name",
        }
    }
}

/// Optional fields of a configuration update, as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub player_count: Option<i64>,
    pub timer_mode: Option<String>,
    pub countdown_seconds: Option<i64>,
    pub player_names: Option<Vec<String>>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.player_count.is_none()
            && self.timer_mode.is_none()
            && self.countdown_seconds.is_none()
            && self.player_names.is_none()
    }
}

/// Move the active player's live time into their banked seconds.
fn bank_active_player(state: &mut GameState, now: OffsetDateTime) {
    let Some(index) = state.active_player else {
        return;
    };
    if let Some(elapsed) = elapsed_seconds_at(state, index, now) {
        state.players[index].accumulated_seconds = elapsed;
    }
}

/// Stop the clock, banking the active player's running turn.
///
/// Pausing an already paused game changes nothing.
pub fn pause(state: &GameState, now: OffsetDateTime) -> GameState {
    let mut next = state.clone();
    if next.is_paused {
        return next;
    }
    bank_active_player(&mut next, now);
    next.is_paused = true;
    next.paused_at = Some(now);
    next
}

/// Restart the clock with a fresh timing window for the active player.
///
/// Resuming a game that is not paused changes nothing, so a running turn
/// never loses unbanked time. A game that has not started stays paused
/// until a turn switch picks the first player.
pub fn resume(state: &GameState, now: OffsetDateTime) -> GameState {
    let mut next = state.clone();
    if !next.is_paused || next.active_player.is_none() {
        return next;
    }
    next.is_paused = false;
    next.paused_at = None;
    next.turn_started_at = Some(now);
    next
}

/// Hand the turn to the next player, or start the game from player 0.
///
/// Switching while paused banks nothing new and keeps the game paused.
pub fn switch_turn(state: &GameState, now: OffsetDateTime) -> GameState {
    let mut next = state.clone();
    match next.active_player {
        None => {
            next.active_player = Some(0);
            next.is_paused = false;
            next.paused_at = None;
        }
        Some(current) => {
            bank_active_player(&mut next, now);
            next.active_player = Some((current + 1) % next.players.len());
        }
    }
    next.turn_started_at = Some(now);
    next
}

/// Replace the whole game with the canonical not-started default.
pub fn reset(countdown_seconds: u32) -> GameState {
    GameState::new(DEFAULT_PLAYER_COUNT, countdown_seconds)
}

/// Apply any subset of player count, timer mode, countdown and names.
///
/// Every field is validated before anything is applied; the first invalid
/// field aborts the whole update.
pub fn update_config(
    state: &GameState,
    update: &ConfigUpdate,
    now: OffsetDateTime,
) -> Result<GameState, TransitionError> {
    if update.is_empty() {
        return Err(TransitionError::NothingToUpdate);
    }

    let player_count = update
        .player_count
        .map(|count| {
            usize::try_from(count)
                .ok()
                .filter(|count| (MIN_PLAYER_COUNT..=MAX_PLAYER_COUNT).contains(count))
                .ok_or(TransitionError::PlayerCountOutOfRange(count))
        })
        .transpose()?;

    let timer_mode = update
        .timer_mode
        .as_deref()
        .map(str::parse::<TimerMode>)
        .transpose()?;

    let countdown_seconds = update
        .countdown_seconds
        .map(|seconds| {
            u32::try_from(seconds)
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or(TransitionError::InvalidCountdown(seconds))
        })
        .transpose()?;

    let target_count = player_count.unwrap_or(state.players.len());
    let player_names = update
        .player_names
        .as_ref()
        .map(|names| {
            if names.len() != target_count {
                return Err(TransitionError::PlayerNamesLengthMismatch {
                    expected: target_count,
                    actual: names.len(),
                });
            }
            names
                .iter()
                .map(String::as_str)
                .map(validate_player_name)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let mut next = state.clone();

    if let Some(count) = player_count {
        resize_players(&mut next, count, now);
    }
    if let Some(mode) = timer_mode {
        next.timer_mode = mode;
    }
    if let Some(seconds) = countdown_seconds {
        next.countdown_seconds = seconds;
    }
    if let Some(names) = player_names {
        for (player, name) in next.players.iter_mut().zip(names) {
            player.name = name;
        }
    }

    Ok(next)
}

/// Grow by appending default players or shrink by dropping the tail.
///
/// When the active player is dropped, the turn moves to player 0 with a
/// fresh timing window.
fn resize_players(state: &mut GameState, count: usize, now: OffsetDateTime) {
    if count < state.players.len() {
        state.players.truncate(count);
    } else {
        let first_new = state.players.len() as u32 + 1;
        let last_new = count as u32;
        state.players.extend((first_new..=last_new).map(Player::new));
    }

    if state.active_player.is_some_and(|index| index >= count) {
        state.active_player = Some(0);
        if state.turn_started_at.is_some() {
            state.turn_started_at = Some(now);
        }
    }
}

/// Rename the player at a 0-based `index`.
pub fn rename_player(
    state: &GameState,
    index: i64,
    name: &str,
) -> Result<GameState, TransitionError> {
    let position = usize::try_from(index)
        .ok()
        .filter(|position| *position < state.players.len())
        .ok_or(TransitionError::PlayerIndexOutOfRange {
            index,
            count: state.players.len(),
        })?;
    let name = validate_player_name(name)?;

    let mut next = state.clone();
    next.players[position].name = name;
    Ok(next)
}

/// Trim and check a display name: 1 to 100 characters, no control characters.
pub fn validate_player_name(name: &str) -> Result<String, TransitionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TransitionError::InvalidPlayerName("name must not be empty"));
    }
    if trimmed.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(TransitionError::InvalidPlayerName(
            "name must be at most 100 characters",
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(TransitionError::InvalidPlayerName(
            "name must not contain control characters",
        ));
    }
    Ok(trimmed.to_string())
}
