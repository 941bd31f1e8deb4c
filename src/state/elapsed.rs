//! Live elapsed-time computation.
//!
//! Stored documents only hold time banked at turn boundaries; the running
//! turn's share is derived here from `turn_started_at` and the wall clock.

use time::OffsetDateTime;

use crate::state::game::GameState;

/// Elapsed time of one player at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTime {
    pub index: usize,
    pub elapsed_seconds: u64,
    /// `true` only for the active player of an unpaused game.
    pub is_active: bool,
}

/// Total seconds for `index` using the current wall clock.
///
/// Returns `None` when `index` is not a valid player index.
pub fn compute_elapsed(state: &GameState, index: usize) -> Option<u64> {
    elapsed_seconds_at(state, index, OffsetDateTime::now_utc())
}

/// Total seconds for `index` as of `now`: banked seconds plus whole seconds
/// of the running turn. Sub-second remainders are truncated.
pub fn elapsed_seconds_at(state: &GameState, index: usize, now: OffsetDateTime) -> Option<u64> {
    let player = state.players.get(index)?;
    let banked = player.accumulated_seconds;

    if state.is_paused || state.active_player != Some(index) {
        return Some(banked);
    }
    let Some(started_at) = state.turn_started_at else {
        return Some(banked);
    };

    // A turn stamped in the future (clock skew between writers) counts as zero.
    let live = (now - started_at).whole_seconds().max(0) as u64;
    Some(banked + live)
}

/// Elapsed time and activity flag for every player using the current wall clock.
pub fn compute_all_elapsed(state: &GameState) -> Vec<PlayerTime> {
    all_elapsed_at(state, OffsetDateTime::now_utc())
}

/// Elapsed time and activity flag for every player as of `now`.
///
/// Responses pin a single `now` so every player's figure and the reported
/// server time agree; the wall-clock variants above would sample the clock
/// once per call.
pub fn all_elapsed_at(state: &GameState, now: OffsetDateTime) -> Vec<PlayerTime> {
    (0..state.players.len())
        .map(|index| PlayerTime {
            index,
            elapsed_seconds: elapsed_seconds_at(state, index, now).unwrap_or_default(),
            is_active: state.active_player == Some(index) && !state.is_paused,
        })
        .collect()
}
