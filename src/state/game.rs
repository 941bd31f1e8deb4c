use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    dao::models::{GameEntity, PlayerEntity},
    state::transitions::TransitionError,
};

/// Player count used for a fresh or reset game.
pub const DEFAULT_PLAYER_COUNT: usize = 4;
/// Smallest player count accepted by a configuration update.
pub const MIN_PLAYER_COUNT: usize = 2;
/// Largest player count accepted by a configuration update.
pub const MAX_PLAYER_COUNT: usize = 6;
/// Count-down budget used when nothing else is configured.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 300;
/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_CHARS: usize = 100;

/// Direction the per-player clocks run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TimerMode {
    /// Show time spent so far.
    #[default]
    CountUp,
    /// Show time left out of `countdown_seconds`.
    CountDown,
}

impl TimerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::CountUp => "count-up",
            TimerMode::CountDown => "count-down",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = TransitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "count-up" => Ok(TimerMode::CountUp),
            "count-down" => Ok(TimerMode::CountDown),
            other => Err(TransitionError::InvalidTimerMode(other.to_string())),
        }
    }
}

/// A seat at the table and the time banked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier, never reassigned when the table shrinks.
    pub id: u32,
    pub name: String,
    /// Seconds banked at the last turn boundary, excluding the running turn.
    pub accumulated_seconds: u64,
}

impl Player {
    /// Fresh player with the generated `Player N` name and no banked time.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: default_player_name(id),
            accumulated_seconds: 0,
        }
    }
}

pub fn default_player_name(id: u32) -> String {
    format!("Player {id}")
}

/// The singleton shared game document.
///
/// `active_player` is `None` until the first turn starts. `turn_started_at`
/// is always set while a turn is running; while paused it may hold a stale
/// value which the elapsed-time calculator ignores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub players: Vec<Player>,
    pub active_player: Option<usize>,
    pub timer_mode: TimerMode,
    pub countdown_seconds: u32,
    pub is_paused: bool,
    pub turn_started_at: Option<OffsetDateTime>,
    pub paused_at: Option<OffsetDateTime>,
}

impl GameState {
    /// Not-started, paused game with `player_count` default players.
    ///
    /// This is the one canonical default: lazy creation and reset both use it.
    pub fn new(player_count: usize, countdown_seconds: u32) -> Self {
        Self {
            players: (1..=player_count as u32).map(Player::new).collect(),
            active_player: None,
            timer_mode: TimerMode::CountUp,
            countdown_seconds,
            is_paused: true,
            turn_started_at: None,
            paused_at: None,
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether some player's clock is currently ticking.
    pub fn is_running(&self) -> bool {
        !self.is_paused && self.active_player.is_some()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER_COUNT, DEFAULT_COUNTDOWN_SECONDS)
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            accumulated_seconds: value.accumulated_seconds,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            accumulated_seconds: value.accumulated_seconds,
        }
    }
}

impl From<GameState> for GameEntity {
    fn from(value: GameState) -> Self {
        Self {
            player_count: value.players.len() as u32,
            active_player_index: value
                .active_player
                .and_then(|index| i32::try_from(index).ok())
                .unwrap_or(-1),
            players: value.players.into_iter().map(Into::into).collect(),
            timer_mode: value.timer_mode.as_str().to_string(),
            countdown_seconds: value.countdown_seconds,
            is_paused: value.is_paused,
            turn_started_at: value.turn_started_at,
            paused_at: value.paused_at,
        }
    }
}

/// Reason a stored document cannot be turned into a [`GameState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEntity {
    #[error("playerCount {declared} does not match {actual} stored players")]
    PlayerCountMismatch { declared: u32, actual: usize },
    #[error("{0} stored players is outside the supported range")]
    PlayerCountOutOfRange(usize),
    #[error("activePlayerIndex {0} is out of range")]
    ActivePlayerOutOfRange(i32),
    #[error("unknown timerMode `{0}`")]
    TimerMode(String),
}

impl TryFrom<GameEntity> for GameState {
    type Error = InvalidEntity;

    fn try_from(value: GameEntity) -> Result<Self, Self::Error> {
        if value.player_count as usize != value.players.len() {
            return Err(InvalidEntity::PlayerCountMismatch {
                declared: value.player_count,
                actual: value.players.len(),
            });
        }

        if !(MIN_PLAYER_COUNT..=MAX_PLAYER_COUNT).contains(&value.players.len()) {
            return Err(InvalidEntity::PlayerCountOutOfRange(value.players.len()));
        }

        let active_player = match value.active_player_index {
            -1 => None,
            index if index >= 0 && (index as usize) < value.players.len() => Some(index as usize),
            other => return Err(InvalidEntity::ActivePlayerOutOfRange(other)),
        };

        let timer_mode = value
            .timer_mode
            .parse::<TimerMode>()
            .map_err(|_| InvalidEntity::TimerMode(value.timer_mode.clone()))?;

        Ok(Self {
            players: value.players.into_iter().map(Into::into).collect(),
            active_player,
            timer_mode,
            countdown_seconds: value.countdown_seconds,
            is_paused: value.is_paused,
            turn_started_at: value.turn_started_at,
            paused_at: value.paused_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn default_game_is_paused_and_not_started() {
        let game = GameState::default();
        assert_eq!(game.player_count(), DEFAULT_PLAYER_COUNT);
        assert_eq!(game.active_player, None);
        assert!(game.is_paused);
        assert!(!game.is_running());
        assert_eq!(game.turn_started_at, None);
        assert_eq!(game.paused_at, None);
        let names: Vec<_> = game.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Player 1", "Player 2", "Player 3", "Player 4"]);
        assert!(game.players.iter().all(|p| p.accumulated_seconds == 0));
    }

    #[test]
    fn no_active_player_is_stored_as_minus_one() {
        let entity: GameEntity = GameState::default().into();
        assert_eq!(entity.active_player_index, -1);
        assert_eq!(entity.player_count, 4);
        assert_eq!(entity.timer_mode, "count-up");

        let back = GameState::try_from(entity).unwrap();
        assert_eq!(back.active_player, None);
    }

    #[test]
    fn entity_round_trip_keeps_running_turn() {
        let mut game = GameState::default();
        game.active_player = Some(2);
        game.is_paused = false;
        game.timer_mode = TimerMode::CountDown;
        game.turn_started_at = Some(datetime!(2024-05-01 12:00:00 UTC));

        let entity: GameEntity = game.clone().into();
        assert_eq!(entity.active_player_index, 2);
        assert_eq!(GameState::try_from(entity).unwrap(), game);
    }

    #[test]
    fn entity_json_uses_camel_case_and_rfc3339() {
        let mut game = GameState::default();
        game.turn_started_at = Some(datetime!(2024-05-01 12:00:00 UTC));
        let json = serde_json::to_value(GameEntity::from(game)).unwrap();
        assert_eq!(json["activePlayerIndex"], -1);
        assert_eq!(json["turnStartedAt"], "2024-05-01T12:00:00Z");
        assert_eq!(json["pausedAt"], serde_json::Value::Null);
        assert_eq!(json["players"][0]["accumulatedSeconds"], 0);
    }

    #[test]
    fn rejects_inconsistent_entities() {
        let mut entity: GameEntity = GameState::default().into();
        entity.player_count = 5;
        assert!(matches!(
            GameState::try_from(entity.clone()),
            Err(InvalidEntity::PlayerCountMismatch { .. })
        ));

        entity.player_count = 4;
        entity.active_player_index = 4;
        assert_eq!(
            GameState::try_from(entity.clone()),
            Err(InvalidEntity::ActivePlayerOutOfRange(4))
        );

        entity.active_player_index = -2;
        assert_eq!(
            GameState::try_from(entity.clone()),
            Err(InvalidEntity::ActivePlayerOutOfRange(-2))
        );

        entity.active_player_index = 0;
        entity.timer_mode = "sideways".into();
        assert_eq!(
            GameState::try_from(entity),
            Err(InvalidEntity::TimerMode("sideways".into()))
        );
    }

    #[test]
    fn timer_mode_parses_only_known_values() {
        assert_eq!("count-up".parse::<TimerMode>().unwrap(), TimerMode::CountUp);
        assert_eq!(
            "count-down".parse::<TimerMode>().unwrap(),
            TimerMode::CountDown
        );
        assert!("countdown".parse::<TimerMode>().is_err());
        assert!("".parse::<TimerMode>().is_err());
    }
}
