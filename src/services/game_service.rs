//! Business logic behind the game routes: load (or lazily create) the shared
//! document, derive the next state and persist it through the retry driver.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use validator::Validate;

use crate::{
    config::AppConfig,
    dao::{
        game_store::GameStore,
        models::{CURRENT_GAME_KEY, GameEntity},
        storage::{ETag, StorageError, Versioned},
    },
    dto::game::{RenamePlayerRequest, TokenRequest, UpdateConfigRequest},
    error::ServiceError,
    services::retry::retry_update,
    state::{
        SharedState,
        game::{DEFAULT_PLAYER_COUNT, GameState},
        transitions::{self, ConfigUpdate},
    },
};

/// Pick the client's concurrency token, preferring the `If-Match` header.
///
/// Blank values count as missing.
pub fn require_token(
    header: Option<&str>,
    body: Option<&str>,
) -> Result<ETag, ServiceError> {
    header
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| body.map(str::trim).filter(|value| !value.is_empty()))
        .map(ETag::new)
        .ok_or(ServiceError::MissingToken)
}

/// Current game and token, creating the default document on first access.
pub async fn get_state(state: &SharedState) -> Result<Versioned<GameState>, ServiceError> {
    let store = state.require_game_store().await?;
    load_or_create(store.as_ref(), state.config()).await
}

/// Bank the running turn and stop the clock.
pub async fn pause(
    state: &SharedState,
    token: ETag,
    request: TokenRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    apply(state, token, "pause", |game, now| {
        Ok(transitions::pause(game, now))
    })
    .await
}

/// Restart the clock for the active player.
pub async fn resume(
    state: &SharedState,
    token: ETag,
    request: TokenRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    apply(state, token, "resume", |game, now| {
        Ok(transitions::resume(game, now))
    })
    .await
}

/// Pass the turn to the next player, starting the game if needed.
pub async fn switch_turn(
    state: &SharedState,
    token: ETag,
    request: TokenRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    apply(state, token, "switch_turn", |game, now| {
        Ok(transitions::switch_turn(game, now))
    })
    .await
}

/// Replace the game with the default, not-started document.
pub async fn reset(
    state: &SharedState,
    token: ETag,
    request: TokenRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    let countdown_seconds = state.config().default_countdown_seconds;
    apply(state, token, "reset", move |_, _| {
        Ok(transitions::reset(countdown_seconds))
    })
    .await
}

/// Apply a bulk configuration update.
pub async fn update_config(
    state: &SharedState,
    token: ETag,
    request: UpdateConfigRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    let update = ConfigUpdate::from(request);
    if update.is_empty() {
        return Err(transitions::TransitionError::NothingToUpdate.into());
    }
    apply(state, token, "update_config", move |game, now| {
        transitions::update_config(game, &update, now).map_err(Into::into)
    })
    .await
}

/// Rename one player.
pub async fn rename_player(
    state: &SharedState,
    token: ETag,
    request: RenamePlayerRequest,
) -> Result<Versioned<GameState>, ServiceError> {
    request.validate()?;
    let index = request.player_index.unwrap_or(-1);
    let name = request.name.unwrap_or_default();
    apply(state, token, "rename_player", move |game, _| {
        transitions::rename_player(game, index, &name).map_err(Into::into)
    })
    .await
}

/// Read, transform and conditionally write the shared game document.
async fn apply<F>(
    state: &SharedState,
    token: ETag,
    operation: &'static str,
    transition: F,
) -> Result<Versioned<GameState>, ServiceError>
where
    F: FnOnce(&GameState, OffsetDateTime) -> Result<GameState, ServiceError>,
{
    let store = state.require_game_store().await?;
    let current = load_or_create(store.as_ref(), state.config()).await?;
    if current.etag != token {
        debug!(operation, client = %token, latest = %current.etag, "client token is stale");
    }

    let candidate = transition(&current.value, OffsetDateTime::now_utc())?;
    let updated = persist(store, candidate, token, state.config()).await?;

    info!(
        operation,
        etag = %updated.etag,
        running = updated.value.is_running(),
        "game state updated"
    );
    Ok(updated)
}

async fn persist(
    store: Arc<dyn GameStore>,
    candidate: GameState,
    token: ETag,
    config: &AppConfig,
) -> Result<Versioned<GameState>, ServiceError> {
    let writer = store.clone();
    retry_update(
        candidate,
        token,
        config.retry,
        |game: GameState, etag: ETag| {
            writer.replace(CURRENT_GAME_KEY, GameEntity::from(game), etag)
        },
        || store.read(CURRENT_GAME_KEY),
    )
    .await
}

async fn load_or_create(
    store: &dyn GameStore,
    config: &AppConfig,
) -> Result<Versioned<GameState>, ServiceError> {
    match store.read(CURRENT_GAME_KEY).await {
        Ok(stored) => decode(stored),
        Err(StorageError::NotFound { .. }) => {
            let game = GameState::new(DEFAULT_PLAYER_COUNT, config.default_countdown_seconds);
            match store.create(CURRENT_GAME_KEY, game.clone().into()).await {
                Ok(etag) => {
                    info!(etag = %etag, "created default game state");
                    Ok(Versioned::new(game, etag))
                }
                // Another request created it first; use theirs.
                Err(err) if err.is_version_conflict() => {
                    decode(store.read(CURRENT_GAME_KEY).await?)
                }
                Err(err) => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn decode(stored: Versioned<GameEntity>) -> Result<Versioned<GameState>, ServiceError> {
    let Versioned { value, etag } = stored;
    GameState::try_from(value)
        .map(|game| Versioned::new(game, etag))
        .map_err(|err| ServiceError::invalid_document(CURRENT_GAME_KEY, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::game_store::memory::MemoryGameStore,
        state::{AppState, game::TimerMode},
    };

    async fn setup() -> (SharedState, MemoryGameStore) {
        let store = MemoryGameStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        (state, store)
    }

    #[test]
    fn header_token_wins_over_body() {
        assert_eq!(
            require_token(Some("W/\"2\""), Some("W/\"1\"")).unwrap(),
            ETag::new("W/\"2\"")
        );
        assert_eq!(
            require_token(Some("  "), Some("W/\"1\"")).unwrap(),
            ETag::new("W/\"1\"")
        );
        assert!(matches!(
            require_token(None, Some("")),
            Err(ServiceError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn first_read_creates_default_document() {
        let (state, store) = setup().await;
        let game = get_state(&state).await.unwrap();
        assert_eq!(game.value, GameState::default());

        let stored = store.read(CURRENT_GAME_KEY).await.unwrap();
        assert_eq!(stored.etag, game.etag);

        let again = get_state(&state).await.unwrap();
        assert_eq!(again.etag, game.etag);
    }

    #[tokio::test]
    async fn switch_turn_starts_then_advances() {
        let (state, _) = setup().await;
        let initial = get_state(&state).await.unwrap();

        let started = switch_turn(&state, initial.etag.clone(), TokenRequest::default())
            .await
            .unwrap();
        assert_eq!(started.value.active_player, Some(0));
        assert!(!started.value.is_paused);
        assert_ne!(started.etag, initial.etag);

        let next = switch_turn(&state, started.etag.clone(), TokenRequest::default())
            .await
            .unwrap();
        assert_eq!(next.value.active_player, Some(1));
    }

    #[tokio::test]
    async fn stale_token_still_lands_after_refresh() {
        let (state, _) = setup().await;
        let initial = get_state(&state).await.unwrap();
        let moved = switch_turn(&state, initial.etag.clone(), TokenRequest::default())
            .await
            .unwrap();

        let paused = pause(&state, initial.etag, TokenRequest::default())
            .await
            .unwrap();
        assert!(paused.value.is_paused);
        assert_ne!(paused.etag, moved.etag);
    }

    #[tokio::test]
    async fn invalid_config_leaves_store_untouched() {
        let (state, store) = setup().await;
        let initial = get_state(&state).await.unwrap();

        let err = update_config(
            &state,
            initial.etag.clone(),
            UpdateConfigRequest {
                player_count: Some(9),
                ..UpdateConfigRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidInput {
                kind: "invalid_player_count",
                ..
            }
        ));

        let err = update_config(
            &state,
            initial.etag.clone(),
            UpdateConfigRequest {
                player_names: Some(vec!["Solo".into()]),
                ..UpdateConfigRequest::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidInput {
                kind: "player_names_mismatch",
                ..
            }
        ));

        let err = update_config(&state, initial.etag.clone(), UpdateConfigRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidInput {
                kind: "nothing_to_update",
                ..
            }
        ));

        assert_eq!(store.read(CURRENT_GAME_KEY).await.unwrap().etag, initial.etag);
    }

    #[tokio::test]
    async fn config_and_rename_are_persisted() {
        let (state, store) = setup().await;
        let initial = get_state(&state).await.unwrap();

        let updated = update_config(
            &state,
            initial.etag,
            UpdateConfigRequest {
                player_count: Some(3),
                timer_mode: Some("count-down".into()),
                countdown_seconds: Some(120),
                player_names: Some(vec!["Ann".into(), "Bo".into(), "Cy".into()]),
                ..UpdateConfigRequest::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.value.player_count(), 3);
        assert_eq!(updated.value.timer_mode, TimerMode::CountDown);

        let renamed = rename_player(
            &state,
            updated.etag,
            RenamePlayerRequest {
                player_index: Some(1),
                name: Some("Bob".into()),
                ..RenamePlayerRequest::default()
            },
        )
        .await
        .unwrap();

        let stored = GameState::try_from(store.read(CURRENT_GAME_KEY).await.unwrap().value).unwrap();
        assert_eq!(stored, renamed.value);
        assert_eq!(stored.players[1].name, "Bob");
        assert_eq!(stored.countdown_seconds, 120);
    }

    #[tokio::test]
    async fn reset_restores_default_document() {
        let (state, _) = setup().await;
        let initial = get_state(&state).await.unwrap();
        let started = switch_turn(&state, initial.etag, TokenRequest::default())
            .await
            .unwrap();

        let fresh = reset(&state, started.etag, TokenRequest::default())
            .await
            .unwrap();
        assert_eq!(fresh.value, GameState::default());
    }

    #[tokio::test]
    async fn degraded_mode_rejects_operations() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            get_state(&state).await,
            Err(ServiceError::Degraded)
        ));
        assert!(matches!(
            pause(&state, ETag::new("x"), TokenRequest::default()).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn corrupt_document_is_a_storage_error() {
        let (state, store) = setup().await;
        let mut entity = GameEntity::from(GameState::default());
        entity.player_count = 9;
        store.create(CURRENT_GAME_KEY, entity).await.unwrap();

        assert!(matches!(
            get_state(&state).await,
            Err(ServiceError::Storage(StorageError::InvalidDocument { .. }))
        ));
    }

    #[tokio::test]
    async fn offline_store_is_a_storage_error() {
        let (state, store) = setup().await;
        store.set_available(false);
        assert!(matches!(
            get_state(&state).await,
            Err(ServiceError::Storage(StorageError::Unavailable { .. }))
        ));
    }
}
