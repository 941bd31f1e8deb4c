use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::{
    dao::storage::Versioned,
    dto::game::{GameStateResponse, RenamePlayerRequest, TokenRequest, UpdateConfigRequest},
    error::{AppError, ErrorBody},
    services::game_service::{self, require_token},
    state::{SharedState, game::GameState},
};

/// Routes reading and mutating the shared turn timer.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/game", get(get_game))
        .route("/api/game/pause", post(pause_game))
        .route("/api/game/resume", post(resume_game))
        .route("/api/game/switch-turn", post(switch_turn))
        .route("/api/game/reset", post(reset_game))
        .route("/api/game/config", post(update_config))
        .route("/api/game/rename", post(rename_player))
}

/// Current game state, created with defaults on first access.
#[utoipa::path(
    get,
    path = "/api/game",
    tag = "game",
    responses(
        (status = 200, description = "Current game state", body = GameStateResponse),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn get_game(State(state): State<SharedState>) -> Result<Response, AppError> {
    Ok(respond(game_service::get_state(&state).await?))
}

/// Pause the running turn, banking the active player's time.
#[utoipa::path(
    post,
    path = "/api/game/pause",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Game paused", body = GameStateResponse),
        (status = 400, description = "Missing token or malformed body", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: TokenRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(game_service::pause(&state, token, request).await?))
}

/// Restart the clock for the active player.
#[utoipa::path(
    post,
    path = "/api/game/resume",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Game resumed", body = GameStateResponse),
        (status = 400, description = "Missing token or malformed body", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: TokenRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(game_service::resume(&state, token, request).await?))
}

/// Hand the turn to the next player, starting the game when needed.
#[utoipa::path(
    post,
    path = "/api/game/switch-turn",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Turn switched", body = GameStateResponse),
        (status = 400, description = "Missing token or malformed body", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn switch_turn(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: TokenRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(game_service::switch_turn(&state, token, request).await?))
}

/// Replace the game with a fresh, not-started default.
#[utoipa::path(
    post,
    path = "/api/game/reset",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Game reset", body = GameStateResponse),
        (status = 400, description = "Missing token or malformed body", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn reset_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: TokenRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(game_service::reset(&state, token, request).await?))
}

/// Update player count, timer mode, countdown and/or names in one write.
#[utoipa::path(
    post,
    path = "/api/game/config",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = UpdateConfigRequest,
    responses(
        (status = 200, description = "Configuration applied", body = GameStateResponse),
        (status = 400, description = "Invalid configuration", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: UpdateConfigRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(
        game_service::update_config(&state, token, request).await?,
    ))
}

/// Rename a single player.
#[utoipa::path(
    post,
    path = "/api/game/rename",
    tag = "game",
    params(("If-Match" = Option<String>, Header, description = "Concurrency token; overrides the body `etag`")),
    request_body = RenamePlayerRequest,
    responses(
        (status = 200, description = "Player renamed", body = GameStateResponse),
        (status = 400, description = "Invalid index or name", body = ErrorBody),
        (status = 409, description = "Concurrent writers kept winning", body = ErrorBody)
    )
)]
pub async fn rename_player(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: RenamePlayerRequest = parse_body(&body)?;
    let token = require_token(if_match(&headers), request.etag.as_deref())?;
    Ok(respond(
        game_service::rename_player(&state, token, request).await?,
    ))
}

fn respond(game: Versioned<GameState>) -> Response {
    let body = GameStateResponse::at(&game, OffsetDateTime::now_utc());
    ([(header::ETAG, game.etag.to_string())], Json(body)).into_response()
}

fn if_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::IF_MATCH)
        .and_then(|value| value.to_str().ok())
}

/// Decode a JSON body; an empty body yields the request's defaults.
fn parse_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::bad_request("invalid_body", format!("invalid JSON body: {err}")))
}
