use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the turn timer backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::get_game,
        crate::routes::game::pause_game,
        crate::routes::game::resume_game,
        crate::routes::game::switch_turn,
        crate::routes::game::reset_game,
        crate::routes::game::update_config,
        crate::routes::game::rename_player,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::GameStateResponse,
            crate::dto::game::PlayerView,
            crate::dto::game::TokenRequest,
            crate::dto::game::UpdateConfigRequest,
            crate::dto::game::RenamePlayerRequest,
            crate::error::ErrorBody,
            crate::state::game::TimerMode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Shared turn timer state"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_game_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/api/game",
            "/api/game/pause",
            "/api/game/resume",
            "/api/game/switch-turn",
            "/api/game/reset",
            "/api/game/config",
            "/api/game/rename",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
