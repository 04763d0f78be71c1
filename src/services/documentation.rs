use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the puzzle sync backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::get_snapshot,
        crate::routes::game::post_action,
        crate::routes::game::put_round,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::action::GameAction,
            crate::dto::action::RoundUpdateRequest,
            crate::dto::action::ActionResponse,
            crate::dto::action::ReconnectStatus,
            crate::dto::game::GameSnapshot,
            crate::dto::game::GameStateView,
            crate::dto::game::RoundView,
            crate::dto::game::PlayerView,
            crate::dto::game::LeaderboardEntryView,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::error::ErrorBody,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game state, player and admin actions"),
        (name = "sse", description = "Server-sent snapshot streams"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in ["/api/game", "/api/game/events", "/api/game/admin/events", "/healthcheck"] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
