use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// The `/api/game` resource.
pub mod game;
/// Health check.
pub mod health;
/// Event streams.
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(game::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
