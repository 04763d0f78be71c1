use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health and the number of live player streams, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let connected_players = state.connected_players();
    if state.is_degraded().await {
        HealthResponse::degraded(connected_players)
    } else {
        HealthResponse::ok(connected_players)
    }
}
