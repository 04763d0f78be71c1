//! Read-only snapshot served by `GET /api/game`.

use crate::{
    dto::game::{GameSnapshot, Projection},
    error::ServiceError,
    services::admin_service,
    state::SharedState,
};

/// Current snapshot for the caller's audience.
///
/// Without a session the public projection is returned. A presented session must be the
/// bound admin one.
pub async fn snapshot(
    state: &SharedState,
    admin_session: Option<&str>,
) -> Result<GameSnapshot, ServiceError> {
    match admin_session {
        Some(session) => {
            let docs = admin_service::authorize(state, session).await?;
            Ok(GameSnapshot::project(
                &docs,
                Projection::Admin {
                    connected_players: state.connected_players(),
                },
            ))
        }
        None => {
            let docs = state.read_documents().await?;
            Ok(GameSnapshot::project(&docs, Projection::Public))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState,
    };

    #[tokio::test]
    async fn blank_store_yields_no_game() {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;

        let snapshot = snapshot(&state, None).await.unwrap();
        assert!(!snapshot.game_state.has_game);
        assert!(snapshot.players.is_empty());
        assert!(
            snapshot
                .game_state
                .rounds
                .iter()
                .all(|round| round.solution.is_none() && round.hints.is_empty())
        );
    }

    #[tokio::test]
    async fn unknown_admin_session_is_unauthorized() {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;

        let err = snapshot(&state, Some("forged")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
