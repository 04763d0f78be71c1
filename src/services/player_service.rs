//! Player-facing operations. Mutations go through the serializer; `validate_code` and
//! `check` are reads and only take the shared side of the gate.

use tracing::{debug, info};

use crate::{
    dto::{
        action::{
            AckResponse, CheckResponse, CompletionResponse, JoinResponse, ReconnectResponse,
            ReconnectStatus,
        },
        game::{GameSnapshot, PlayerView, Projection},
    },
    error::ServiceError,
    state::{
        SharedState,
        engine::{self, GameError, Membership},
        game::{Documents, now_ms},
        transitions::run_mutation,
    },
};

fn player_view(docs: &Documents, username: &str) -> Result<PlayerView, ServiceError> {
    let username = username.trim();
    docs.roster
        .get(username)
        .map(|player| PlayerView::project(player, false))
        .ok_or_else(|| GameError::PlayerNotFound(username.to_owned()).into())
}

/// Check an access code without touching state.
pub async fn validate_code(state: &SharedState, code: &str) -> Result<AckResponse, ServiceError> {
    let docs = state.read_documents().await?;
    engine::validate_access(&docs.game, code, now_ms())?;
    Ok(AckResponse::ok())
}

/// Add `username` to the roster, or refresh the avatar of an existing entry.
pub async fn join(
    state: &SharedState,
    username: &str,
    avatar: Option<String>,
) -> Result<JoinResponse, ServiceError> {
    let response = run_mutation(state, "join", |docs, now| {
        let membership = engine::join(docs, username, avatar, now)?;
        Ok(JoinResponse {
            player: player_view(docs, username)?,
            players: docs
                .roster
                .iter()
                .map(|player| PlayerView::project(player, false))
                .collect(),
            created: membership == Membership::Created,
        })
    })
    .await?;

    if response.created {
        info!(username = %response.player.username, "player joined");
    }
    Ok(response)
}

/// Remove `username` from the roster.
pub async fn leave(state: &SharedState, username: &str) -> Result<AckResponse, ServiceError> {
    let removed = run_mutation(state, "leave", |docs, _| Ok(engine::leave(docs, username)?)).await?;
    info!(username = %removed.username, "player left");
    Ok(AckResponse::ok())
}

/// Resume a persisted identity; the server's copy of the player wins.
pub async fn reconnect(
    state: &SharedState,
    username: &str,
) -> Result<ReconnectResponse, ServiceError> {
    run_mutation(state, "reconnect", |docs, now| {
        let status = match engine::reconnect(docs, username, now)? {
            Membership::Existing => ReconnectStatus::Resumed,
            Membership::Created => ReconnectStatus::Rejoined,
        };
        Ok(ReconnectResponse {
            status,
            player: player_view(docs, username)?,
            snapshot: GameSnapshot::project(docs, Projection::Public),
        })
    })
    .await
}

/// Presence refresh. A known player leaves the documents untouched.
pub async fn heartbeat(state: &SharedState, username: &str) -> Result<AckResponse, ServiceError> {
    let membership =
        run_mutation(state, "heartbeat", |docs, now| Ok(engine::heartbeat(docs, username, now)?))
            .await?;
    debug!(username, ?membership, "heartbeat");
    Ok(AckResponse::ok())
}

/// Compare an attempt with the round's solution.
pub async fn check(
    state: &SharedState,
    round_id: u8,
    attempt: &str,
) -> Result<CheckResponse, ServiceError> {
    let docs = state.read_documents().await?;
    let outcome = engine::check_solution(&docs.game, round_id, attempt)?;
    Ok(outcome.into())
}

/// Record a round completion for `username`.
pub async fn complete_round(
    state: &SharedState,
    username: &str,
    round_id: u8,
    elapsed_seconds: Option<u32>,
) -> Result<CompletionResponse, ServiceError> {
    let completion = run_mutation(state, "complete-round", |docs, now| {
        Ok(engine::complete_round(
            docs,
            username,
            round_id,
            elapsed_seconds,
            now,
        )?)
    })
    .await?;
    info!(username, round_id, ?completion, "round completed");
    Ok(completion.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        state::{AppState, game::ModeKind},
    };

    async fn lobby() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        let rules = state.rules();
        run_mutation(&state, "create-game", move |docs, now| {
            Ok(engine::create_game(docs, &rules, "lobby", now)?)
        })
        .await
        .unwrap();
        state
    }

    async fn start(state: &SharedState) {
        run_mutation(state, "start", |docs, now| Ok(engine::start(docs, now)?))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn validate_code_is_case_insensitive() {
        let state = lobby().await;
        assert!(validate_code(&state, "LoBbY").await.is_ok());
        let err = validate_code(&state, "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::InvalidCode)));
    }

    #[tokio::test]
    async fn expired_game_refuses_join() {
        let state = lobby().await;
        run_mutation(&state, "expire", |docs, _| {
            docs.game.expires_at = Some(0);
            Ok(())
        })
        .await
        .unwrap();

        let err = join(&state, "ada", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::GameExpired)));
    }

    #[tokio::test]
    async fn join_twice_keeps_one_entry() {
        let state = lobby().await;
        let first = join(&state, "ada", None).await.unwrap();
        let second = join(&state, "ada", Some("fox".into())).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.players.len(), 1);
        assert_eq!(second.player.avatar.as_deref(), Some("fox"));
    }

    #[tokio::test]
    async fn unknown_player_cannot_join_after_start() {
        let state = lobby().await;
        join(&state, "ada", None).await.unwrap();
        start(&state).await;

        let err = join(&state, "bob", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::GameAlreadyStarted)));
        assert!(join(&state, "ada", None).await.is_ok());
    }

    #[tokio::test]
    async fn reconnect_rejoins_only_in_the_lobby() {
        let state = lobby().await;
        let rejoined = reconnect(&state, "ada").await.unwrap();
        assert_eq!(rejoined.status, ReconnectStatus::Rejoined);

        start(&state).await;
        let resumed = reconnect(&state, "ada").await.unwrap();
        assert_eq!(resumed.status, ReconnectStatus::Resumed);

        let err = reconnect(&state, "ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::PlayerNotFound(_))));
    }

    #[tokio::test]
    async fn check_reveals_solution_only_when_correct() {
        let state = lobby().await;
        start(&state).await;
        let solution = state.config().default_rounds[0].solution.as_str().to_owned();

        let wrong = check(&state, 1, "zzzzzz").await.unwrap();
        assert!(!wrong.correct);
        assert!(wrong.solution.is_none());

        let right = check(&state, 1, &solution.to_lowercase()).await.unwrap();
        assert!(right.correct);
        assert_eq!(right.solution, Some(solution));
    }

    #[tokio::test]
    async fn free_mode_completion_advances_to_next_round() {
        let state = lobby().await;
        run_mutation(&state, "set-mode", |docs, now| {
            Ok(engine::set_mode(docs, ModeKind::Free, now)?)
        })
        .await
        .unwrap();
        join(&state, "ada", None).await.unwrap();
        start(&state).await;

        let first = complete_round(&state, "ada", 1, Some(30)).await.unwrap();
        assert_eq!(
            first,
            CompletionResponse::Free {
                next_round: Some(2),
                is_finished: false,
                round_time: 30
            }
        );

        for round in 2..=6 {
            complete_round(&state, "ada", round, Some(10)).await.unwrap();
        }
        let docs = state.read_documents().await.unwrap();
        let ada = docs.roster.get("ada").unwrap();
        assert!(ada.is_finished);
        assert_eq!(ada.total_time(), 80);
    }

    #[tokio::test]
    async fn leave_unknown_player_is_not_found() {
        let state = lobby().await;
        let err = leave(&state, "ghost").await.unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::PlayerNotFound(_))));
    }
}
