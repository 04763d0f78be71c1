use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    routing::get,
};
use tracing::debug;
use validator::Validate;

use crate::{
    dto::{
        action::{ActionResponse, GameAction, RoundUpdateRequest},
        game::GameSnapshot,
    },
    error::{AppError, ErrorBody},
    services::{admin_service, player_service, public_service},
    state::SharedState,
};

/// Header carrying the session issued by `admin-login`.
pub const ADMIN_SESSION_HEADER: &str = "x-admin-session";

/// Routes of the single game resource.
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/api/game",
        get(get_snapshot).post(post_action).put(put_round),
    )
}

/// Admin session presented by the caller, if any.
pub(crate) fn admin_session(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn require_session(session: Option<&str>) -> Result<&str, AppError> {
    session.ok_or_else(|| AppError::Unauthorized {
        code: "Unauthorized",
        message: format!("missing admin session header `{ADMIN_SESSION_HEADER}`"),
    })
}

/// Current snapshot: public projection, or the admin one when the session header is set.
#[utoipa::path(
    get,
    path = "/api/game",
    tag = "game",
    params(("x-admin-session" = Option<String>, Header, description = "Admin session issued by `admin-login`")),
    responses(
        (status = 200, description = "Current game snapshot", body = GameSnapshot),
        (status = 401, description = "Session is not the bound admin one", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn get_snapshot(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<GameSnapshot>, AppError> {
    Ok(Json(
        public_service::snapshot(&state, admin_session(&headers)).await?,
    ))
}

/// Perform one action against the game. Admin actions require the session header.
#[utoipa::path(
    post,
    path = "/api/game",
    tag = "game",
    params(("x-admin-session" = Option<String>, Header, description = "Admin session issued by `admin-login`")),
    request_body = GameAction,
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Invalid input or failed precondition", body = ErrorBody),
        (status = 401, description = "Invalid code or admin session", body = ErrorBody),
        (status = 404, description = "No game, player or round", body = ErrorBody),
        (status = 409, description = "Another admin is connected", body = ErrorBody),
        (status = 410, description = "Game expired", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn post_action(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<GameAction>, JsonRejection>,
) -> Result<Json<ActionResponse>, AppError> {
    let Json(action) = payload?;
    action.validate()?;
    debug!(action = action.name(), "game action received");
    let session = admin_session(&headers);
    if action.requires_admin() {
        require_session(session)?;
    }

    let response = dispatch(&state, session, action).await?;
    Ok(Json(response))
}

async fn dispatch(
    state: &SharedState,
    session: Option<&str>,
    action: GameAction,
) -> Result<ActionResponse, AppError> {
    let response = match action {
        GameAction::ValidateCode { code } => {
            ActionResponse::Ack(player_service::validate_code(state, &code).await?)
        }
        GameAction::Join { username, avatar } => {
            ActionResponse::Joined(player_service::join(state, &username, avatar).await?)
        }
        GameAction::Leave { username } => {
            ActionResponse::Ack(player_service::leave(state, &username).await?)
        }
        GameAction::Reconnect { username } => {
            ActionResponse::Reconnected(player_service::reconnect(state, &username).await?)
        }
        GameAction::Heartbeat { username } => {
            ActionResponse::Ack(player_service::heartbeat(state, &username).await?)
        }
        GameAction::Check { round_id, attempt } => {
            ActionResponse::Checked(player_service::check(state, round_id, &attempt).await?)
        }
        GameAction::CompleteRound {
            username,
            round_id,
            elapsed_seconds,
        } => ActionResponse::Completed(
            player_service::complete_round(state, &username, round_id, elapsed_seconds).await?,
        ),
        GameAction::AdminLogin {
            password,
            session_id,
        } => ActionResponse::AdminSession(
            admin_service::admin_login(
                state,
                password.as_deref(),
                session_id.as_deref().or(session),
            )
            .await?,
        ),
        GameAction::CreateGame { code } => ActionResponse::Created(
            admin_service::create_game(state, require_session(session)?, code).await?,
        ),
        GameAction::Start => {
            ActionResponse::Ack(admin_service::start(state, require_session(session)?).await?)
        }
        GameAction::Stop => {
            ActionResponse::Ack(admin_service::stop(state, require_session(session)?).await?)
        }
        GameAction::SetMode { mode } => ActionResponse::Ack(
            admin_service::set_mode(state, require_session(session)?, mode).await?,
        ),
        GameAction::LaunchRound => ActionResponse::RoundLaunched(
            admin_service::launch_round(state, require_session(session)?).await?,
        ),
        GameAction::EndRound => ActionResponse::RoundEnded(
            admin_service::end_round(state, require_session(session)?).await?,
        ),
        GameAction::RevealHint { round_id } => ActionResponse::HintRevealed(
            admin_service::reveal_hint(state, require_session(session)?, round_id).await?,
        ),
        GameAction::Reset => {
            ActionResponse::Ack(admin_service::reset(state, require_session(session)?).await?)
        }
        GameAction::EndGame => {
            ActionResponse::Ack(admin_service::end_game(state, require_session(session)?).await?)
        }
        GameAction::AdminLogout => ActionResponse::Ack(
            admin_service::admin_logout(state, require_session(session)?).await?,
        ),
    };
    Ok(response)
}

/// Edit one authored round.
#[utoipa::path(
    put,
    path = "/api/game",
    tag = "game",
    params(("x-admin-session" = String, Header, description = "Admin session issued by `admin-login`")),
    request_body = RoundUpdateRequest,
    responses(
        (status = 200, description = "Round updated; admin snapshot", body = GameSnapshot),
        (status = 400, description = "Invalid round edit", body = ErrorBody),
        (status = 401, description = "Missing or foreign admin session", body = ErrorBody)
    )
)]
pub async fn put_round(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<RoundUpdateRequest>, JsonRejection>,
) -> Result<Json<GameSnapshot>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let session = require_session(admin_session(&headers))?;
    Ok(Json(
        admin_service::update_round(&state, session, request).await?,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::to_bytes,
        http::{HeaderValue, StatusCode},
        response::IntoResponse,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState,
    };

    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;
        state
    }

    async fn post(state: &SharedState, session: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut headers = HeaderMap::new();
        if let Some(session) = session {
            headers.insert(ADMIN_SESSION_HEADER, HeaderValue::from_str(session).unwrap());
        }
        let action = serde_json::from_value::<GameAction>(body).unwrap();
        let response = post_action(State(state.clone()), headers, Ok(Json(action)))
            .await
            .into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn errors_use_the_symbolic_body() {
        let state = state().await;
        let (status, body) =
            post(&state, None, json!({"action": "validate-code", "code": "ABCD"})).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NoActiveGame");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn admin_action_without_session_is_unauthorized() {
        let state = state().await;
        let (status, body) = post(&state, None, json!({"action": "start"})).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn admin_and_player_flow_over_handlers() {
        let state = state().await;
        let (_, login) = post(&state, None, json!({"action": "admin-login"})).await;
        let session = login["sessionId"].as_str().unwrap().to_owned();

        let (status, created) = post(
            &state,
            Some(&session),
            json!({"action": "create-game", "code": "http42"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["accessCode"], "HTTP42");

        let (status, joined) =
            post(&state, None, json!({"action": "join", "username": "ada"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(joined["created"], true);

        let (status, body) =
            post(&state, None, json!({"action": "join", "username": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationFailed");
    }

    #[tokio::test]
    async fn public_snapshot_hides_the_access_code() {
        let state = state().await;
        let (_, login) = post(&state, None, json!({"action": "admin-login"})).await;
        let session = login["sessionId"].as_str().unwrap().to_owned();
        post(
            &state,
            Some(&session),
            json!({"action": "create-game", "code": "hide42"}),
        )
        .await;

        let Json(public) = get_snapshot(State(state.clone()), HeaderMap::new())
            .await
            .unwrap();
        assert!(public.game_state.has_game);
        assert!(public.game_state.access_code.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_SESSION_HEADER, HeaderValue::from_str(&session).unwrap());
        let Json(admin) = get_snapshot(State(state), headers).await.unwrap();
        assert_eq!(admin.game_state.access_code.as_deref(), Some("HIDE42"));
    }
}
