//! Business logic behind the admin actions. Session checks run inside the mutation so
//! a concurrent logout can never be interleaved between the check and the change.

use rand::Rng;
use tracing::{info, warn};

use crate::{
    dto::{
        action::{
            AckResponse, AdminSessionResponse, GameCreatedResponse, HintRevealedResponse,
            RoundEndedResponse, RoundLaunchedResponse, RoundUpdateRequest,
        },
        game::{GameSnapshot, Projection},
    },
    error::ServiceError,
    state::{
        SharedState,
        engine::{self, GameError},
        game::{Documents, ModeKind},
        transitions::run_mutation,
    },
};

/// Characters used for generated access codes; look-alikes (0/O, 1/I) are left out.
const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GENERATED_CODE_LENGTH: usize = 6;

fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_CODE_LENGTH)
        .map(|_| char::from(ACCESS_CODE_ALPHABET[rng.random_range(0..ACCESS_CODE_ALPHABET.len())]))
        .collect()
}

fn ensure_admin(docs: &Documents, session: &str) -> Result<(), ServiceError> {
    if engine::is_admin(&docs.game, session) {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(
            "admin session missing or not bound".into(),
        ))
    }
}

fn admin_snapshot(state: &SharedState, docs: &Documents) -> GameSnapshot {
    GameSnapshot::project(
        docs,
        Projection::Admin {
            connected_players: state.connected_players(),
        },
    )
}

/// Read both documents on behalf of the bound admin.
pub async fn authorize(state: &SharedState, session: &str) -> Result<Documents, ServiceError> {
    let docs = state.read_documents().await?;
    ensure_admin(&docs, session)?;
    Ok(docs)
}

/// Bind (or refresh) the admin session after checking the configured password.
pub async fn admin_login(
    state: &SharedState,
    password: Option<&str>,
    session_id: Option<&str>,
) -> Result<AdminSessionResponse, ServiceError> {
    if let Some(expected) = state.config().admin_password.as_deref()
        && password != Some(expected)
    {
        warn!("admin login refused: wrong password");
        return Err(ServiceError::Unauthorized("invalid admin password".into()));
    }

    let rules = state.rules();
    let session = run_mutation(state, "admin-login", |docs, now| {
        Ok(engine::bind_admin(&mut docs.game, &rules, session_id, now)?)
    })
    .await?;
    info!(connected_at = session.connected_at, "admin session bound");
    Ok(AdminSessionResponse {
        session_id: session.id,
        connected_at: session.connected_at,
    })
}

/// Release the admin session and wipe the game.
pub async fn admin_logout(state: &SharedState, session: &str) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "admin-logout", |docs, now| {
        ensure_admin(docs, session)?;
        engine::admin_logout(docs, now);
        Ok(())
    })
    .await?;
    info!("admin logged out; game removed");
    Ok(AckResponse::ok())
}

/// Provision a new game, generating an access code when none is given.
pub async fn create_game(
    state: &SharedState,
    session: &str,
    code: Option<String>,
) -> Result<GameCreatedResponse, ServiceError> {
    let code = code.unwrap_or_else(generate_access_code);
    let rules = state.rules();
    let response = run_mutation(state, "create-game", |docs, now| {
        ensure_admin(docs, session)?;
        let access_code = engine::create_game(docs, &rules, &code, now)?;
        Ok(GameCreatedResponse {
            access_code,
            snapshot: admin_snapshot(state, docs),
        })
    })
    .await?;
    info!(game_id = %response.snapshot.game_state.id, "game created");
    Ok(response)
}

/// Begin play.
pub async fn start(state: &SharedState, session: &str) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "start", |docs, now| {
        ensure_admin(docs, session)?;
        Ok(engine::start(docs, now)?)
    })
    .await?;
    Ok(AckResponse::ok())
}

/// Return to the lobby without losing progress.
pub async fn stop(state: &SharedState, session: &str) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "stop", |docs, _| {
        ensure_admin(docs, session)?;
        Ok(engine::stop(docs)?)
    })
    .await?;
    Ok(AckResponse::ok())
}

/// Switch between free and controlled mode.
pub async fn set_mode(
    state: &SharedState,
    session: &str,
    mode: ModeKind,
) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "set-mode", |docs, now| {
        ensure_admin(docs, session)?;
        Ok(engine::set_mode(docs, mode, now)?)
    })
    .await?;
    info!(?mode, "game mode set");
    Ok(AckResponse::ok())
}

/// Launch the next controlled round.
pub async fn launch_round(
    state: &SharedState,
    session: &str,
) -> Result<RoundLaunchedResponse, ServiceError> {
    let current_round = run_mutation(state, "launch-round", |docs, now| {
        ensure_admin(docs, session)?;
        Ok(engine::launch_round(docs, now)?)
    })
    .await?;
    info!(current_round, "round launched");
    Ok(RoundLaunchedResponse { current_round })
}

/// Close the current controlled round.
pub async fn end_round(
    state: &SharedState,
    session: &str,
) -> Result<RoundEndedResponse, ServiceError> {
    let finished = run_mutation(state, "end-round", |docs, now| {
        ensure_admin(docs, session)?;
        Ok(engine::end_round(docs, now)?)
    })
    .await?;
    info!(finished = finished.len(), "round ended");
    Ok(RoundEndedResponse { finished })
}

/// Reveal one more hint of `round_id` and return its text.
pub async fn reveal_hint(
    state: &SharedState,
    session: &str,
    round_id: u8,
) -> Result<HintRevealedResponse, ServiceError> {
    run_mutation(state, "reveal-hint", |docs, _| {
        ensure_admin(docs, session)?;
        let revealed_hints = engine::reveal_hint(&mut docs.game, round_id)?;
        let hint = docs
            .game
            .round(round_id)
            .and_then(|round| round.hints.get(usize::from(revealed_hints) - 1))
            .cloned()
            .ok_or(GameError::NoMoreHints(round_id))?;
        Ok(HintRevealedResponse {
            round_id,
            revealed_hints,
            hint,
        })
    })
    .await
}

/// Wipe progress and roster; connected clients log out on the new `resetAt`.
pub async fn reset(state: &SharedState, session: &str) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "reset", |docs, now| {
        ensure_admin(docs, session)?;
        engine::reset_game(docs, now);
        Ok(())
    })
    .await?;
    info!("game reset");
    Ok(AckResponse::ok())
}

/// Remove the game entirely.
pub async fn end_game(state: &SharedState, session: &str) -> Result<AckResponse, ServiceError> {
    run_mutation(state, "end-game", |docs, now| {
        ensure_admin(docs, session)?;
        engine::end_game(docs, now);
        Ok(())
    })
    .await?;
    info!("game ended");
    Ok(AckResponse::ok())
}

/// Edit one authored round and return the admin snapshot.
pub async fn update_round(
    state: &SharedState,
    session: &str,
    request: RoundUpdateRequest,
) -> Result<GameSnapshot, ServiceError> {
    let round_id = request.round_id;
    run_mutation(state, "update-round", |docs, _| {
        ensure_admin(docs, session)?;
        engine::update_round_config(&mut docs.game, round_id, request.into())?;
        Ok(admin_snapshot(state, docs))
    })
    .await
}
