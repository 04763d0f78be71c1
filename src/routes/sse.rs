use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    error::{AppError, ErrorBody},
    routes::game::admin_session,
    services::sse_service,
    state::SharedState,
};

/// Query string of the public stream.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PublicStreamQuery {
    /// Registers a player connection for presence tracking.
    pub username: Option<String>,
}

/// Query string of the admin stream; `EventSource` cannot send headers.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminStreamQuery {
    /// Admin session, used when the `x-admin-session` header is absent.
    pub session: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/game/events",
    tag = "sse",
    params(PublicStreamQuery),
    responses((status = 200, description = "Public snapshot stream", content_type = "text/event-stream", body = String))
)]
/// Stream public snapshots; a `username` marks the caller as a connected player.
pub async fn public_stream(
    State(state): State<SharedState>,
    Query(query): Query<PublicStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let username = query
        .username
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());
    let subscription = sse_service::subscribe_public(&state, username).await?;
    info!("new public SSE connection");
    Ok(sse_service::to_sse_stream(subscription))
}

#[utoipa::path(
    get,
    path = "/api/game/admin/events",
    tag = "sse",
    params(
        AdminStreamQuery,
        ("x-admin-session" = Option<String>, Header, description = "Admin session issued by `admin-login`")
    ),
    responses(
        (status = 200, description = "Admin snapshot stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Missing or foreign admin session", body = ErrorBody)
    )
)]
/// Stream admin snapshots to the bound admin session.
pub async fn admin_stream(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<AdminStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = admin_session(&headers)
        .map(str::to_owned)
        .or(query.session)
        .ok_or_else(|| AppError::Unauthorized {
            code: "Unauthorized",
            message: "missing admin session".into(),
        })?;
    let subscription = sse_service::subscribe_admin(&state, &session).await?;
    info!("new admin SSE connection");
    Ok(sse_service::to_sse_stream(subscription))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/game/events", get(public_stream))
        .route("/api/game/admin/events", get(admin_stream))
}
