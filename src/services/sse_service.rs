use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        game::{GameSnapshot, Projection},
        sse::{Handshake, ServerEvent},
    },
    error::ServiceError,
    services::{
        admin_service,
        sse_events::{self, EVENT_HANDSHAKE, EVENT_SNAPSHOT},
    },
    state::SharedState,
};

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    /// Anonymous public stream.
    Public,
    /// Player stream registered in the presence registry under the given key.
    Player {
        /// State owning the registry.
        state: SharedState,
        /// Registry key.
        connection: Uuid,
    },
    /// Admin stream.
    Admin,
}

/// A subscribed stream plus the events to deliver before any broadcast.
pub struct Subscription {
    /// Broadcast feed of the hub.
    pub receiver: broadcast::Receiver<ServerEvent>,
    /// Handshake and current snapshot.
    pub initial: Vec<ServerEvent>,
    /// Which stream this is.
    pub kind: StreamKind,
}

/// Subscribe to the public stream, registering a player connection when `username` is set.
///
/// The current snapshot is queued first so a fresh client never waits for the next mutation.
pub async fn subscribe_public(
    state: &SharedState,
    username: Option<String>,
) -> Result<Subscription, ServiceError> {
    let receiver = state.public_sse().subscribe();
    let mut initial = vec![handshake(state, username.as_deref(), "public").await?];
    if let Ok(docs) = state.read_documents().await {
        initial.push(ServerEvent::json(
            Some(EVENT_SNAPSHOT.to_string()),
            &GameSnapshot::project(&docs, Projection::Public),
        )
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?);
    }

    let kind = match username {
        Some(username) => {
            let connection = state.register_connection(&username);
            info!(%username, "player SSE stream connected");
            sse_events::broadcast_presence(state);
            StreamKind::Player {
                state: state.clone(),
                connection,
            }
        }
        None => StreamKind::Public,
    };

    Ok(Subscription {
        receiver,
        initial,
        kind,
    })
}

/// Subscribe to the admin stream; only the bound admin session may do so.
pub async fn subscribe_admin(
    state: &SharedState,
    session: &str,
) -> Result<Subscription, ServiceError> {
    let docs = admin_service::authorize(state, session).await?;
    let receiver = state.admin_sse().subscribe();
    let snapshot = GameSnapshot::project(
        &docs,
        Projection::Admin {
            connected_players: state.connected_players(),
        },
    );
    let initial = vec![
        handshake(state, None, "admin").await?,
        ServerEvent::json(Some(EVENT_SNAPSHOT.to_string()), &snapshot)
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?,
    ];

    Ok(Subscription {
        receiver,
        initial,
        kind: StreamKind::Admin,
    })
}

async fn handshake(
    state: &SharedState,
    username: Option<&str>,
    stream: &str,
) -> Result<ServerEvent, ServiceError> {
    let stream = match (stream, username) {
        ("public", Some(_)) => "player",
        (other, _) => other,
    };
    ServerEvent::json(
        Some(EVENT_HANDSHAKE.to_string()),
        &Handshake {
            stream: stream.to_string(),
            degraded: state.is_degraded().await,
            username: username.map(str::to_string),
        },
    )
    .map_err(|err| ServiceError::InvalidInput(err.to_string()))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(subscription: Subscription) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        initial,
        kind,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: drains the initial events then reads from broadcast
    tokio::spawn(async move {
        let mut open = true;
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                open = false;
                break;
            }
        }

        while open {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Skip lagged messages but keep the stream alive; polling catches up.
                            debug!(skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Player { state, connection } => {
                if let Some(player) = state.unregister_connection(connection) {
                    info!(username = %player.username, "player SSE stream disconnected");
                }
                sse_events::broadcast_presence(&state);
            }
            StreamKind::Admin => info!("admin SSE stream disconnected"),
        }
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState};

    #[tokio::test]
    async fn player_subscription_registers_presence_and_queues_snapshot() {
        let state = AppState::new(AppConfig::default());
        state
            .set_game_store(Arc::new(MemoryGameStore::new()))
            .await;

        let subscription = subscribe_public(&state, Some("ada".into())).await.unwrap();

        assert_eq!(state.connected_players(), 1);
        let names: Vec<_> = subscription
            .initial
            .iter()
            .map(|event| event.event.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, [EVENT_HANDSHAKE, EVENT_SNAPSHOT]);
        assert!(subscription.initial[0].data.contains("\"stream\":\"player\""));
        assert!(matches!(subscription.kind, StreamKind::Player { .. }));
    }

    #[tokio::test]
    async fn anonymous_subscription_in_degraded_mode_still_handshakes() {
        let state = AppState::new(AppConfig::default());
        let subscription = subscribe_public(&state, None).await.unwrap();

        assert_eq!(subscription.initial.len(), 1);
        assert!(subscription.initial[0].data.contains("\"degraded\":true"));
        assert_eq!(state.connected_players(), 0);
    }
}
