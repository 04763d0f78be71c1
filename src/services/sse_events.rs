use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dto::{
        game::{GameSnapshot, Projection},
        sse::{ServerEvent, SystemStatus},
    },
    state::{AppState, game::Documents},
};

/// Fresh `{gameState, players, leaderboard}` payload.
pub const EVENT_SNAPSHOT: &str = "snapshot";
/// Degraded mode toggled.
pub const EVENT_SYSTEM_STATUS: &str = "system_status";
/// First event of every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";
/// Connected player count changed.
pub const EVENT_PRESENCE: &str = "presence";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresenceEvent {
    connected_players: usize,
}

/// Push the fresh public and admin snapshots after a state-changing mutation.
pub fn broadcast_snapshot(state: &AppState, docs: &Documents) {
    let public = GameSnapshot::project(docs, Projection::Public);
    send_public_event(state, EVENT_SNAPSHOT, &public);

    let admin = GameSnapshot::project(
        docs,
        Projection::Admin {
            connected_players: state.connected_players(),
        },
    );
    send_admin_event(state, EVENT_SNAPSHOT, &admin);
    debug!(
        public_subscribers = state.public_sse().subscriber_count(),
        admin_subscribers = state.admin_sse().subscriber_count(),
        "snapshot broadcast"
    );
}

/// Broadcast that the backend entered or left degraded mode.
pub fn broadcast_system_status(state: &AppState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_admin_event(state, EVENT_SYSTEM_STATUS, &payload);
}

/// Tell the admin how many players currently hold an event stream.
pub fn broadcast_presence(state: &AppState) {
    let payload = PresenceEvent {
        connected_players: state.connected_players(),
    };
    send_admin_event(state, EVENT_PRESENCE, &payload);
}

fn send_public_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_admin_event(state: &AppState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
