//! Decide what a client holding only a persisted username should do on a fresh start.
//!
//! Biased toward keeping the player in: only an explicit not-found after the server was
//! already reached once counts as eviction.

use tracing::{info, warn};

use crate::{
    client::transport::{SyncTransport, TransportError},
    dto::action::{JoinResponse, ReconnectResponse},
};

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The server knows the player; its copy replaces local state.
    Resumed(ReconnectResponse),
    /// The player was re-registered through `join` while the game is in its lobby.
    Rejoined(JoinResponse),
    /// Confirmed removal: log out locally.
    Evicted,
    /// Nothing conclusive; keep local state and let polling correct it.
    KeepLocal,
}

/// Resolve `username` against the server.
///
/// `had_prior_contact` tells whether this client already talked to the server successfully
/// with this identity.
pub async fn resolve<T: SyncTransport + ?Sized>(
    transport: &T,
    username: &str,
    had_prior_contact: bool,
) -> Resolution {
    match transport.reconnect(username).await {
        Ok(response) => {
            info!(username, status = ?response.status, "identity resumed");
            return Resolution::Resumed(response);
        }
        Err(err) if err.is_not_found() => {
            info!(username, "server does not know the player");
        }
        Err(err) => {
            warn!(username, error = %err, "reconnect failed; keeping local state");
            return Resolution::KeepLocal;
        }
    }

    match lobby_open(transport).await {
        Ok(true) => match transport.join(username).await {
            Ok(response) => {
                info!(username, "rejoined lobby");
                Resolution::Rejoined(response)
            }
            Err(err) => {
                warn!(username, error = %err, "rejoin failed; keeping local state");
                Resolution::KeepLocal
            }
        },
        Ok(false) if had_prior_contact => {
            info!(username, "player no longer in the game; evicted");
            Resolution::Evicted
        }
        Ok(false) => Resolution::KeepLocal,
        Err(err) => {
            warn!(username, error = %err, "snapshot fetch failed; keeping local state");
            Resolution::KeepLocal
        }
    }
}

async fn lobby_open<T: SyncTransport + ?Sized>(transport: &T) -> Result<bool, TransportError> {
    let snapshot = transport.fetch_snapshot().await?;
    let game = &snapshot.game_state;
    Ok(game.has_game && game.is_active && !game.is_started)
}
