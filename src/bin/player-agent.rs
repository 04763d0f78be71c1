//! Headless player client: recovers a persisted username and follows the game by polling.
//!
//! Usage: `player-agent <server-url> [username]`. The username is remembered in the file
//! named by `PLAYER_AGENT_STATE` (default `.player-agent.json`).

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use puzzle_sync_back::client::{
    AdaptivePoll, HttpTransport, Resolution, SyncAgent, SyncEvent, resolve,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct PersistedIdentity {
    username: String,
}

fn state_path() -> PathBuf {
    env::var("PLAYER_AGENT_STATE")
        .unwrap_or_else(|_| ".player-agent.json".into())
        .into()
}

fn load_identity(path: &PathBuf) -> Option<PersistedIdentity> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable identity file");
            None
        }
    }
}

fn save_identity(path: &PathBuf, identity: &PersistedIdentity) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(identity).context("serializing identity")?;
    std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

/// Only a remembered identity for this same username counts as earlier contact.
fn had_prior_contact(persisted: Option<&PersistedIdentity>, username: &str) -> bool {
    persisted.is_some_and(|identity| identity.username == username)
}

fn forget_identity(path: &PathBuf) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove identity file");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = env::args().skip(1);
    let Some(server) = args.next() else {
        bail!("usage: player-agent <server-url> [username]");
    };
    let path = state_path();
    let persisted = load_identity(&path);
    let Some(username) = args
        .next()
        .or_else(|| persisted.as_ref().map(|identity| identity.username.clone()))
    else {
        bail!("no persisted username; pass one as second argument");
    };
    let prior_contact = had_prior_contact(persisted.as_ref(), &username);

    let transport = Arc::new(HttpTransport::new(server, REQUEST_TIMEOUT)?);
    match resolve(transport.as_ref(), &username, prior_contact).await {
        Resolution::Resumed(response) => {
            info!(%username, status = ?response.status, "resumed");
            save_identity(&path, &PersistedIdentity { username: username.clone() })?;
        }
        Resolution::Rejoined(_) => {
            info!(%username, "rejoined the lobby");
            save_identity(&path, &PersistedIdentity { username: username.clone() })?;
        }
        Resolution::Evicted => {
            forget_identity(&path);
            bail!("player `{username}` is no longer part of the game");
        }
        Resolution::KeepLocal => warn!(%username, "could not confirm identity; keeping it"),
    }

    let (events_tx, mut events_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent = SyncAgent::new(transport, Some(username.clone()), AdaptivePoll::default());
    let handle = tokio::spawn(agent.run(events_tx, shutdown_rx));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events_rx.recv() => match event {
                Some(SyncEvent::Snapshot(snapshot)) => {
                    let me = snapshot.player(&username);
                    info!(
                        started = snapshot.game_state.is_started,
                        round = snapshot.game_state.current_round,
                        completed = me.map(|player| player.rounds_completed.iter().filter(|done| **done).count()),
                        "snapshot"
                    );
                }
                Some(SyncEvent::GameStarted) => info!("game started"),
                Some(SyncEvent::GameStopped) => info!("game stopped"),
                Some(SyncEvent::ForcedLogout { previous, current }) => {
                    warn!(previous, current, "game was reset; logging out");
                    forget_identity(&path);
                    break;
                }
                None => break,
            },
        }
    }

    let _ = shutdown_tx.send(true);
    handle.await.context("joining sync agent")?;
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_contact_requires_the_same_username() {
        let remembered = PersistedIdentity {
            username: "ada".into(),
        };
        assert!(had_prior_contact(Some(&remembered), "ada"));
        assert!(!had_prior_contact(Some(&remembered), "bob"));
        assert!(!had_prior_contact(None, "ada"));
    }
}
