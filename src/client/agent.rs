//! Polling loop keeping one player client in sync with the server.
//!
//! Transport failures never change what the client believes about its membership: the
//! last good snapshot is kept and the next poll simply waits longer. Only a confirmed
//! signal, a change of `resetAt`, is escalated as [`SyncEvent::ForcedLogout`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    client::{backoff::AdaptivePoll, transport::SyncTransport},
    dto::game::GameSnapshot,
};

/// Something the UI layer should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Fresh server state; replaces any local guess.
    Snapshot(GameSnapshot),
    /// The game went from lobby to started since the previous observation.
    GameStarted,
    /// The game went back to the lobby since the previous observation.
    GameStopped,
    /// `resetAt` changed: the local session is no longer valid.
    ForcedLogout {
        /// Value seen before.
        previous: i64,
        /// Value just observed.
        current: i64,
    },
}

/// Detects edge transitions between consecutive snapshots.
#[derive(Debug, Default, Clone)]
pub struct TransitionTracker {
    started: Option<bool>,
    reset_at: Option<i64>,
}

impl TransitionTracker {
    /// Compare `snapshot` with the previous observation. The first observation only records.
    pub fn observe(&mut self, snapshot: &GameSnapshot) -> Vec<SyncEvent> {
        let game = &snapshot.game_state;
        let mut events = Vec::new();

        if let Some(previous) = self.reset_at
            && previous != game.reset_at
        {
            events.push(SyncEvent::ForcedLogout {
                previous,
                current: game.reset_at,
            });
        }
        self.reset_at = Some(game.reset_at);

        match (self.started, game.is_started) {
            (Some(false), true) => events.push(SyncEvent::GameStarted),
            (Some(true), false) => events.push(SyncEvent::GameStopped),
            _ => {}
        }
        self.started = Some(game.is_started);
        events
    }
}

/// Client sync agent for one player (or an anonymous viewer when `username` is `None`).
pub struct SyncAgent<T: SyncTransport + 'static> {
    transport: Arc<T>,
    username: Option<String>,
    heartbeat: bool,
    poll: AdaptivePoll,
    tracker: TransitionTracker,
    last_good: Option<GameSnapshot>,
}

impl<T: SyncTransport + 'static> SyncAgent<T> {
    /// Agent for `username`, or an anonymous viewer when `None`.
    pub fn new(transport: Arc<T>, username: Option<String>, poll: AdaptivePoll) -> Self {
        Self {
            transport,
            username,
            heartbeat: true,
            poll,
            tracker: TransitionTracker::default(),
            last_good: None,
        }
    }

    /// Disable the heartbeat sent alongside each poll.
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = false;
        self
    }

    /// Last snapshot fetched successfully.
    pub fn last_snapshot(&self) -> Option<&GameSnapshot> {
        self.last_good.as_ref()
    }

    /// Current polling policy.
    pub fn poll(&self) -> &AdaptivePoll {
        &self.poll
    }

    /// One reconciliation round: heartbeat, fetch, diff.
    ///
    /// Returns no event when the fetch failed.
    pub async fn tick(&mut self) -> Vec<SyncEvent> {
        self.send_heartbeat();

        match self.transport.fetch_snapshot().await {
            Ok(snapshot) => {
                self.poll.on_success();
                let mut events = self.tracker.observe(&snapshot);
                events.insert(0, SyncEvent::Snapshot(snapshot.clone()));
                self.last_good = Some(snapshot);
                events
            }
            Err(err) => {
                self.poll.on_failure();
                warn!(
                    error = %err,
                    failures = self.poll.failures(),
                    next_poll_ms = self.poll.interval().as_millis() as u64,
                    "sync fetch failed; keeping last known state"
                );
                Vec::new()
            }
        }
    }

    fn send_heartbeat(&self) {
        let Some(username) = self.username.clone().filter(|_| self.heartbeat) else {
            return;
        };
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(err) = transport.heartbeat(&username).await {
                debug!(%username, error = %err, "heartbeat failed");
            }
        });
    }

    /// Poll until `shutdown` flips to `true` or the event receiver is dropped.
    ///
    /// The first reconciliation runs immediately.
    pub async fn run(mut self, events: mpsc::Sender<SyncEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(username = ?self.username, "sync agent started");
        loop {
            for event in self.tick().await {
                if events.send(event).await.is_err() {
                    info!("sync event receiver dropped; stopping agent");
                    return;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll.interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("sync agent stopped");
                        return;
                    }
                }
            }
        }
    }
}
