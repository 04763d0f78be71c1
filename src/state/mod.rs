/// Synchronous game transitions.
pub mod engine;
/// Typed game aggregate.
pub mod game;
/// Derived ranking.
pub mod leaderboard;
mod sse;
/// Mutation serializer.
pub mod transitions;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        game_store::GameStore,
        models::documents_from_entities,
    },
    error::ServiceError,
    services::sse_events,
    state::{engine::Rules, game::{Documents, Timestamp, now_ms}},
};

pub use self::sse::SseHub;
use self::sse::SseState;

/// State shared by every handler and background task.
pub type SharedState = Arc<AppState>;

/// Live player event stream registered in the presence registry.
#[derive(Debug, Clone)]
pub struct PlayerConnection {
    /// Username the stream was opened for.
    pub username: String,
    /// Instant the stream was opened.
    pub connected_at: Timestamp,
}

/// Central application state: storage handle, mutation gate, and push channels.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sse: SseState,
    connections: DashMap<Uuid, PlayerConnection>,
    /// Writers take the exclusive side, readers the shared side. Tokio's lock is fair,
    /// so operations are admitted in arrival order.
    gate: RwLock<()>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            sse: SseState::new(config.sse_capacity, config.sse_capacity),
            connections: DashMap::new(),
            gate: RwLock::new(()),
            degraded: degraded_tx,
            config: Arc::new(config),
        })
    }

    /// Obtain the current game store or fail with [`ServiceError::Degraded`].
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned().ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            sse_events::broadcast_system_status(self, value);
        }
    }

    /// Broadcast hub shared by public and player SSE streams.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin()
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Engine tunables derived from the configuration.
    pub fn rules(&self) -> Rules {
        self.config.rules()
    }

    /// Register a live player stream and return its registry key.
    pub fn register_connection(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            PlayerConnection {
                username: username.to_string(),
                connected_at: now_ms(),
            },
        );
        id
    }

    /// Drop a player stream from the registry.
    pub fn unregister_connection(&self, id: Uuid) -> Option<PlayerConnection> {
        self.connections.remove(&id).map(|(_, connection)| connection)
    }

    /// Number of distinct usernames with at least one live stream.
    pub fn connected_players(&self) -> usize {
        let mut usernames: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.value().username.clone())
            .collect();
        usernames.sort_unstable();
        usernames.dedup();
        usernames.len()
    }

    /// Read both documents under the shared side of the gate.
    ///
    /// Never observes a half-applied mutation.
    pub async fn read_documents(&self) -> Result<Documents, ServiceError> {
        let store = self.require_game_store().await?;
        let _shared = self.gate.read().await;
        load_documents(store.as_ref(), &self.config).await
    }

    pub(crate) fn gate(&self) -> &RwLock<()> {
        &self.gate
    }
}

/// Load and convert both documents, substituting blank ones for missing documents.
pub(crate) async fn load_documents(
    store: &dyn GameStore,
    config: &AppConfig,
) -> Result<Documents, ServiceError> {
    let (game, roster) = tokio::try_join!(store.load_game_state(), store.load_roster())?;
    Ok(documents_from_entities(game, roster, &config.default_rounds)?)
}
