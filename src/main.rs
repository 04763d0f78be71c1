//! Puzzle sync backend entrypoint wiring REST, SSE, and the storage supervisor.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use puzzle_sync_back::dao::game_store::couchdb::{CouchConfig, CouchGameStore};
use puzzle_sync_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, file::FileGameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Storage backend selected through `STORE_BACKEND`.
#[derive(Clone)]
enum StoreBackend {
    /// Process-local documents; the same instance survives reconnects.
    Memory(MemoryGameStore),
    /// JSON files under `DATA_DIR`.
    File(PathBuf),
    #[cfg(feature = "couch-store")]
    Couch(CouchConfig),
}

impl StoreBackend {
    fn from_env() -> anyhow::Result<Self> {
        let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "file".into());
        match backend.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory(MemoryGameStore::new())),
            "file" => Ok(StoreBackend::File(
                env::var("DATA_DIR").unwrap_or_else(|_| "data".into()).into(),
            )),
            #[cfg(feature = "couch-store")]
            "couch" => Ok(StoreBackend::Couch(
                CouchConfig::from_env().context("reading CouchDB settings")?,
            )),
            other => bail!("unsupported STORE_BACKEND `{other}`"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::File(_) => "file",
            #[cfg(feature = "couch-store")]
            StoreBackend::Couch(_) => "couch",
        }
    }

    async fn connect(self) -> Result<Arc<dyn GameStore>, StorageError> {
        match self {
            StoreBackend::Memory(store) => Ok(Arc::new(store)),
            StoreBackend::File(root) => Ok(Arc::new(FileGameStore::open(root).await?)),
            #[cfg(feature = "couch-store")]
            StoreBackend::Couch(config) => Ok(Arc::new(CouchGameStore::connect(config).await?)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let backend = StoreBackend::from_env()?;
    let app_state = AppState::new(AppConfig::load());

    info!(backend = backend.name(), "starting storage supervisor");
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        backend.clone().connect()
    }));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
