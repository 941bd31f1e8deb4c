//! Turn timer backend entrypoint wiring the REST API, storage supervisor and tracing.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use turn_timer_back::dao::{
    game_store::couchdb::{CouchConfig, CouchGameStore},
    storage::StorageError,
};
use turn_timer_back::{
    config::AppConfig,
    dao::game_store::{GameStore, memory::MemoryGameStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Storage backend picked from the environment.
enum Backend {
    Memory,
    #[cfg(feature = "couch-store")]
    Couch(CouchConfig),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = select_backend()?;
    let app_state = AppState::new(config);

    spawn_supervisor(app_state.clone(), backend);
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

/// `STORE_BACKEND` wins; otherwise CouchDB is used whenever `COUCH_BASE_URL` is set.
fn select_backend() -> anyhow::Result<Backend> {
    let requested = env::var("STORE_BACKEND")
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match requested.as_deref() {
        Some("memory") => Ok(Backend::Memory),
        Some("couchdb") => couch_backend(),
        Some(other) => anyhow::bail!("unknown STORE_BACKEND `{other}` (expected memory or couchdb)"),
        None if env::var_os("COUCH_BASE_URL").is_some() => couch_backend(),
        None => Ok(Backend::Memory),
    }
}

#[cfg(feature = "couch-store")]
fn couch_backend() -> anyhow::Result<Backend> {
    let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
    Ok(Backend::Couch(config))
}

#[cfg(not(feature = "couch-store"))]
fn couch_backend() -> anyhow::Result<Backend> {
    anyhow::bail!("CouchDB backend requested but the `couch-store` feature is disabled")
}

/// Hand the chosen backend to the storage supervisor running in the background.
fn spawn_supervisor(state: SharedState, backend: Backend) {
    match backend {
        Backend::Memory => {
            warn!("using in-memory game store; state is lost on restart");
            let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        Backend::Couch(config) => {
            info!(base_url = %config.base_url, database = %config.database, "using CouchDB game store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = CouchGameStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn GameStore>)
                }
            }));
        }
    }
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
