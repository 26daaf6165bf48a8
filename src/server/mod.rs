use std::io;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::config::Settings;
use crate::data::player::PlayerPool;
use crate::jobs::JobManager;

pub mod api;
pub mod routes;

pub use routes::{router, AppState};

/// Build the shared state for a server over `players`.
pub fn app_state(settings: Settings, players: PlayerPool) -> AppState {
    AppState {
        players: Arc::new(players),
        jobs: JobManager::with_workers(settings.job_ttl(), settings.workers),
        settings: Arc::new(settings),
    }
}

/// Periodically evict finished jobs older than the configured TTL.
pub fn spawn_eviction_sweep(jobs: JobManager, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = jobs.evict_expired(Utc::now());
            if evicted > 0 {
                debug!(evicted, "job eviction sweep");
            }
        }
    })
}

pub async fn run_server(settings: Settings, players: PlayerPool) -> io::Result<()> {
    let bind = settings.bind.clone();
    let interval = settings.eviction_interval();
    let state = app_state(settings, players);
    let sweep = spawn_eviction_sweep(state.jobs.clone(), interval);

    let listener = TcpListener::bind(&bind).await?;
    info!(bind = %bind, players = state.players.len(), "gaffer server listening");
    let served = axum::serve(listener, router(state)).await;
    sweep.abort();
    served
}
