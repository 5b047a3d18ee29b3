use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use cuebus_core::config::CuebusConfig;
use cuebus_scheduler::Engine;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CuebusConfig,
    pub event_seq: AtomicU64,
    pub engine: Arc<Engine>,
    /// Active WS connections: conn_id -> connected at.
    pub ws_clients: DashMap<String, DateTime<Utc>>,
}

impl AppState {
    pub fn new(config: CuebusConfig, engine: Arc<Engine>) -> Self {
        Self {
            config,
            event_seq: AtomicU64::new(0),
            engine,
            ws_clients: DashMap::new(),
        }
    }

    /// Monotonically increasing sequence for pushed events.
    pub fn next_seq(&self) -> u64 {
        self.event_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
