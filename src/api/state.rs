use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::service::GameSessionService;
use crate::store::{MemoryAuth, MemoryGameStore};
use crate::ws::manager::SessionRegistry;

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState {
    pub service: Arc<GameSessionService>,
    /// Token table, also used directly by `POST /session`.
    pub auth: Arc<MemoryAuth>,
    pub registry: Arc<SessionRegistry>,
    pub config: AppConfig,
    pub start_time: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// State backed by the in-memory collaborators.
    pub fn new(config: AppConfig) -> SharedState {
        let auth = Arc::new(MemoryAuth::new());
        let store = Arc::new(MemoryGameStore::new());
        let registry = Arc::new(SessionRegistry::new());
        let service = Arc::new(GameSessionService::new(
            auth.clone(),
            store,
            registry.clone(),
        ));

        Arc::new(AppState {
            service,
            auth,
            registry,
            config,
            start_time: Instant::now(),
        })
    }
}
