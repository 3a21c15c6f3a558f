use std::collections::HashMap;
use std::sync::Arc;

use pixshop_core::provider::ProviderId;
use pixshop_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: pixshop_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// One fully wired pipeline per provider.
    pub orchestrators: Arc<HashMap<ProviderId, Arc<Orchestrator>>>,
}

impl AppState {
    /// Look up the orchestrator for a provider. Every configured provider
    /// has one; a miss means the provider was disabled at startup.
    pub fn orchestrator(&self, id: ProviderId) -> Option<Arc<Orchestrator>> {
        self.orchestrators.get(&id).cloned()
    }
}
