use std::sync::Arc;

use vitrine_events::EventBus;
use vitrine_pipeline::JobOrchestrator;
use vitrine_store::{AssetStore, JobStore};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job submission and cancellation entrypoint.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Job record store, for reads.
    pub store: Arc<dyn JobStore>,
    /// Binary asset store, for resolving asset URLs.
    pub assets: Arc<dyn AssetStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Centralized event bus for job lifecycle events.
    pub event_bus: Arc<EventBus>,
}
