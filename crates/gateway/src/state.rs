use std::sync::Arc;

use ingest::processor::Processor;

use crate::config::GatewayConfig;

/// Shared app state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<Processor>,
    pub config: Arc<GatewayConfig>,
}
