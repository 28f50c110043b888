mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{routing::get, Router};
use ingest::dispatcher::Dispatcher;
use ingest::processor::Processor;
use ingest::retry::{spawn_retry_scheduler, MemoryRetryStore, RetryStore};
use ingest::store::MemoryStore;

use config::GatewayConfig;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(GatewayConfig::load());
    if !config.strict_signatures {
        // Fail-open signature validation is a deliberate development-mode
        // trade-off; make sure operators can see it.
        tracing::warn!(
            "strict_signatures is off: webhooks from tenants without a secret are accepted unsigned"
        );
    }

    let store = Arc::new(MemoryStore::new());
    let retry: Arc<dyn RetryStore> = Arc::new(MemoryRetryStore::new());
    let dispatcher = Arc::new(Dispatcher::new(config.clone()));
    let processor = Arc::new(
        Processor::new(store, retry.clone()).with_dispatcher(dispatcher),
    );

    spawn_retry_scheduler(processor.clone(), retry);

    let state = AppState {
        processor,
        config,
    };
    let app = Router::new()
        .route("/health", get(health))
        .merge(routes::router(state.clone()))
        .with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    tracing::info!("listening on http://{}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with error");
    }
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "ok": true }))
}
