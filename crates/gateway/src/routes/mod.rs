use axum::Router;

use crate::state::AppState;

pub mod webhooks;

/// Build the application router.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new().merge(webhooks::router(state))
}
