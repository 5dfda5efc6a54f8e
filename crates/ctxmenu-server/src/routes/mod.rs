//! HTTP route handlers

pub mod entries;
pub mod logs;
pub mod system;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble every API route
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(entries::router())
        .merge(system::router())
        .merge(logs::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
