//! Router construction.
//!
//! One route for the push channel's control path; everything else falls
//! through to the file server.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::live_reload::websocket;
use crate::state::AppState;
use crate::static_files;

/// Fixed WebSocket upgrade path for the push channel.
pub(crate) const CONTROL_PATH: &str = "/_ws";

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(CONTROL_PATH, get(websocket::ws_handler))
        .fallback(static_files::serve_file)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // Served files must not stick in the browser cache, or the
                // reload the push channel triggers shows stale content
                .layer(no_store_layer()),
        )
        .with_state(state)
}

/// Layer that marks every response as uncacheable.
fn no_store_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store"),
    )
}
