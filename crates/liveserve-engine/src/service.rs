//! Service and middleware contracts.
//!
//! A service is an independently-developed behavior (opening a browser,
//! showing notifications) that attaches to engine lifecycle events. The
//! engine knows nothing about concrete services beyond this contract.

use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;

use crate::engine::Engine;

/// A pluggable engine service.
///
/// Registered once via [`Engine::use_service`]; `register` is the single
/// hook where the service subscribes to the events it cares about.
pub trait Service: Send + Sync {
    /// Service name, used in logs.
    fn name(&self) -> &'static str;

    /// Attach to the engine's event-subscription surface. Called exactly
    /// once, at registration time.
    fn register(self: Arc<Self>, engine: &Engine);
}

/// A request interceptor registered via [`Engine::use_middleware`].
///
/// Interceptors run in registration order before file resolution; the first
/// one returning `Some(response)` short-circuits the request.
pub type Middleware = Arc<dyn Fn(&Request) -> Option<Response> + Send + Sync>;
