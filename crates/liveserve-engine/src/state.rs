//! Shared request-handler state.
//!
//! One `AppState` is built per `start()`; a stop/start cycle gets a fresh
//! broadcaster, so no push-channel subscription survives a restart.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, watch};

use crate::live_reload::ReloadEvent;
use crate::service::Middleware;

/// State shared across all request handlers of one running server.
pub(crate) struct AppState {
    /// Serving root.
    pub(crate) root: PathBuf,
    /// Push-channel fan-out; each WebSocket connection subscribes.
    pub(crate) broadcaster: broadcast::Sender<ReloadEvent>,
    /// Flips to `true` when the engine is stopping.
    pub(crate) shutdown: watch::Receiver<bool>,
    /// Registered request interceptors, shared with the engine so
    /// registrations outlive restarts.
    pub(crate) middleware: Arc<RwLock<Vec<Middleware>>>,
}
