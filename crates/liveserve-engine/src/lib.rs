//! Live-reload engine for the liveserve development server.
//!
//! This crate provides the core of a local development server:
//! - Static file serving from a project root, with a reload-client script
//!   injected into HTML responses
//! - A WebSocket push channel that tells connected browser tabs to reload
//!   (or refresh stylesheets only) when source files change
//! - Debounced change intake that coalesces editor save bursts into a
//!   single notification
//! - A small service/middleware registry so auxiliary behaviors (opening a
//!   browser, surfacing notifications) can attach to engine lifecycle
//!   events without being hard-wired into it
//!
//! The engine does not watch the filesystem itself; the host forwards raw
//! change notifications via [`Engine::notify`].
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use liveserve_engine::{Engine, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Arc::new(Engine::new(EngineConfig {
//!         host: "127.0.0.1".to_owned(),
//!         port: 9000,
//!         root: "public".into(),
//!         debounce: std::time::Duration::from_millis(500),
//!     }));
//!
//!     engine.start().await.unwrap();
//!     // ... forward file changes with engine.notify(path) ...
//!     engine.stop().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server
//!                      │
//!                      ├─► GET /<path>  ──► file stream (+ injected script)
//!                      │
//!                      └─► GET /_ws     ──► WebSocket push channel
//!                                              ▲
//! Host ──notify(path)──► debouncer ──pump──────┘ (broadcast)
//! ```

mod app;
mod engine;
mod error;
mod events;
mod live_reload;
mod service;
mod state;
mod static_files;

use std::path::PathBuf;
use std::time::Duration;

pub use engine::Engine;
pub use error::{EngineError, ErrorCode};
pub use events::{GoLiveEvent, ServerErrorEvent};
pub use live_reload::{ReloadAction, ReloadEvent, ReloadPayload};
pub use service::{Middleware, Service};

// Re-exported for middleware implementations.
pub use axum::extract::Request;
pub use axum::response::Response;

/// Engine configuration, fixed for the life of one [`Engine`] instance.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. Port 0 asks the OS for a free port; the actual
    /// port is reported through [`GoLiveEvent`].
    pub port: u16,
    /// Serving root. Must be a readable directory when [`Engine::start`]
    /// is called.
    pub root: PathBuf,
    /// Quiet period for change coalescing.
    pub debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 9000,
            root: PathBuf::from("."),
            debounce: Duration::from_millis(500),
        }
    }
}
