//! `liveserve serve` command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use liveserve_config::{CliSettings, Config};
use liveserve_engine::{Engine, EngineConfig};

use crate::error::CliError;
use crate::output::Output;
use crate::services::{BrowserService, NotificationService};
use crate::watcher::FileWatcher;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover liveserve.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve (overrides config).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Quiet period for change coalescing, in milliseconds (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Do not open a browser once the server is live.
    #[arg(long)]
    no_browser: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,

    /// Enable verbose output (show request and reload logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        // Resolve flag pairs before moving into CliSettings
        let live_reload_enabled = self.resolve_live_reload_enabled();

        // Build CLI settings from args
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            root: self.root,
            debounce_ms: self.debounce_ms,
            open_browser: self.no_browser.then_some(false),
            live_reload_enabled,
        };

        // Load config
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let engine = Arc::new(Engine::new(EngineConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            root: config.serve_resolved.root.clone(),
            debounce: Duration::from_millis(config.live_reload.debounce_ms),
        }));

        engine.use_service(NotificationService::new());
        if config.browser.open_on_start {
            engine.use_service(BrowserService::new(
                config.server.host.clone(),
                config.browser.name.clone(),
                config.browser.active_doc.clone(),
            ));
        }

        // Print startup info
        output.info(&format!(
            "Serving {} on http://{}:{}",
            config.serve_resolved.root.display(),
            config.server.host,
            config.server.port
        ));
        if config.live_reload.enabled {
            output.info("Live reload: enabled");
        } else {
            output.info("Live reload: disabled");
        }

        engine.start().await?;

        // The engine does not watch the filesystem; feed it from here
        let watcher = if config.live_reload.enabled {
            Some(FileWatcher::spawn(
                config.serve_resolved.root.clone(),
                config.live_reload.watch_patterns.clone(),
                Arc::clone(&engine),
            )?)
        } else {
            None
        };

        shutdown_signal().await;
        output.info("Shutting down...");

        if let Some(watcher) = watcher {
            watcher.stop();
        }
        engine.stop().await?;

        Ok(())
    }

    /// Resolve the `--live-reload` / `--no-live-reload` flag pair.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        if self.no_live_reload {
            Some(false)
        } else {
            self.live_reload
        }
    }
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
