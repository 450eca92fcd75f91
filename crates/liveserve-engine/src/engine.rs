//! Engine lifecycle and wiring.
//!
//! The engine owns the HTTP listener and the push channel, wires change
//! notifications through the debouncer into broadcasts, and exposes the
//! registration surface services and middleware attach to.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::app;
use crate::error::{EngineError, ErrorCode};
use crate::events::{EventBus, GoLiveEvent, ServerErrorEvent};
use crate::live_reload::ReloadEvent;
use crate::live_reload::debouncer::ChangeDebouncer;
use crate::service::{Middleware, Service};
use crate::state::AppState;
use crate::{EngineConfig, Request, Response};

/// How often the pump checks for an elapsed quiet period.
const PUMP_INTERVAL: Duration = Duration::from_millis(25);

/// Buffered reload events per subscription before a slow client lags.
const BROADCAST_CAPACITY: usize = 100;

/// Lifecycle states. `start()` drives idle → starting → running,
/// `stop()` drives running → stopping → idle.
enum Lifecycle {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Everything created by one `start()` and torn down by the next `stop()`.
struct Running {
    port: u16,
    broadcaster: broadcast::Sender<ReloadEvent>,
    debouncer: Arc<ChangeDebouncer>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
    pump: JoinHandle<()>,
}

struct EngineState {
    lifecycle: Lifecycle,
    running: Option<Running>,
}

/// The live-reload engine.
///
/// Holds immutable configuration plus the registration surface; all
/// per-run state (listener, push channel, debouncer) lives only between
/// [`start`](Engine::start) and [`stop`](Engine::stop).
pub struct Engine {
    config: EngineConfig,
    events: EventBus,
    middleware: Arc<RwLock<Vec<Middleware>>>,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Create an engine. Nothing is bound until [`start`](Engine::start).
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            events: EventBus::default(),
            middleware: Arc::new(RwLock::new(Vec::new())),
            state: Mutex::new(EngineState {
                lifecycle: Lifecycle::Idle,
                running: None,
            }),
        }
    }

    /// Bind the listener and go live.
    ///
    /// Emits [`GoLiveEvent`] to registered services once serving. Calling
    /// `start()` while already starting or running is not a failure: it
    /// emits a [`ServerErrorEvent`] with
    /// [`ErrorCode::ServerIsAlreadyRunning`] and leaves the running
    /// instance untouched, so a service can e.g. open a browser against it.
    ///
    /// # Errors
    ///
    /// Returns an error if the serving root is not a readable directory or
    /// the listener cannot be bound. Bind failures are additionally
    /// reported through the error event.
    pub async fn start(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            match state.lifecycle {
                Lifecycle::Idle => state.lifecycle = Lifecycle::Starting,
                _ => {
                    let port = state
                        .running
                        .as_ref()
                        .map_or(self.config.port, |running| running.port);
                    drop(state);
                    tracing::warn!(port, "start() called while server is already running");
                    self.events.emit_server_error(&ServerErrorEvent {
                        code: ErrorCode::ServerIsAlreadyRunning,
                        port,
                    });
                    return Ok(());
                }
            }
        }

        if !self.config.root.is_dir() {
            self.set_idle();
            return Err(EngineError::RootNotFound(self.config.root.clone()));
        }

        let listener =
            match TcpListener::bind((self.config.host.as_str(), self.config.port)).await {
                Ok(listener) => listener,
                Err(source) => {
                    self.set_idle();
                    self.events.emit_server_error(&ServerErrorEvent {
                        code: ErrorCode::BindFailed,
                        port: self.config.port,
                    });
                    return Err(EngineError::Bind {
                        host: self.config.host.clone(),
                        port: self.config.port,
                        source,
                    });
                }
            };
        let port = listener
            .local_addr()
            .map_or(self.config.port, |addr| addr.port());

        let (broadcaster, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let debouncer = Arc::new(ChangeDebouncer::new(self.config.debounce));

        let app_state = Arc::new(AppState {
            root: self.config.root.clone(),
            broadcaster: broadcaster.clone(),
            shutdown: shutdown_rx.clone(),
            middleware: Arc::clone(&self.middleware),
        });
        let router = app::create_router(app_state);

        let mut server_shutdown = shutdown_rx.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
        });

        let pump = tokio::spawn(pump_changes(
            Arc::clone(&debouncer),
            broadcaster.clone(),
            self.config.root.clone(),
            shutdown_rx,
        ));

        {
            let mut state = self.state.lock().unwrap();
            state.lifecycle = Lifecycle::Running;
            state.running = Some(Running {
                port,
                broadcaster,
                debouncer,
                shutdown: shutdown_tx,
                server,
                pump,
            });
        }

        tracing::info!(port, root = %self.config.root.display(), "Server is live");
        self.events.emit_go_live(&GoLiveEvent { port });
        Ok(())
    }

    /// Close all push-channel connections, then the listener.
    ///
    /// Idempotent: stopping an idle engine is a no-op. The engine reaches
    /// idle even when shutdown reports an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the server did not shut down cleanly.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let running = {
            let mut state = self.state.lock().unwrap();
            match state.running.take() {
                Some(running) => {
                    state.lifecycle = Lifecycle::Stopping;
                    running
                }
                None => return Ok(()),
            }
        };

        // A quiet period that elapses mid-shutdown must not broadcast
        // into the torn-down push channel
        running.debouncer.clear();
        let _ = running.shutdown.send(true);
        let _ = running.pump.await;
        let result = running.server.await;

        self.set_idle();
        tracing::info!("Server stopped");

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(EngineError::Shutdown(err.to_string())),
            Err(err) => Err(EngineError::Shutdown(err.to_string())),
        }
    }

    /// Record a file-change notification.
    ///
    /// The host calls this for every observed change; the debouncer
    /// coalesces bursts. A no-op while the engine is not running.
    pub fn notify(&self, path: &Path) {
        let state = self.state.lock().unwrap();
        if let Some(running) = &state.running {
            running.debouncer.notify(path);
            tracing::debug!(path = %path.display(), "Change notification recorded");
        }
    }

    /// Subscribe to the reload-event stream. `None` while not running;
    /// subscriptions do not survive a restart.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ReloadEvent>> {
        self.state
            .lock()
            .unwrap()
            .running
            .as_ref()
            .map(|running| running.broadcaster.subscribe())
    }

    /// The bound port while running, the configured port otherwise.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.state
            .lock()
            .unwrap()
            .running
            .as_ref()
            .map_or(self.config.port, |running| running.port)
    }

    /// Whether the engine is currently serving.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state.lock().unwrap().lifecycle, Lifecycle::Running)
    }

    /// Subscribe to [`GoLiveEvent`].
    pub fn on_did_go_live<F>(&self, handler: F)
    where
        F: Fn(&GoLiveEvent) + Send + Sync + 'static,
    {
        self.events.on_go_live(Box::new(handler));
    }

    /// Subscribe to [`ServerErrorEvent`].
    pub fn on_server_error<F>(&self, handler: F)
    where
        F: Fn(&ServerErrorEvent) + Send + Sync + 'static,
    {
        self.events.on_server_error(Box::new(handler));
    }

    /// Register a service. Its [`Service::register`] hook runs once, here.
    pub fn use_service<S: Service + 'static>(&self, service: S) {
        let name = service.name();
        Arc::new(service).register(self);
        tracing::debug!(service = name, "Service registered");
    }

    /// Register a request interceptor. Interceptors persist across
    /// restarts and run in registration order.
    pub fn use_middleware<F>(&self, layer: F)
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.middleware.write().unwrap().push(Arc::new(layer));
    }

    fn set_idle(&self) {
        let mut state = self.state.lock().unwrap();
        state.lifecycle = Lifecycle::Idle;
        state.running = None;
    }
}

/// Drain elapsed changes from the debouncer and broadcast them.
async fn pump_changes(
    debouncer: Arc<ChangeDebouncer>,
    broadcaster: broadcast::Sender<ReloadEvent>,
    root: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(PUMP_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(path) = debouncer.drain_ready() {
                    let event = ReloadEvent::for_change(&path, &root);
                    match broadcaster.send(event) {
                        Ok(receivers) => {
                            tracing::debug!(path = %path.display(), receivers, "Reload event broadcast");
                        }
                        Err(_) => {
                            tracing::debug!(path = %path.display(), "No push channel clients connected");
                        }
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReloadAction;
    use pretty_assertions::assert_eq;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn test_engine(root: &Path, debounce_ms: u64) -> Engine {
        Engine::new(EngineConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            root: root.to_path_buf(),
            debounce: Duration::from_millis(debounce_ms),
        })
    }

    fn collect_error_codes(engine: &Engine) -> Arc<Mutex<Vec<ErrorCode>>> {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&codes);
        engine.on_server_error(move |event| sink.lock().unwrap().push(event.code));
        codes
    }

    #[tokio::test]
    async fn test_start_stop_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);

        assert!(!engine.is_running());
        engine.start().await.unwrap();
        assert!(engine.is_running());
        assert_ne!(engine.port(), 0);

        engine.stop().await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_start_fails_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir.path().join("missing"), 10);

        let err = engine.start().await.unwrap_err();
        assert!(matches!(err, EngineError::RootNotFound(_)));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_double_start_emits_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);
        let codes = collect_error_codes(&engine);

        engine.start().await.unwrap();
        let port = engine.port();

        // Second start is not a failure and leaves the instance serving
        engine.start().await.unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.port(), port);
        assert_eq!(
            *codes.lock().unwrap(),
            vec![ErrorCode::ServerIsAlreadyRunning]
        );

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);

        engine.stop().await.unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_go_live_reports_bound_port() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        engine.on_did_go_live(move |event| *sink.lock().unwrap() = Some(event.port));

        engine.start().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(engine.port()));

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_bind_failed() {
        let dir = tempfile::tempdir().unwrap();
        let first = test_engine(dir.path(), 10);
        first.start().await.unwrap();

        let second = Engine::new(EngineConfig {
            host: "127.0.0.1".to_owned(),
            port: first.port(),
            root: dir.path().to_path_buf(),
            debounce: Duration::from_millis(10),
        });
        let codes = collect_error_codes(&second);

        let err = second.start().await.unwrap_err();
        assert!(matches!(err, EngineError::Bind { .. }));
        assert_eq!(*codes.lock().unwrap(), vec![ErrorCode::BindFailed]);
        assert!(!second.is_running());
        assert!(first.is_running());

        first.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_broadcasts_classified_events() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);
        engine.start().await.unwrap();

        let mut events = engine.subscribe().unwrap();

        engine.notify(&dir.path().join("style.css"));
        let event = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, ReloadAction::Refreshcss);
        assert_eq!(event.data.file_name, "style.css");

        engine.notify(&dir.path().join("index.html"));
        let event = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event.action, ReloadAction::Reload);
        assert_eq!(event.data.file_name, "index.html");

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_burst_emits_single_event_for_last_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 50);
        engine.start().await.unwrap();

        let mut events = engine.subscribe().unwrap();

        engine.notify(&dir.path().join("a.html"));
        engine.notify(&dir.path().join("b.html"));
        engine.notify(&dir.path().join("c.html"));

        let event = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(event.data.file_name, "c.html");

        // The burst produced exactly one event
        assert!(
            timeout(Duration::from_millis(300), events.recv())
                .await
                .is_err()
        );

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_yields_fresh_subscriptions() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);

        engine.start().await.unwrap();
        let mut stale = engine.subscribe().unwrap();
        engine.stop().await.unwrap();

        // The old subscription is closed, not carried over
        assert!(matches!(
            stale.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        engine.start().await.unwrap();
        let mut fresh = engine.subscribe().unwrap();
        engine.notify(&dir.path().join("index.html"));

        let event = timeout(RECV_TIMEOUT, fresh.recv()).await.unwrap().unwrap();
        assert_eq!(event.data.file_name, "index.html");

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_while_idle_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path(), 10);

        engine.notify(&dir.path().join("index.html"));
        assert!(engine.subscribe().is_none());
    }
}
