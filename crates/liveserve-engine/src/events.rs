//! Engine lifecycle events and their subscription registry.
//!
//! Handlers are appended in registration order and invoked synchronously in
//! that order when an event is emitted. There are no priorities and no
//! cancellation; a handler cannot stop later handlers from running.

use std::sync::Mutex;

use crate::error::ErrorCode;

/// Emitted once the engine has bound its listener and is serving.
#[derive(Clone, Copy, Debug)]
pub struct GoLiveEvent {
    /// The actual bound port (resolved when the config asked for port 0).
    pub port: u16,
}

/// Emitted for recoverable error conditions services may react to.
#[derive(Clone, Copy, Debug)]
pub struct ServerErrorEvent {
    /// Classifiable error code.
    pub code: ErrorCode,
    /// Port associated with the condition. For
    /// [`ErrorCode::ServerIsAlreadyRunning`] this is the port of the
    /// instance that is still serving.
    pub port: u16,
}

type GoLiveHandler = Box<dyn Fn(&GoLiveEvent) + Send + Sync>;
type ServerErrorHandler = Box<dyn Fn(&ServerErrorEvent) + Send + Sync>;

/// Typed publish/subscribe registry for engine lifecycle events.
///
/// Registrations are held for the engine's lifetime; there is no
/// unregistration.
#[derive(Default)]
pub(crate) struct EventBus {
    go_live: Mutex<Vec<GoLiveHandler>>,
    server_error: Mutex<Vec<ServerErrorHandler>>,
}

impl EventBus {
    pub(crate) fn on_go_live(&self, handler: GoLiveHandler) {
        self.go_live.lock().unwrap().push(handler);
    }

    pub(crate) fn on_server_error(&self, handler: ServerErrorHandler) {
        self.server_error.lock().unwrap().push(handler);
    }

    pub(crate) fn emit_go_live(&self, event: &GoLiveEvent) {
        for handler in self.go_live.lock().unwrap().iter() {
            handler(event);
        }
    }

    pub(crate) fn emit_server_error(&self, event: &ServerErrorEvent) {
        for handler in self.server_error.lock().unwrap().iter() {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_handlers_invoked_in_registration_order() {
        let bus = EventBus::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = Arc::clone(&seen);
            bus.on_go_live(Box::new(move |_| seen.lock().unwrap().push(id)));
        }

        bus.emit_go_live(&GoLiveEvent { port: 9000 });
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_emit_with_no_handlers_is_noop() {
        let bus = EventBus::default();
        bus.emit_server_error(&ServerErrorEvent {
            code: ErrorCode::BindFailed,
            port: 9000,
        });
    }

    #[test]
    fn test_every_handler_sees_the_event() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let count = Arc::clone(&count);
            bus.on_server_error(Box::new(move |event| {
                assert_eq!(event.code, ErrorCode::ServerIsAlreadyRunning);
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        bus.emit_server_error(&ServerErrorEvent {
            code: ErrorCode::ServerIsAlreadyRunning,
            port: 9000,
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
