//! Terminal notification service.

use std::sync::Arc;

use liveserve_engine::{Engine, Service};

use crate::output::Output;

/// Announces engine lifecycle transitions and errors on the terminal.
pub(crate) struct NotificationService {
    output: Output,
}

impl NotificationService {
    pub(crate) fn new() -> Self {
        Self {
            output: Output::new(),
        }
    }
}

impl Service for NotificationService {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn register(self: Arc<Self>, engine: &Engine) {
        let on_live = Arc::clone(&self);
        engine.on_did_go_live(move |event| {
            on_live
                .output
                .success(&format!("Server is live on port {}", event.port));
        });

        engine.on_server_error(move |event| {
            self.output
                .warning(&format!("Server reported: {}", event.code));
        });
    }
}
