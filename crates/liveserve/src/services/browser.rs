//! Browser-opening service.

use std::sync::Arc;

use liveserve_engine::{Engine, ErrorCode, Service};

/// Opens a browser tab against the running server.
pub(crate) struct BrowserService {
    host: String,
    browser: Option<String>,
    active_doc: Option<String>,
}

impl BrowserService {
    /// Create the service.
    ///
    /// `browser` of `None` or `"default"` uses the system default browser;
    /// `active_doc` is the path opened, relative to the serving root.
    pub(crate) fn new(host: String, browser: Option<String>, active_doc: Option<String>) -> Self {
        Self {
            host,
            browser,
            active_doc,
        }
    }

    /// Address of the page to open.
    fn address(&self, port: u16) -> String {
        let doc = self.active_doc.as_deref().unwrap_or("");
        format!(
            "http://{}:{}/{}",
            self.host,
            port,
            doc.trim_start_matches('/')
        )
    }

    fn open(&self, port: u16) {
        let url = self.address(port);
        let result = match self.browser.as_deref().filter(|name| *name != "default") {
            Some(browser) => open::with(&url, browser),
            None => open::that(&url),
        };
        if let Err(err) = result {
            tracing::warn!(url = %url, error = %err, "Failed to open browser");
        }
    }
}

impl Service for BrowserService {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn register(self: Arc<Self>, engine: &Engine) {
        let on_live = Arc::clone(&self);
        engine.on_did_go_live(move |event| on_live.open(event.port));

        // A second `start` against a running server is an expected
        // condition: point the browser at the instance that is live
        engine.on_server_error(move |event| {
            if event.code == ErrorCode::ServerIsAlreadyRunning {
                self.open(event.port);
            }
        });
    }
}
