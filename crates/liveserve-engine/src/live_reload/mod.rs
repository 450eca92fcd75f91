//! Live reload: wire messages, change debouncing, WebSocket push channel.

pub(crate) mod debouncer;
pub(crate) mod websocket;

use std::ffi::OsStr;
use std::path::Path;

use serde::Serialize;

/// Sent once per connection, immediately after the upgrade completes, so
/// the client can confirm the channel is live before relying on it.
#[derive(Debug, Serialize)]
pub(crate) struct Handshake {
    action: &'static str,
}

impl Handshake {
    pub(crate) fn new() -> Self {
        Self { action: "connected" }
    }
}

/// Event sent to connected clients when a source file changed.
///
/// Serializes to `{"data":{"fileName":"<relative path>"},"action":"reload"}`
/// (or `"refreshcss"` for stylesheet changes).
#[derive(Clone, Debug, Serialize)]
pub struct ReloadEvent {
    /// Event payload.
    pub data: ReloadPayload,
    /// What the client should do.
    pub action: ReloadAction,
}

/// Payload of a [`ReloadEvent`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadPayload {
    /// Changed file's path, relative to the serving root.
    pub file_name: String,
}

/// Client action carried by a [`ReloadEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadAction {
    /// Full page reload.
    Reload,
    /// Refresh stylesheets in place, without reloading the page.
    Refreshcss,
}

impl ReloadEvent {
    /// Build the event for a changed file.
    ///
    /// The reported name is relative to `root`; changes outside the root
    /// fall back to the full path. Stylesheet changes map to
    /// [`ReloadAction::Refreshcss`], everything else to a full reload.
    pub(crate) fn for_change(path: &Path, root: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let file_name = relative.to_string_lossy().replace('\\', "/");

        let action = if is_stylesheet(path) {
            ReloadAction::Refreshcss
        } else {
            ReloadAction::Reload
        };

        Self {
            data: ReloadPayload { file_name },
            action,
        }
    }
}

/// Whether a changed file is a stylesheet.
fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("css"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_handshake_wire_format() {
        let json = serde_json::to_string(&Handshake::new()).unwrap();
        assert_eq!(json, r#"{"action":"connected"}"#);
    }

    #[test]
    fn test_reload_event_wire_format() {
        let event = ReloadEvent::for_change(
            &PathBuf::from("/project/style.css"),
            &PathBuf::from("/project"),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"data":{"fileName":"style.css"},"action":"refreshcss"}"#);
    }

    #[test]
    fn test_html_change_is_full_reload() {
        let event = ReloadEvent::for_change(
            &PathBuf::from("/project/index.html"),
            &PathBuf::from("/project"),
        );
        assert_eq!(event.action, ReloadAction::Reload);
        assert_eq!(event.data.file_name, "index.html");
    }

    #[test]
    fn test_css_extension_case_insensitive() {
        let event = ReloadEvent::for_change(
            &PathBuf::from("/project/theme.CSS"),
            &PathBuf::from("/project"),
        );
        assert_eq!(event.action, ReloadAction::Refreshcss);
    }

    #[test]
    fn test_nested_path_is_relative_to_root() {
        let event = ReloadEvent::for_change(
            &PathBuf::from("/project/assets/app.js"),
            &PathBuf::from("/project"),
        );
        assert_eq!(event.data.file_name, "assets/app.js");
    }

    #[test]
    fn test_path_outside_root_kept_as_is() {
        let event = ReloadEvent::for_change(
            &PathBuf::from("/elsewhere/page.html"),
            &PathBuf::from("/project"),
        );
        assert_eq!(event.data.file_name, "/elsewhere/page.html");
    }
}
