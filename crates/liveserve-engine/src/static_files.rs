//! Static file serving with reload-script injection.
//!
//! Resolves request paths under the serving root and streams file bytes to
//! the response. HTML-family responses get the reload-client snippet
//! appended after the last file byte; everything else is served
//! byte-identical. Reads always hit the disk, there is no caching.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use futures::stream::{self, StreamExt};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::state::AppState;

/// Client bootstrap appended to injectable responses. Connects back to the
/// control path and reloads the page (or refreshes stylesheets) on demand.
pub(crate) const INJECTED_SNIPPET: &str = r#"
<!-- Code injected by liveserve -->
<script>
(function () {
  var scheme = window.location.protocol === 'https:' ? 'wss://' : 'ws://';
  var socket = new WebSocket(scheme + window.location.host + '/_ws');
  socket.onmessage = function (msg) {
    var payload = JSON.parse(msg.data);
    if (payload.action === 'reload') {
      window.location.reload();
    } else if (payload.action === 'refreshcss') {
      var links = document.getElementsByTagName('link');
      for (var i = 0; i < links.length; i++) {
        var link = links[i];
        if (link.rel !== 'stylesheet') continue;
        var href = link.href.replace(/[?&]_cacheOverride=\d+/, '');
        link.href = href + (href.indexOf('?') >= 0 ? '&' : '?') + '_cacheOverride=' + Date.now();
      }
    }
  };
})();
</script>
"#;

/// Extensions whose responses receive the injected snippet.
const INJECTABLE_EXTENSIONS: &[&str] = &["html", "htm", "xhtml"];

/// Serve a file from under the serving root.
///
/// Fallback handler for everything that is not the control path.
pub(crate) async fn serve_file(State(state): State<Arc<AppState>>, req: Request) -> Response {
    // Upgrade attempts outside the control path get no file served;
    // the connection is torn down instead of left half-open.
    if req.headers().contains_key(header::UPGRADE) {
        tracing::debug!(path = req.uri().path(), "Refused upgrade outside control path");
        return refuse_upgrade();
    }

    // Registered interceptors run ahead of file resolution
    let intercepted = {
        let middleware = state.middleware.read().unwrap();
        middleware.iter().find_map(|layer| layer(&req))
    };
    if let Some(response) = intercepted {
        return response;
    }

    let rel = request_file_path(req.uri().path());
    let Some(full) = resolve_under_root(&state.root, &rel) else {
        return empty_status(StatusCode::NOT_FOUND);
    };

    match File::open(&full).await {
        Ok(file) => {
            // Opening a directory succeeds on some platforms; reads do not
            if file.metadata().await.is_ok_and(|meta| meta.is_dir()) {
                return empty_status(StatusCode::NOT_FOUND);
            }
            stream_response(file, &rel)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %full.display(), "File not found");
            empty_status(StatusCode::NOT_FOUND)
        }
        Err(err) => {
            tracing::error!(path = %full.display(), error = %err, "File read failed");
            empty_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Map a request path to a file path relative to the root.
fn request_file_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        "index.html".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Join a relative request path under the root, refusing traversal.
fn resolve_under_root(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    if rel
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return None;
    }
    Some(root.join(rel))
}

/// Whether the snippet is appended to this file's response.
fn is_injectable(rel: &str) -> bool {
    Path::new(rel)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            INJECTABLE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// Stream the file as the response body, appending the snippet for
/// injectable files. The body is piped, never fully buffered.
fn stream_response(file: File, rel: &str) -> Response {
    let mime = mime_guess::from_path(rel).first_or_octet_stream();
    let file_stream = ReaderStream::new(file);

    let body = if is_injectable(rel) {
        let tail = stream::once(async {
            Ok::<_, std::io::Error>(Bytes::from_static(INJECTED_SNIPPET.as_bytes()))
        });
        Body::from_stream(file_stream.chain(tail))
    } else {
        Body::from_stream(file_stream)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(body)
        .unwrap()
}

/// Status-only response with an empty body.
fn empty_status(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap()
}

/// Response for upgrade requests outside the control path.
fn refuse_upgrade() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONNECTION, "close")
        .body(Body::empty())
        .unwrap()
}
