//! WebSocket push channel.
//!
//! Accepts client connections on the control path and forwards broadcast
//! reload events to each of them.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;

use super::Handshake;
use crate::state::AppState;

/// Handle the WebSocket upgrade on the control path.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one established connection until it closes or the engine stops.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let hello = serde_json::to_string(&Handshake::new()).unwrap();
    if socket.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    let mut events = state.broadcaster.subscribe();
    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            // Forward reload events to this client
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        let msg = serde_json::to_string(&event).unwrap();
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            // This client is gone; others are unaffected
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
            // Drain client messages (keepalive); reconnection is client-side
            result = socket.recv() => {
                match result {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
            // Engine stopping: close the connection so graceful shutdown
            // can complete
            _ = shutdown.changed() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::debug!("Push channel client disconnected");
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use crate::{Engine, EngineConfig};

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_engine(root: &Path) -> Engine {
        let engine = Engine::new(EngineConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            root: root.to_path_buf(),
            debounce: Duration::from_millis(10),
        });
        engine.start().await.unwrap();
        engine
    }

    async fn connect(port: u16) -> Client {
        let (client, _) = connect_async(format!("ws://127.0.0.1:{port}/_ws"))
            .await
            .unwrap();
        client
    }

    async fn recv_text(client: &mut Client) -> String {
        let msg = timeout(RECV_TIMEOUT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        msg.into_text().unwrap().as_str().to_owned()
    }

    #[tokio::test]
    async fn test_connect_yields_handshake_first() {
        let dir = tempfile::tempdir().unwrap();
        let engine = start_engine(dir.path()).await;

        let mut client = connect(engine.port()).await;
        assert_eq!(recv_text(&mut client).await, r#"{"action":"connected"}"#);

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_reaches_connected_client() {
        let dir = tempfile::tempdir().unwrap();
        let engine = start_engine(dir.path()).await;

        let mut client = connect(engine.port()).await;
        recv_text(&mut client).await;

        engine.notify(&dir.path().join("style.css"));
        assert_eq!(
            recv_text(&mut client).await,
            r#"{"data":{"fileName":"style.css"},"action":"refreshcss"}"#
        );

        engine.notify(&dir.path().join("index.html"));
        assert_eq!(
            recv_text(&mut client).await,
            r#"{"data":{"fileName":"index.html"},"action":"reload"}"#
        );

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_client_misses_earlier_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let engine = start_engine(dir.path()).await;

        // Let the event fire while nobody from this test is connected
        let mut events = engine.subscribe().unwrap();
        engine.notify(&dir.path().join("index.html"));
        timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();

        let mut client = connect(engine.port()).await;
        recv_text(&mut client).await;

        // Nothing but the handshake arrives for a connection opened after
        // the broadcast
        assert!(
            timeout(Duration::from_millis(300), client.next())
                .await
                .is_err()
        );

        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_client_connections() {
        let dir = tempfile::tempdir().unwrap();
        let engine = start_engine(dir.path()).await;

        let mut client = connect(engine.port()).await;
        recv_text(&mut client).await;

        engine.stop().await.unwrap();

        let msg = timeout(RECV_TIMEOUT, client.next()).await.unwrap();
        assert!(matches!(msg, Some(Ok(WsMessage::Close(_))) | None));
    }

    #[tokio::test]
    async fn test_upgrade_outside_control_path_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let engine = start_engine(dir.path()).await;

        let result = connect_async(format!("ws://127.0.0.1:{}/index.html", engine.port())).await;
        assert!(result.is_err());

        engine.stop().await.unwrap();
    }
}
