//! Test server lifecycle management
//!
//! Each test gets its own server on a random port, its own client registry and
//! the receiving end of the refresh queue.

use super::{MESSAGE_TIMEOUT_MS, TEST_ACCOUNT};
use futures::StreamExt;
use scrobble_sync::live::ClientRegistry;
use scrobble_sync::scheduler::{UpdateRequest, UPDATE_REQUEST_CAPACITY};
use scrobble_sync::server::{make_app, ServerState};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// When dropped, the server shuts down gracefully.
pub struct TestServer {
    pub base_url: String,
    pub registry: Arc<ClientRegistry>,
    pub update_requests: mpsc::Receiver<UpdateRequest>,
    shutdown: CancellationToken,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let (sender, receiver) = mpsc::channel(UPDATE_REQUEST_CAPACITY);
        let state = ServerState::new(TEST_ACCOUNT, registry.clone(), sender);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let shutdown = CancellationToken::new();
        let app = make_app(state);
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
            .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            registry,
            update_requests: receiver,
            shutdown,
        }
    }

    pub async fn connect_ws(&self, account: Option<&str>) -> WsStream {
        let mut url = self.base_url.replace("http://", "ws://") + "/ws";
        if let Some(account) = account {
            url = format!("{}?account={}", url, account);
        }
        let (ws_stream, _) = connect_async(url)
            .await
            .expect("Failed to connect to WebSocket");
        ws_stream
    }

    /// Polls the registry until it holds `expected` connections.
    pub async fn wait_for_client_count(&self, expected: usize) {
        let result = timeout(Duration::from_millis(MESSAGE_TIMEOUT_MS), async {
            while self.registry.total_count().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            result.is_ok(),
            "Registry never reached {} connections (has {})",
            expected,
            self.registry.total_count().await
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Waits for a message of the given type, skipping any other. Returns None on
/// timeout or when the socket closes first.
pub async fn wait_for_message(ws: &mut WsStream, expected_type: &str) -> Option<Value> {
    let result = timeout(Duration::from_millis(MESSAGE_TIMEOUT_MS), async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Ok(json) = serde_json::from_str::<Value>(&text) {
                    if json.get("type").and_then(|t| t.as_str()) == Some(expected_type) {
                        return Some(json);
                    }
                }
            }
        }
        None
    })
    .await;

    result.ok().flatten()
}
