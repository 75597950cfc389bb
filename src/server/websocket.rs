//! WebSocket transport for live viewers.
//!
//! Each connection registers with the [`ClientRegistry`], receives a
//! `connected` greeting, then gets every message queued on its channel.
//! Clients may send `ping` and `refresh`. A frame that is not a valid
//! message envelope ends the connection.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    http::{header::USER_AGENT, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::metrics;
use super::state::ServerState;
use crate::live::messages::payloads;
use crate::live::{msg_types, ClientMessage, ServerMessage, WebsocketClient};
use crate::scheduler::UpdateRequest;

/// How long the writer may take to flush after the reader has finished.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub account: Option<String>,
}

/// Route handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_address): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<WsParams>,
    State(state): State<ServerState>,
) -> Response {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let account = params
        .account
        .filter(|account| !account.is_empty())
        .unwrap_or_else(|| state.default_account.clone());

    let client = WebsocketClient::new(remote_address.to_string(), user_agent, account);
    ws.on_upgrade(move |socket| handle_socket(socket, client, state))
}

fn server_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"))
}

async fn handle_socket(socket: WebSocket, client: WebsocketClient, state: ServerState) {
    let account = client.owner_id.clone();
    let (connection_id, outgoing_rx) = state.client_registry.register(client).await;
    metrics::set_live_clients(state.client_registry.total_count().await);
    info!("Live client {} connected for {}", connection_id, account);

    let (ws_sink, ws_stream) = socket.split();

    let connected = ServerMessage::new(
        msg_types::CONNECTED,
        payloads::Connected {
            connection_id: connection_id.to_string(),
            account: account.clone(),
            server_version: server_version(),
        },
    );
    let mut writer = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx, connected));

    process_incoming(ws_stream, connection_id, &account, &state).await;

    // Dropping the registry's sender lets the writer flush what is queued
    // and then close the socket.
    state.client_registry.deregister(&connection_id).await;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!("Writer for {} did not drain in time", connection_id);
        writer.abort();
    }

    metrics::set_live_clients(state.client_registry.total_count().await);
    info!("Live client {} disconnected", connection_id);
}

async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
    initial_msg: ServerMessage,
) {
    if let Ok(json) = serde_json::to_string(&initial_msg) {
        if ws_sink.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }

    let _ = ws_sink.close().await;
}

async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    connection_id: Uuid,
    account: &str,
    state: &ServerState,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                state.client_registry.touch(&connection_id).await;
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_client_message(connection_id, account, msg, state).await,
                    Err(e) => {
                        debug!("Malformed message from {}: {}", connection_id, e);
                        let _ = state
                            .client_registry
                            .send_to(
                                &connection_id,
                                ServerMessage::error(
                                    "parse_error",
                                    format!("Invalid message format: {}", e),
                                ),
                            )
                            .await;
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                state.client_registry.touch(&connection_id).await;
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame from {}", connection_id);
                break;
            }
            Err(e) => {
                debug!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }
}

async fn handle_client_message(
    connection_id: Uuid,
    account: &str,
    msg: ClientMessage,
    state: &ServerState,
) {
    match msg.msg_type.as_str() {
        msg_types::PING => {
            let _ = state
                .client_registry
                .send_to(&connection_id, ServerMessage::empty(msg_types::PONG))
                .await;
        }
        msg_types::REFRESH => {
            let request = UpdateRequest {
                account_id: account.to_string(),
            };
            match state.update_requests.try_send(request) {
                Ok(()) => debug!("Refresh requested by {} for {}", connection_id, account),
                Err(TrySendError::Full(_)) => {
                    debug!("Refresh queue full, dropping request from {}", connection_id)
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Update scheduler is not running, refresh ignored")
                }
            }
        }
        other => {
            debug!("Unknown message type from {}: {}", connection_id, other);
            let _ = state
                .client_registry
                .send_to(
                    &connection_id,
                    ServerMessage::error(
                        "unknown_type",
                        format!("Unknown message type: {}", other),
                    ),
                )
                .await;
        }
    }
}
