//! Per-connection push channel to browser clients over WebSocket.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use collab_core::model::Notification;
use collab_core::new_ulid;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Client-invokable method returning the caller's connection id.
pub const GET_CONNECTION_ID: &str = "getConnectionId";

/// Addresses notifications to connected clients.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers to one connection. Unknown ids are dropped.
    async fn send(&self, connection_id: &str, notification: Notification);
    async fn broadcast(&self, notification: Notification);
}

/// Frame written to a client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Event(Notification),
    ConnectionId(String),
}

impl ServerFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            ServerFrame::Event(n) => serde_json::to_string(n),
            ServerFrame::ConnectionId(id) => serde_json::to_string(&serde_json::json!({
                "event": "connectionId",
                "payload": id,
            })),
        }
    }
}

/// True for `getConnectionId` sent bare or as `{"invoke":"getConnectionId"}`.
pub fn is_connection_id_request(text: &str) -> bool {
    let text = text.trim();
    if text == GET_CONNECTION_ID {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("invoke").and_then(|m| m.as_str()).map(|m| m == GET_CONNECTION_ID))
        .unwrap_or(false)
}

#[derive(Default)]
pub struct NotificationHub {
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<ServerFrame>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: &str) -> mpsc::UnboundedReceiver<ServerFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .await
            .insert(connection_id.to_string(), tx);
        rx
    }

    pub async fn unregister(&self, connection_id: &str) {
        self.connections.write().await.remove(connection_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn push(&self, connection_id: &str, frame: ServerFrame) {
        let delivered = match self.connections.read().await.get(connection_id) {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        };
        if !delivered {
            debug!(connection_id = %connection_id, "dropping frame for unknown connection");
        }
    }
}

#[async_trait]
impl Notifier for NotificationHub {
    async fn send(&self, connection_id: &str, notification: Notification) {
        self.push(connection_id, ServerFrame::Event(notification)).await;
    }

    async fn broadcast(&self, notification: Notification) {
        for tx in self.connections.read().await.values() {
            let _ = tx.send(ServerFrame::Event(notification.clone()));
        }
    }
}

/// Drives one client socket until it closes.
pub async fn serve_socket(socket: WebSocket, hub: Arc<NotificationHub>) {
    let id = new_ulid().to_string();
    let mut rx = hub.register(&id).await;
    let connections = hub.connection_count().await;
    info!(connection_id = %id, connections, "client connected");

    let (mut sink, mut stream) = socket.split();
    let forward = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_json() {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "encode frame failed");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) if is_connection_id_request(text.as_str()) => {
                hub.push(&id, ServerFrame::ConnectionId(id.clone())).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.unregister(&id).await;
    forward.abort();
    info!(connection_id = %id, "client disconnected");
}
