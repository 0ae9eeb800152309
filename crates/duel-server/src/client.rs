use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use duel_core::{ConnectionId, RoomCode};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::gateway::Gateway;
use crate::protocol::ServerEvent;

/// What the connection tasks hand to the event processor.
#[derive(Debug)]
pub enum Inbound {
    Frame(ConnectionId, String),
    Disconnected(ConnectionId),
}

/// A connected WebSocket client.
pub struct Client {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    groups: HashSet<RoomCode>,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            groups: HashSet::new(),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    pub fn in_group(&self, code: &RoomCode) -> bool {
        self.groups.contains(code)
    }

    fn push(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected WebSocket clients and their room groups.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Client>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
            client_timeout,
        }
    }

    /// Register a new client and return its identity and outbound queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients.insert(id.clone(), Client::new(id.clone(), tx));
        (id, rx)
    }

    /// Remove a client. Dropping its sender ends the writer task.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn record_pong(&self, id: &ConnectionId) {
        if let Some(client) = self.clients.get(id) {
            client.record_pong();
        }
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Connections currently in a room's group.
    #[cfg(test)]
    pub fn members_of(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.clients
            .iter()
            .filter(|entry| entry.in_group(code))
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Remove clients that haven't answered a ping within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|entry| !entry.is_alive(self.client_timeout))
            .map(|entry| entry.id.clone())
            .collect();

        let mut removed = 0;
        for id in dead {
            if self.unregister(&id) {
                removed += 1;
                tracing::info!(conn_id = %id, "Cleaned up dead client");
            }
        }
        removed
    }

    fn serialize(event: &ServerEvent) -> Option<String> {
        match serde_json::to_string(event) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "Failed to serialize event");
                None
            }
        }
    }
}

impl Gateway for ClientRegistry {
    fn send_to(&self, conn: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(json) = Self::serialize(event) else {
            return false;
        };
        self.clients
            .get(conn)
            .map(|client| client.push(json))
            .unwrap_or(false)
    }

    fn broadcast_to_room(&self, code: &RoomCode, event: &ServerEvent) -> usize {
        let Some(json) = Self::serialize(event) else {
            return 0;
        };
        let mut recipients = 0;
        for client in self.clients.iter().filter(|entry| entry.in_group(code)) {
            if client.push(json.clone()) {
                recipients += 1;
            }
        }
        tracing::debug!(room_code = %code, event = event.name(), recipients, "Broadcast event");
        recipients
    }

    fn join_group(&self, conn: &ConnectionId, code: &RoomCode) {
        if let Some(mut client) = self.clients.get_mut(conn) {
            client.groups.insert(code.clone());
        }
    }

    fn leave_group(&self, conn: &ConnectionId, code: &RoomCode) {
        if let Some(mut client) = self.clients.get_mut(conn) {
            client.groups.remove(code);
        }
    }

    fn leave_all_groups(&self, conn: &ConnectionId) {
        if let Some(mut client) = self.clients.get_mut(conn) {
            client.groups.clear();
        }
    }
}

/// Handle a WebSocket connection: split into reader/writer, manage lifecycle
/// with heartbeat, and report the disconnect once either side ends.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnectionId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    inbound: mpsc::Sender<Inbound>,
    heartbeat: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued messages to the socket + periodic ping
    let writer_cid = conn_id.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_cid, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader task: forward frames to the processor, track pongs
    let reader_cid = conn_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader_inbound = inbound.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let frame = Inbound::Frame(reader_cid.clone(), text.to_string());
                    if reader_inbound.send(frame).await.is_err() {
                        break;
                    }
                }
                WsMessage::Pong(_) => reader_registry.record_pong(&reader_cid),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&conn_id);
    tracing::info!(conn_id = %conn_id, "WebSocket client disconnected");
    let _ = inbound.send(Inbound::Disconnected(conn_id)).await;
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "Dead client cleanup");
            }
        }
    })
}
