//! Connection registry and broadcaster
//!
//! Tracks live real-time connections, either global (every broadcast) or
//! scoped to one `(entityType, entityId)` pair (broadcasts for that pair
//! plus all global ones). A single mutex serializes every mutation of the
//! registry's maps and lists; outbound sends (which may block on a slow
//! peer) always happen outside the lock, against a snapshot, so one slow
//! connection never stalls registry mutation for unrelated entities.
//!
//! A connection is an outbound channel into its socket task; the first
//! failed send evicts it from every list before the broadcast returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::wire::normalize;

/// Outbound handle for one registered connection. Cloneable; the socket
/// task owns the receiving end and pumps messages onto the wire.
#[derive(Debug, Clone)]
pub struct Connection {
    id: u64,
    tx: mpsc::Sender<String>,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }

    async fn send(&self, text: String) -> bool {
        self.tx.send(text).await.is_ok()
    }
}

/// Scope of a registration: a specific entity, or everything.
pub type Scope = Option<(String, String)>;

#[derive(Default)]
struct RegistryState {
    scoped: HashMap<String, HashMap<String, Vec<Connection>>>,
    global: Vec<Connection>,
}

impl RegistryState {
    fn remove(&mut self, conn_id: u64, scope: &Scope) {
        match scope {
            Some((entity_type, entity_id)) => {
                if let Some(by_id) = self.scoped.get_mut(entity_type) {
                    if let Some(conns) = by_id.get_mut(entity_id) {
                        conns.retain(|c| c.id != conn_id);
                        if conns.is_empty() {
                            by_id.remove(entity_id);
                        }
                    }
                    if by_id.is_empty() {
                        self.scoped.remove(entity_type);
                    }
                }
            }
            None => self.global.retain(|c| c.id != conn_id),
        }
    }

    /// Drop the given connections from the global list and every scoped
    /// list, pruning emptied entries.
    fn evict(&mut self, failed: &[u64]) {
        self.global.retain(|c| !failed.contains(&c.id));
        self.scoped.retain(|_, by_id| {
            by_id.retain(|_, conns| {
                conns.retain(|c| !failed.contains(&c.id));
                !conns.is_empty()
            });
            !by_id.is_empty()
        });
    }
}

/// Registry of live connections plus the broadcast fan-out.
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Mint a connection handle around an outbound channel.
    pub fn connection(&self, tx: mpsc::Sender<String>) -> Connection {
        Connection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tx,
        }
    }

    /// Register a connection, scoped when both type and id are given.
    pub async fn connect(&self, conn: Connection, scope: Scope) {
        let mut state = self.state.lock().await;
        match scope {
            Some((entity_type, entity_id)) => {
                state
                    .scoped
                    .entry(entity_type)
                    .or_default()
                    .entry(entity_id)
                    .or_default()
                    .push(conn);
            }
            None => state.global.push(conn),
        }
    }

    /// Remove a connection, pruning emptied scope entries.
    pub async fn disconnect(&self, conn_id: u64, scope: &Scope) {
        self.state.lock().await.remove(conn_id, scope);
    }

    /// Send to every connection scoped to `(entity_type, entity_id)` plus
    /// every global connection.
    pub async fn broadcast_to_entity(&self, entity_type: &str, entity_id: &str, message: &Value) {
        let snapshot = {
            let state = self.state.lock().await;
            let mut conns: Vec<Connection> = state
                .scoped
                .get(entity_type)
                .and_then(|by_id| by_id.get(entity_id))
                .cloned()
                .unwrap_or_default();
            conns.extend(state.global.iter().cloned());
            conns
        };

        self.send_all(snapshot, message).await;
    }

    /// Send to every global connection.
    pub async fn broadcast_global(&self, message: &Value) {
        let snapshot = {
            let state = self.state.lock().await;
            state.global.clone()
        };

        self.send_all(snapshot, message).await;
    }

    /// Package an event's client effects into the broadcast message shape
    /// and fan it out to the entity's subscribers.
    pub async fn broadcast_client_effects(
        &self,
        entity_type: &str,
        entity_id: &str,
        event: &str,
        effects: &[Value],
        data: &Map<String, Value>,
    ) {
        let message = json!({
            "type": "client_effects",
            "entityType": entity_type,
            "entityId": entity_id,
            "event": event,
            "effects": effects,
            "data": data,
        });
        self.broadcast_to_entity(entity_type, entity_id, &message).await;
    }

    /// Serialize once, send to the snapshot outside the lock, then evict
    /// every failed connection in a single locked pass.
    async fn send_all(&self, connections: Vec<Connection>, message: &Value) {
        if connections.is_empty() {
            return;
        }

        let text = normalize(message.clone()).to_string();

        let mut failed = Vec::new();
        for conn in &connections {
            if !conn.send(text.clone()).await {
                failed.push(conn.id);
            }
        }

        if !failed.is_empty() {
            debug!(count = failed.len(), "evicting dead connections");
            self.state.lock().await.evict(&failed);
        }
    }

    /// Total number of registered connections (tests/ops visibility).
    pub async fn connection_count(&self) -> usize {
        let state = self.state.lock().await;
        let scoped: usize = state
            .scoped
            .values()
            .flat_map(|by_id| by_id.values())
            .map(Vec::len)
            .sum();
        scoped + state.global.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
