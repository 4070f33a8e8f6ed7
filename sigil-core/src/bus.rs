//! In-process event bus
//!
//! Fire-and-forget publish/subscribe for cross-component notification,
//! decoupled from the HTTP event/response cycle (e.g. one trait reacting to
//! another trait's state change). One bus instance is constructed by the
//! process entry point and shared explicitly; there is no hidden global.
//!
//! Emission is intentionally sequential: subscribers run in subscription
//! order, and a failing handler is logged and skipped so it can neither
//! block later handlers nor race their side effects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::warn;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Boxed async event handler. Returning `Err` marks the invocation failed;
/// the bus logs it and continues with the next subscriber.
pub type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: EventHandler,
    once: bool,
}

#[derive(Default)]
struct BusState {
    subscriptions: std::collections::HashMap<String, Vec<Subscription>>,
}

/// Process-lifetime publish/subscribe bus.
pub struct EventBus {
    state: Mutex<BusState>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe a handler to an event name. With `once`, the handler is
    /// removed after its first invocation.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        handler: EventHandler,
        once: bool,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock();
        state
            .subscriptions
            .entry(event.into())
            .or_default()
            .push(Subscription { id, handler, once });
        id
    }

    /// Wrap a synchronous closure as an [`EventHandler`].
    pub fn handler<F>(f: F) -> EventHandler
    where
        F: Fn(Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(move |payload| {
            let result = f(payload);
            Box::pin(async move { result })
        })
    }

    /// Remove one subscription by its token.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        for subs in state.subscriptions.values_mut() {
            subs.retain(|sub| sub.id != id);
        }
        state.subscriptions.retain(|_, subs| !subs.is_empty());
    }

    /// Emit an event to all subscribers, sequentially, in subscription
    /// order. No subscribers is a no-op. Handlers marked `once` are removed
    /// after the pass.
    pub async fn emit(&self, event: &str, payload: Option<Value>) {
        let payload = payload.unwrap_or_else(|| Value::Object(Map::new()));

        // Snapshot outside the await points; subscriptions taken during an
        // emit see the next emit.
        let handlers: Vec<(SubscriptionId, EventHandler, bool)> = {
            let state = self.state.lock();
            match state.subscriptions.get(event) {
                Some(subs) => subs
                    .iter()
                    .map(|sub| (sub.id, sub.handler.clone(), sub.once))
                    .collect(),
                None => return,
            }
        };

        let mut expired = Vec::new();
        for (id, handler, once) in handlers {
            if let Err(error) = handler(payload.clone()).await {
                warn!(event, %error, "event handler failed");
            }
            if once {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            let mut state = self.state.lock();
            if let Some(subs) = state.subscriptions.get_mut(event) {
                subs.retain(|sub| !expired.contains(&sub.id));
                if subs.is_empty() {
                    state.subscriptions.remove(event);
                }
            }
        }
    }

    /// Clear subscriptions for one event, or all of them.
    pub fn clear(&self, event: Option<&str>) {
        let mut state = self.state.lock();
        match event {
            Some(event) => {
                state.subscriptions.remove(event);
            }
            None => state.subscriptions.clear(),
        }
    }

    /// Number of live subscriptions for an event.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
