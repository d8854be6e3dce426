//! Live-update subscriber registry.
//!
//! All SSE connections register a sender here; the webhook path broadcasts
//! through it. Mutation happens at a single point (the internal mutex), so
//! handlers never share connection state directly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Event pushed to every live subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct GraphUpdate {
    #[serde(rename = "type")]
    pub kind: String,
    pub update_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl GraphUpdate {
    pub fn new(update_type: &str, data: Value) -> Self {
        Self {
            kind: "graph_update".to_string(),
            update_type: update_type.to_string(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Registry of active subscriber channels.
#[derive(Default)]
pub struct UpdateRegistry {
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<GraphUpdate>>>,
}

/// Keeps a subscription registered; dropping it removes the entry.
pub struct Subscription {
    id: Uuid,
    registry: Arc<UpdateRegistry>,
    pub receiver: mpsc::UnboundedReceiver<GraphUpdate>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

impl UpdateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and hand back its receiving end.
    pub fn subscribe(registry: &Arc<UpdateRegistry>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut subscribers = registry.subscribers.lock().unwrap();
        subscribers.insert(id, tx);
        log::info!(
            "Update subscriber connected. Total connections: {}",
            subscribers.len()
        );

        Subscription {
            id,
            registry: Arc::clone(registry),
            receiver: rx,
        }
    }

    fn remove(&self, id: Uuid) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.remove(&id).is_some() {
            log::info!(
                "Update subscriber disconnected. Total connections: {}",
                subscribers.len()
            );
        }
    }

    /// Send an update to every live subscriber, pruning closed channels.
    /// Returns how many subscribers received the message.
    pub fn broadcast(&self, update: GraphUpdate) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        let mut dead = Vec::new();

        for (id, tx) in subscribers.iter() {
            if tx.send(update.clone()).is_err() {
                dead.push(*id);
            }
        }

        for id in &dead {
            subscribers.remove(id);
        }

        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_broadcast() {
        let registry = Arc::new(UpdateRegistry::new());
        let mut sub = UpdateRegistry::subscribe(&registry);
        assert_eq!(registry.subscriber_count(), 1);

        let delivered = registry.broadcast(GraphUpdate::new("product_synced", json!({"sku": "med_01"})));
        assert_eq!(delivered, 1);

        let update = sub.receiver.recv().await.unwrap();
        assert_eq!(update.kind, "graph_update");
        assert_eq!(update.update_type, "product_synced");
        assert_eq!(update.data["sku"], "med_01");
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let registry = Arc::new(UpdateRegistry::new());
        let sub = UpdateRegistry::subscribe(&registry);
        assert_eq!(registry.subscriber_count(), 1);
        drop(sub);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_dead_receivers() {
        let registry = Arc::new(UpdateRegistry::new());
        let mut sub = UpdateRegistry::subscribe(&registry);
        // Close the receiving end without dropping the Subscription guard
        sub.receiver.close();

        let remaining = registry.broadcast(GraphUpdate::new("noop", json!({})));
        assert_eq!(remaining, 0);
        // Dropping the guard afterwards finds the entry already pruned
        drop(sub);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let registry = Arc::new(UpdateRegistry::new());
        let mut a = UpdateRegistry::subscribe(&registry);
        let mut b = UpdateRegistry::subscribe(&registry);

        registry.broadcast(GraphUpdate::new("graph_rebuilt", json!({"total_nodes": 4})));

        assert_eq!(a.receiver.recv().await.unwrap().update_type, "graph_rebuilt");
        assert_eq!(b.receiver.recv().await.unwrap().update_type, "graph_rebuilt");
    }
}
