// ── Connection listener registry ──

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::encode::{self, ConnectionBroadcast};
use crate::reply::ReplySink;

/// Caller-assigned listener ids mapped to their broadcast streams.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: BTreeMap<i64, ReplySink>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Register `sink` under `id`. A duplicate id keeps the existing
    /// listener; the new sink is dropped and its stream ends.
    pub fn register(&mut self, id: i64, sink: ReplySink) -> bool {
        if self.listeners.contains_key(&id) {
            warn!(listener = id, "connection listener id already registered, ignoring");
            return false;
        }
        self.listeners.insert(id, sink);
        debug!(listener = id, "connection listener registered");
        true
    }

    pub fn unregister(&mut self, id: i64) -> Option<ReplySink> {
        let removed = self.listeners.remove(&id);
        if removed.is_some() {
            debug!(listener = id, "connection listener removed");
        }
        removed
    }

    /// Send the same snapshot to every listener. Returns how many
    /// listeners received it.
    pub fn broadcast(&mut self, snapshot: &ConnectionBroadcast) -> usize {
        self.listeners.retain(|id, sink| {
            let open = !sink.is_closed();
            if !open {
                debug!(listener = id, "pruning connection listener with dropped stream");
            }
            open
        });

        let Some(payload) = encode::to_payload("connectionState", snapshot) else {
            return 0;
        };
        for sink in self.listeners.values() {
            sink.send(payload.clone());
        }
        self.listeners.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
