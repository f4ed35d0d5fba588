//! Presence store: the set of participants currently online.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use super::listeners::{Listeners, SubscriptionId};

#[derive(Default)]
struct Inner {
    online: RwLock<HashSet<String>>,
    listeners: Listeners<PresenceChange>,
}

/// What changed in the online set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Online(Vec<String>),
    Offline(String),
    Cleared,
}

/// Online set fed by `status`/`cnv` frames and the conversation snapshot.
#[derive(Clone, Default)]
pub struct PresenceStore {
    inner: Arc<Inner>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark ids as online. Ids already present are skipped; listeners are
    /// only notified when at least one id was new.
    pub fn add<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<String> = {
            let mut online = self.inner.online.write();
            ids.into_iter()
                .map(Into::into)
                .filter(|id| online.insert(id.clone()))
                .collect()
        };
        if !added.is_empty() {
            self.inner.listeners.notify(&PresenceChange::Online(added));
        }
    }

    /// Mark an id as offline. No-op if it was not online.
    pub fn remove(&self, id: &str) {
        let removed = self.inner.online.write().remove(id);
        if removed {
            self.inner
                .listeners
                .notify(&PresenceChange::Offline(id.to_string()));
        }
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.inner.online.read().contains(id)
    }

    /// Snapshot of the online ids, sorted for stable display.
    pub fn online(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.online.read().iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.online.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.online.write().clear();
        self.inner.listeners.notify(&PresenceChange::Cleared);
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&PresenceChange) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }
}
