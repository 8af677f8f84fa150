//! Change broadcast so independent components can refresh after a mutation.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::storage::StorageKey;

/// Collection-level change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreEvent {
    CategoriesChanged,
    TransactionsChanged,
    WalletsChanged,
    DebtsChanged,
    EventsChanged,
    SettingsChanged,
}

impl StoreEvent {
    pub fn for_key(key: StorageKey) -> Self {
        match key {
            StorageKey::Categories => StoreEvent::CategoriesChanged,
            StorageKey::Transactions => StoreEvent::TransactionsChanged,
            StorageKey::Wallets => StoreEvent::WalletsChanged,
            StorageKey::Debts => StoreEvent::DebtsChanged,
            StorageKey::Events => StoreEvent::EventsChanged,
        }
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StoreEvent::CategoriesChanged => "categories-changed",
            StoreEvent::TransactionsChanged => "transactions-changed",
            StoreEvent::WalletsChanged => "wallets-changed",
            StoreEvent::DebtsChanged => "debts-changed",
            StoreEvent::EventsChanged => "events-changed",
            StoreEvent::SettingsChanged => "settings-changed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(StoreEvent) + Send + Sync>;

/// Registry of listeners invoked synchronously for every emitted event.
#[derive(Default, Clone)]
pub struct ChangeNotifier {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(StoreEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = registry.listeners.len();
        registry.listeners.retain(|(existing, _)| *existing != id);
        registry.listeners.len() != before
    }

    pub fn emit(&self, event: StoreEvent) {
        // Listeners run outside the lock so they may subscribe or emit themselves.
        let listeners: Vec<Listener> = {
            let registry = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        tracing::trace!(%event, listeners = listeners.len(), "emitting change");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .map(|registry| registry.listeners.len())
            .unwrap_or(0)
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
