use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    sync::Mutex,
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use walletbook_domain::{Book, MAX_CATEGORY_DEPTH};

use crate::{category_service::CategoryService, CoreError};

/// Fixed keys under which each entity collection is persisted as a JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Categories,
    Transactions,
    Wallets,
    Debts,
    Events,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::Categories,
        StorageKey::Transactions,
        StorageKey::Wallets,
        StorageKey::Debts,
        StorageKey::Events,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Categories => "walletbook.categories",
            StorageKey::Transactions => "walletbook.transactions",
            StorageKey::Wallets => "walletbook.wallets",
            StorageKey::Debts => "walletbook.debts",
            StorageKey::Events => "walletbook.events",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String key/value persistence, the moral equivalent of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
    fn keys(&self) -> Result<Vec<String>, CoreError>;

    /// Snapshots every stored key before a risky mutation. Returns the backup id
    /// when the backend supports backups.
    fn backup(&self, _note: Option<&str>) -> Result<Option<String>, CoreError> {
        Ok(None)
    }
}

/// Volatile store used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, CoreError> {
        self.entries
            .lock()
            .map_err(|_| CoreError::Storage("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Loads every collection; missing keys yield empty collections.
pub fn load_book(store: &dyn KeyValueStore) -> Result<Book, CoreError> {
    let mut book = Book::new();
    book.categories = load_collection(store, StorageKey::Categories)?;
    book.transactions = load_collection(store, StorageKey::Transactions)?;
    book.wallets = load_collection(store, StorageKey::Wallets)?;
    book.debts = load_collection(store, StorageKey::Debts)?;
    book.events = load_collection(store, StorageKey::Events)?;
    for debt in &mut book.debts {
        debt.refresh_status();
    }
    debug!(
        categories = book.categories.len(),
        transactions = book.transactions.len(),
        wallets = book.wallets.len(),
        debts = book.debts.len(),
        events = book.events.len(),
        "book loaded"
    );
    Ok(book)
}

/// Persists the collection behind `key`.
pub fn save_collection(
    store: &dyn KeyValueStore,
    book: &Book,
    key: StorageKey,
) -> Result<(), CoreError> {
    let json = match key {
        StorageKey::Categories => to_json(&book.categories)?,
        StorageKey::Transactions => to_json(&book.transactions)?,
        StorageKey::Wallets => to_json(&book.wallets)?,
        StorageKey::Debts => to_json(&book.debts)?,
        StorageKey::Events => to_json(&book.events)?,
    };
    store.set(key.as_str(), &json)
}

pub fn save_book(store: &dyn KeyValueStore, book: &Book) -> Result<(), CoreError> {
    for key in StorageKey::ALL {
        save_collection(store, book, key)?;
    }
    Ok(())
}

fn load_collection<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: StorageKey,
) -> Result<Vec<T>, CoreError> {
    match store.get(key.as_str())? {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map_err(|err| CoreError::Serde(format!("{}: {}", key, err))),
        _ => Ok(Vec::new()),
    }
}

fn to_json<T: Serialize>(items: &[T]) -> Result<String, CoreError> {
    Ok(serde_json::to_string(items)?)
}

/// Detects dangling references and other anomalies within a book snapshot.
pub fn book_warnings(book: &Book) -> Vec<String> {
    let category_ids: HashSet<_> = book.categories.iter().map(|c| c.id).collect();
    let wallet_ids: HashSet<_> = book.wallets.iter().map(|w| w.id).collect();
    let event_ids: HashSet<_> = book.events.iter().map(|e| e.id).collect();
    let mut warnings = Vec::new();

    for category in &book.categories {
        if let Some(parent) = category.parent_id {
            if !category_ids.contains(&parent) {
                warnings.push(format!(
                    "category {} references missing parent {}",
                    category.id, parent
                ));
            }
        }
        match CategoryService::depth(book, category.id) {
            Some(depth) if depth > MAX_CATEGORY_DEPTH => warnings.push(format!(
                "category {} nested {} levels deep",
                category.id, depth
            )),
            None => warnings.push(format!(
                "category {} has a cyclic parent chain",
                category.id
            )),
            _ => {}
        }
    }

    for txn in &book.transactions {
        if !category_ids.contains(&txn.category_id) {
            warnings.push(format!(
                "transaction {} references missing category {}",
                txn.id, txn.category_id
            ));
        }
        if !wallet_ids.contains(&txn.wallet_id) {
            warnings.push(format!(
                "transaction {} references missing wallet {}",
                txn.id, txn.wallet_id
            ));
        }
        if let Some(event) = txn.event_id {
            if !event_ids.contains(&event) {
                warnings.push(format!(
                    "transaction {} references missing event {}",
                    txn.id, event
                ));
            }
        }
    }

    for wallet in &book.wallets {
        for linked in &wallet.linked_category_ids {
            if !category_ids.contains(linked) {
                warnings.push(format!(
                    "wallet {} links missing category {}",
                    wallet.id, linked
                ));
            }
        }
    }
    warnings
}
