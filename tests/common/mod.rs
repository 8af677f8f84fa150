#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use tempfile::TempDir;
use walletbook::{ConfigManager, MemoryStore, StaticRateProvider, StoreEvent, WalletBook};

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A unique base directory per test.
pub fn temp_base() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    base
}

/// Memory-backed app with config in a temp dir and a fixed rate table.
pub fn memory_app() -> WalletBook {
    let config_manager =
        ConfigManager::with_base_dir(temp_base()).expect("create config manager for temp dir");
    WalletBook::open(config_manager, Box::new(MemoryStore::new()))
        .expect("open app")
        .with_rate_provider(Box::new(rates()))
}

pub fn rates() -> StaticRateProvider {
    StaticRateProvider::new()
        .with_rate("USD", "EUR", 0.5)
        .with_rate("USD", "JPY", 150.0)
}

/// Collects every event the app broadcasts.
pub fn record_events(app: &WalletBook) -> Arc<Mutex<Vec<StoreEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    app.subscribe(move |event| sink.lock().expect("lock events").push(event));
    seen
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
