//! walletbook tracks income and expenses across wallets, categories, debts
//! and events. This crate wires the service crates into one app context,
//! [`WalletBook`], that persists and broadcasts every change.

pub mod app;
pub mod error;
pub mod utils;

use std::sync::Once;

pub use app::WalletBook;
pub use error::AppError;
pub use walletbook_config::{Config, ConfigError, ConfigManager};
pub use walletbook_core::{
    storage::{KeyValueStore, MemoryStore, StorageKey},
    CategoryService, CategoryTotal, ConversionMode, ConversionReport, CoreError, CurrencyService,
    DebtService, EventService, MonthlyBucket, PeriodSummary, RateProvider, ReportService,
    StaticRateProvider, StoreEvent, SubscriptionId, Totals, TransactionFilter,
    TransactionService, TravelService, WalletService,
};
pub use walletbook_domain::*;
pub use walletbook_fx::HttpRateProvider;
pub use walletbook_storage_json::{JsonFileStore, StoragePaths};

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("walletbook tracing initialized");
    });
}
