use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walletbook_config::{Config, ConfigManager};
use walletbook_core::{
    storage::{book_warnings, load_book, save_collection, KeyValueStore, StorageKey},
    CategoryService, ChangeNotifier, ConversionMode, ConversionReport, CoreError, CurrencyService,
    DebtService, EventService, PeriodSummary, RateProvider, ReportService, StaticRateProvider,
    StoreEvent, SubscriptionId, TransactionFilter, TransactionService, TravelService,
    WalletService,
};
use walletbook_domain::{
    Book, Category, CurrencyCode, DateWindow, Debt, DebtKind, Event, EventStatus, Transaction,
    TravelMode, Wallet,
};
use walletbook_fx::HttpRateProvider;
use walletbook_storage_json::{JsonFileStore, StoragePaths};

use crate::AppError;

/// Application context: owns the book and writes every change through to
/// the store before telling subscribers about it.
pub struct WalletBook {
    book: Book,
    store: Box<dyn KeyValueStore>,
    notifier: ChangeNotifier,
    config: Config,
    config_manager: ConfigManager,
    rates: Option<Box<dyn RateProvider>>,
    warnings: Vec<String>,
}

impl WalletBook {
    pub fn open(
        config_manager: ConfigManager,
        store: Box<dyn KeyValueStore>,
    ) -> Result<Self, AppError> {
        let mut config = config_manager.load()?;
        let mut book = load_book(store.as_ref())?;
        let warnings = book_warnings(&book);
        for warning in &warnings {
            warn!(%warning, "book anomaly");
        }
        if CategoryService::seed_defaults(&mut book) > 0 {
            save_collection(store.as_ref(), &book, StorageKey::Categories)?;
        }
        let stale = config
            .travel_mode
            .as_ref()
            .is_some_and(|mode| TravelService::is_stale(&book, mode));
        if stale {
            info!("travel mode cleared, its event is gone or inactive");
            config.travel_mode = None;
            config_manager.save(&config)?;
        }
        Ok(Self {
            book,
            store,
            notifier: ChangeNotifier::new(),
            config,
            config_manager,
            rates: None,
            warnings,
        })
    }

    /// Config under `<base>/config`, collections under `data_dir` or `base`.
    pub fn open_at(base: PathBuf) -> Result<Self, AppError> {
        let config_manager = ConfigManager::with_base_dir(base.clone())?;
        let data_root = config_manager.load()?.data_dir.unwrap_or(base);
        let store = JsonFileStore::new(StoragePaths::under(&data_root))?;
        debug!(path = %data_root.display(), "opening json store");
        Self::open(config_manager, Box::new(store))
    }

    pub fn open_default() -> Result<Self, AppError> {
        Self::open_at(Config::default().resolve_data_dir())
    }

    /// Replaces the HTTP provider otherwise built from config on demand.
    pub fn with_rate_provider(mut self, provider: Box<dyn RateProvider>) -> Self {
        self.rates = Some(provider);
        self
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(StoreEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Re-reads every collection from the store.
    pub fn reload(&mut self) -> Result<(), AppError> {
        self.book = load_book(self.store.as_ref())?;
        self.warnings = book_warnings(&self.book);
        for key in StorageKey::ALL {
            self.notifier.emit(StoreEvent::for_key(key));
        }
        Ok(())
    }

    pub fn backup(&self, note: Option<&str>) -> Result<Option<String>, AppError> {
        Ok(self.store.backup(note)?)
    }

    // Categories

    pub fn add_category(&mut self, category: Category) -> Result<Uuid, AppError> {
        self.mutate(&[StorageKey::Categories], |book| {
            CategoryService::add(book, category)
        })
    }

    pub fn rename_category(&mut self, id: Uuid, name: &str) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Categories], |book| {
            CategoryService::rename(book, id, name)
        })
    }

    pub fn set_category_icon(&mut self, id: Uuid, icon: Option<String>) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Categories], |book| {
            CategoryService::set_icon(book, id, icon)
        })
    }

    pub fn move_category(&mut self, id: Uuid, new_parent: Option<Uuid>) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Categories], |book| {
            CategoryService::move_to(book, id, new_parent)
        })
    }

    /// Removes the category with its subtree; returns every removed id.
    pub fn delete_category(&mut self, id: Uuid) -> Result<Vec<Uuid>, AppError> {
        self.mutate(&[StorageKey::Categories, StorageKey::Wallets], |book| {
            CategoryService::delete(book, id)
        })
    }

    // Transactions

    /// Adds a transaction, tagging it with the travel event while travelling.
    pub fn add_transaction(&mut self, mut transaction: Transaction) -> Result<Uuid, AppError> {
        if TravelService::tag(self.config.travel_mode.as_ref(), &mut transaction) {
            debug!(id = %transaction.id, "transaction tagged with travel event");
        }
        self.mutate(&[StorageKey::Transactions], |book| {
            TransactionService::add(book, transaction)
        })
    }

    pub fn update_transaction<F>(&mut self, id: Uuid, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Transaction),
    {
        self.mutate(&[StorageKey::Transactions], |book| {
            TransactionService::update(book, id, change)
        })
    }

    pub fn delete_transaction(&mut self, id: Uuid) -> Result<Transaction, AppError> {
        self.mutate(&[StorageKey::Transactions], |book| {
            TransactionService::delete(book, id)
        })
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> Vec<&Transaction> {
        TransactionService::query(&self.book, filter)
    }

    // Wallets

    pub fn add_wallet(&mut self, wallet: Wallet) -> Result<Uuid, AppError> {
        self.mutate(&[StorageKey::Wallets], |book| WalletService::add(book, wallet))
    }

    pub fn rename_wallet(&mut self, id: Uuid, name: &str) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Wallets], |book| {
            WalletService::rename(book, id, name)
        })
    }

    pub fn set_wallet_balance(&mut self, id: Uuid, balance: f64) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Wallets], |book| {
            WalletService::set_base_balance(book, id, balance)
        })
    }

    pub fn set_wallet_currency(&mut self, id: Uuid, currency: CurrencyCode) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Wallets], |book| {
            WalletService::set_currency(book, id, currency)
        })
    }

    pub fn delete_wallet(&mut self, id: Uuid) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Wallets], |book| WalletService::delete(book, id))
    }

    pub fn link_wallet_categories(
        &mut self,
        id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Wallets], |book| {
            WalletService::link_categories(book, id, category_ids)
        })
    }

    pub fn wallet_balance(&self, id: Uuid) -> Result<f64, AppError> {
        Ok(WalletService::balance(&self.book, id)?)
    }

    // Debts

    pub fn add_debt(&mut self, debt: Debt) -> Result<Uuid, AppError> {
        self.mutate(&[StorageKey::Debts], |book| DebtService::add(book, debt))
    }

    pub fn update_debt_terms(
        &mut self,
        id: Uuid,
        amount: f64,
        due_date: Option<NaiveDate>,
        note: Option<String>,
    ) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Debts], |book| {
            DebtService::update_terms(book, id, amount, due_date, note)
        })
    }

    pub fn delete_debt(&mut self, id: Uuid) -> Result<Debt, AppError> {
        self.mutate(&[StorageKey::Debts], |book| DebtService::delete(book, id))
    }

    pub fn add_debt_payment(
        &mut self,
        id: Uuid,
        date: NaiveDate,
        amount: f64,
    ) -> Result<Uuid, AppError> {
        self.mutate(&[StorageKey::Debts], |book| {
            DebtService::add_payment(book, id, date, amount)
        })
    }

    pub fn remove_debt_payment(&mut self, id: Uuid, payment_id: Uuid) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Debts], |book| {
            DebtService::remove_payment(book, id, payment_id)
        })
    }

    pub fn outstanding_debts(&self, kind: DebtKind) -> std::collections::BTreeMap<CurrencyCode, f64> {
        DebtService::outstanding(&self.book, kind)
    }

    // Events

    pub fn add_event(&mut self, event: Event) -> Result<Uuid, AppError> {
        self.mutate(&[StorageKey::Events], |book| EventService::add(book, event))
    }

    pub fn rename_event(&mut self, id: Uuid, name: &str) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Events], |book| {
            EventService::rename(book, id, name)
        })
    }

    pub fn set_event_icon(&mut self, id: Uuid, icon: Option<String>) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Events], |book| {
            EventService::set_icon(book, id, icon)
        })
    }

    pub fn set_event_status(&mut self, id: Uuid, status: EventStatus) -> Result<(), AppError> {
        self.mutate(&[StorageKey::Events], |book| {
            EventService::set_status(book, id, status)
        })?;
        self.drop_stale_travel()
    }

    /// Deletes the event and untags its transactions; returns how many were untagged.
    pub fn delete_event(&mut self, id: Uuid) -> Result<usize, AppError> {
        let detached = self.mutate(&[StorageKey::Events, StorageKey::Transactions], |book| {
            EventService::delete(book, id)
        })?;
        self.drop_stale_travel()?;
        Ok(detached)
    }

    // Reports

    pub fn summary(&self, window: DateWindow) -> PeriodSummary {
        ReportService::summarize(&self.book, window)
    }

    pub fn month_summary(&self, reference: NaiveDate) -> PeriodSummary {
        ReportService::summarize_month_of(&self.book, reference)
    }

    // Settings, travel and currency

    /// Applies `change` to a copy of the config, saves it, then swaps it in.
    pub fn update_settings<F>(&mut self, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Config),
    {
        let mut staged = self.config.clone();
        change(&mut staged);
        self.config_manager.save(&staged)?;
        self.config = staged;
        self.notifier.emit(StoreEvent::SettingsChanged);
        Ok(())
    }

    pub fn travel_mode(&self) -> Option<&TravelMode> {
        self.config.travel_mode.as_ref()
    }

    pub fn start_travel(
        &mut self,
        currency: CurrencyCode,
        event_id: Uuid,
        rate: f64,
    ) -> Result<TravelMode, AppError> {
        let mode = TravelService::activate(&self.book, currency, event_id, rate)?;
        let active = mode.clone();
        self.update_settings(move |config| config.travel_mode = Some(active))?;
        Ok(mode)
    }

    /// Returns false when travel mode was already off.
    pub fn stop_travel(&mut self) -> Result<bool, AppError> {
        if self.config.travel_mode.is_none() {
            return Ok(false);
        }
        self.update_settings(|config| config.travel_mode = None)?;
        info!("travel mode deactivated");
        Ok(true)
    }

    /// Amount and currency to show for `transaction`, converted home while travelling.
    pub fn display_amount(&self, transaction: &Transaction) -> (f64, CurrencyCode) {
        TravelService::display_amount(
            self.config.travel_mode.as_ref(),
            &self.config.default_currency,
            transaction,
        )
    }

    /// Moves everything held in the home currency to `to` and makes `to` the new home.
    pub fn migrate_currency(
        &mut self,
        to: CurrencyCode,
        mode: ConversionMode,
    ) -> Result<ConversionReport, AppError> {
        let from = self.config.default_currency.clone();
        self.migrate_between(from, to, mode)
    }

    /// Like [`migrate_currency`](Self::migrate_currency) for an arbitrary source
    /// currency. The home currency follows only when it was the source, and an
    /// active travel rate is re-quoted against the new home or switched off.
    ///
    /// The store and config are snapshotted first. The new config is saved
    /// before the collections; if a collection write fails, the previous
    /// collections and config are written back and memory stays untouched.
    pub fn migrate_between(
        &mut self,
        from: CurrencyCode,
        to: CurrencyCode,
        mode: ConversionMode,
    ) -> Result<ConversionReport, AppError> {
        let http;
        let offline = StaticRateProvider::new();
        let provider: &dyn RateProvider = match (self.rates.as_deref(), mode) {
            (Some(provider), _) => provider,
            (None, ConversionMode::Convert) => {
                http = HttpRateProvider::from_config(&self.config)?;
                &http
            }
            (None, ConversionMode::Relabel) => &offline,
        };

        let mut staged = self.book.clone();
        let report = CurrencyService::migrate(&mut staged, provider, &from, &to, mode)?;

        let note = format!("before {} to {}", from, to);
        if let Some(id) = self.store.backup(Some(&note))? {
            info!(backup = %id, "collections backed up before currency migration");
        }
        self.config_manager.backup(&self.config, Some(&note))?;

        let home_moves = self.config.default_currency == from;
        let mut next_config = self.config.clone();
        if home_moves {
            next_config.default_currency = to.clone();
            next_config.travel_mode = rebase_travel(next_config.travel_mode.take(), &report);
            self.config_manager.save(&next_config)?;
        }

        let keys = [
            StorageKey::Transactions,
            StorageKey::Wallets,
            StorageKey::Debts,
        ];
        for key in keys {
            if let Err(err) = save_collection(self.store.as_ref(), &staged, key) {
                warn!(%key, error = %err, "currency migration not persisted, rolling back");
                self.restore_persisted(&keys, home_moves);
                return Err(err.into());
            }
        }
        self.book = staged;
        for key in keys {
            self.notifier.emit(StoreEvent::for_key(key));
        }
        if home_moves {
            self.config = next_config;
            self.notifier.emit(StoreEvent::SettingsChanged);
        }
        Ok(report)
    }

    /// Writes the in-memory collections and, when asked, the config back to disk.
    fn restore_persisted(&self, keys: &[StorageKey], config: bool) {
        for key in keys {
            if let Err(err) = save_collection(self.store.as_ref(), &self.book, *key) {
                warn!(%key, error = %err, "rollback write failed");
            }
        }
        if config {
            if let Err(err) = self.config_manager.save(&self.config) {
                warn!(error = %err, "config rollback failed");
            }
        }
    }

    fn drop_stale_travel(&mut self) -> Result<(), AppError> {
        let stale = self
            .config
            .travel_mode
            .as_ref()
            .is_some_and(|mode| TravelService::is_stale(&self.book, mode));
        if stale {
            info!("travel mode ended with its event");
            self.update_settings(|config| config.travel_mode = None)?;
        }
        Ok(())
    }

    /// Runs `change` on a staged copy, persists `keys` from it, then commits
    /// and notifies. Nothing changes in memory unless every write succeeded.
    fn mutate<T, F>(&mut self, keys: &[StorageKey], change: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Book) -> Result<T, CoreError>,
    {
        let mut staged = self.book.clone();
        let value = change(&mut staged)?;
        for key in keys {
            save_collection(self.store.as_ref(), &staged, *key)?;
        }
        self.book = staged;
        for key in keys {
            self.notifier.emit(StoreEvent::for_key(*key));
        }
        Ok(value)
    }
}

/// Re-quotes a travel rate after the home currency moved. Relabelling, or a
/// travel currency that took part in the migration, ends travel instead.
fn rebase_travel(mode: Option<TravelMode>, report: &ConversionReport) -> Option<TravelMode> {
    let mut mode = mode?;
    if report.mode == ConversionMode::Relabel
        || mode.currency == report.from
        || mode.currency == report.to
    {
        info!(travel = %mode.currency, home = %report.to, "travel mode cleared by currency migration");
        return None;
    }
    mode.rate *= report.rate;
    Some(mode)
}
