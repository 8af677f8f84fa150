mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::{date, memory_app, rates, record_events, temp_base};
use uuid::Uuid;
use walletbook::{
    AppError, Attachment, Category, CategoryKind, ConfigManager, ConversionMode, CoreError,
    CurrencyCode, Debt, DebtKind, DebtStatus, Event, EventStatus, KeyValueStore, MemoryStore,
    StorageKey, StoreEvent, Transaction, TransactionFilter, Wallet, WalletBook,
};

fn category_id(app: &WalletBook, name: &str) -> Uuid {
    app.book()
        .categories
        .iter()
        .find(|category| category.name == name)
        .map(|category| category.id)
        .expect("category present")
}

fn usd() -> CurrencyCode {
    CurrencyCode::new("USD")
}

#[test]
fn fresh_app_seeds_default_categories() {
    let app = memory_app();
    assert!(!app.book().categories.is_empty());
    assert!(app.load_warnings().is_empty());
    category_id(&app, "Groceries");
}

#[test]
fn data_survives_reopening_from_disk() {
    let base = temp_base();
    let (wallet, txn, groceries) = {
        let mut app = WalletBook::open_at(base.clone()).expect("open");
        let groceries = category_id(&app, "Groceries");
        let wallet = app
            .add_wallet(Wallet::new("Cash", usd()).with_balance(100.0))
            .expect("wallet");
        let mut transaction = Transaction::new(
            date(2024, 5, 2),
            12.5,
            CategoryKind::Expense,
            groceries,
            wallet,
            usd(),
        )
        .with_description("market");
        transaction.attachments.push(Attachment::new("receipt.png", vec![1, 2, 3]));
        let txn = app.add_transaction(transaction).expect("transaction");
        assert_eq!(app.book().transaction(txn).expect("in memory").attachments.len(), 1);
        (wallet, txn, groceries)
    };

    let app = WalletBook::open_at(base).expect("reopen");
    let stored = app.book().transaction(txn).expect("persisted");
    assert_eq!(stored.category_id, groceries);
    assert_eq!(stored.description.as_deref(), Some("market"));
    assert!(stored.attachments.is_empty());
    assert_eq!(app.wallet_balance(wallet).expect("balance"), 87.5);
}

#[test]
fn mutations_notify_each_touched_collection() {
    let mut app = memory_app();
    let events = record_events(&app);

    let wallet = app.add_wallet(Wallet::new("Cash", usd())).expect("wallet");
    let food = category_id(&app, "Food");
    app.link_wallet_categories(wallet, vec![food]).expect("link");
    app.delete_category(food).expect("delete food subtree");

    let seen = events.lock().expect("events").clone();
    assert_eq!(
        seen,
        vec![
            StoreEvent::WalletsChanged,
            StoreEvent::WalletsChanged,
            StoreEvent::CategoriesChanged,
            StoreEvent::WalletsChanged,
        ]
    );
    assert!(app.book().wallet(wallet).expect("wallet").linked_category_ids.is_empty());
}

#[test]
fn rejected_mutation_changes_nothing_and_stays_silent() {
    let mut app = memory_app();
    let wallet = app.add_wallet(Wallet::new("Cash", usd())).expect("wallet");
    let salary = category_id(&app, "Salary");
    let events = record_events(&app);
    let before = app.book().clone();

    let wrong_kind = Transaction::new(
        date(2024, 5, 1),
        50.0,
        CategoryKind::Expense,
        salary,
        wallet,
        usd(),
    );
    let err = app.add_transaction(wrong_kind).unwrap_err();
    assert!(err.is_validation());

    assert_eq!(app.book(), &before);
    assert!(events.lock().expect("events").is_empty());
}

#[test]
fn unsubscribed_listeners_stop_receiving() {
    let mut app = memory_app();
    let events = record_events(&app);
    let id = app.subscribe(|_| {});
    assert!(app.unsubscribe(id));
    assert!(!app.unsubscribe(id));

    app.add_event(Event::new("Birthday")).expect("event");
    assert_eq!(events.lock().expect("events").len(), 1);
}

#[test]
fn travel_mode_tags_and_converts_for_display() {
    let mut app = memory_app();
    let jpy = CurrencyCode::new("JPY");
    let card = app.add_wallet(Wallet::new("Travel card", jpy.clone())).expect("wallet");
    let trip = app.add_event(Event::new("Japan 2024")).expect("event");
    let restaurants = category_id(&app, "Restaurants");

    app.start_travel(jpy.clone(), trip, 0.0067).expect("travel on");
    let txn = app
        .add_transaction(Transaction::new(
            date(2024, 4, 3),
            1500.0,
            CategoryKind::Expense,
            restaurants,
            card,
            jpy,
        ))
        .expect("transaction");

    let stored = app.book().transaction(txn).expect("stored").clone();
    assert_eq!(stored.event_id, Some(trip));
    assert_eq!(app.display_amount(&stored), (10.05, usd()));
    assert_eq!(
        app.transactions(&TransactionFilter::default().event(trip)).len(),
        1
    );

    let events = record_events(&app);
    app.delete_event(trip).expect("delete event");
    assert!(app.travel_mode().is_none());
    assert_eq!(app.book().transaction(txn).expect("kept").event_id, None);
    assert_eq!(
        events.lock().expect("events").clone(),
        vec![
            StoreEvent::EventsChanged,
            StoreEvent::TransactionsChanged,
            StoreEvent::SettingsChanged,
        ]
    );
}

#[test]
fn inactive_event_cannot_start_travel_and_closing_it_ends_travel() {
    let mut app = memory_app();
    let trip = app.add_event(Event::new("Lisbon")).expect("event");
    app.start_travel(CurrencyCode::new("EUR"), trip, 1.1).expect("travel on");

    app.set_event_status(trip, EventStatus::Inactive).expect("close event");
    assert!(app.travel_mode().is_none());
    assert!(app.start_travel(CurrencyCode::new("EUR"), trip, 1.1).is_err());
    assert!(!app.stop_travel().expect("already off"));
}

#[test]
fn converting_home_currency_rewrites_amounts_and_settings() {
    let base = temp_base();
    let mut app = WalletBook::open_at(base.clone())
        .expect("open")
        .with_rate_provider(Box::new(rates()));
    let groceries = category_id(&app, "Groceries");
    let cash = app
        .add_wallet(Wallet::new("Cash", usd()).with_balance(100.0))
        .expect("wallet");
    let yen = app
        .add_wallet(Wallet::new("Yen", CurrencyCode::new("JPY")).with_balance(3000.0))
        .expect("yen wallet");
    let txn = app
        .add_transaction(Transaction::new(
            date(2024, 6, 1),
            10.0,
            CategoryKind::Expense,
            groceries,
            cash,
            usd(),
        ))
        .expect("transaction");
    let debt = app
        .add_debt(Debt::new(DebtKind::Payable, "Sam", 40.0, usd()))
        .expect("debt");
    app.add_debt_payment(debt, date(2024, 6, 2), 40.0).expect("payment");
    let events = record_events(&app);

    let report = app
        .migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Convert)
        .expect("migrate");

    assert_eq!(report.rate, 0.5);
    assert_eq!((report.transactions, report.wallets, report.debts), (1, 1, 1));
    let eur = CurrencyCode::new("EUR");
    assert_eq!(app.config().default_currency, eur);
    assert_eq!(app.book().transaction(txn).expect("txn").amount, 5.0);
    assert_eq!(app.book().wallet(cash).expect("cash").balance, 50.0);
    assert_eq!(app.book().wallet(yen).expect("yen").balance, 3000.0);
    let debt = app.book().debt(debt).expect("debt");
    assert_eq!((debt.amount, debt.status), (20.0, DebtStatus::Paid));
    assert_eq!(app.wallet_balance(cash).expect("balance"), 45.0);
    assert_eq!(
        events.lock().expect("events").clone(),
        vec![
            StoreEvent::TransactionsChanged,
            StoreEvent::WalletsChanged,
            StoreEvent::DebtsChanged,
            StoreEvent::SettingsChanged,
        ]
    );

    let config_manager = ConfigManager::with_base_dir(base.clone()).expect("manager");
    assert_eq!(config_manager.load().expect("config").default_currency, eur);
    assert_eq!(config_manager.list_backups().expect("config backups").len(), 1);
    let collection_backups = std::fs::read_dir(base.join("backups"))
        .expect("backup root")
        .count();
    assert_eq!(collection_backups, 1);
}

#[test]
fn migrating_home_currency_requotes_the_travel_rate() {
    let mut app = memory_app();
    let eur = CurrencyCode::new("EUR");
    let jpy = CurrencyCode::new("JPY");
    let card = app.add_wallet(Wallet::new("Euro card", eur.clone())).expect("wallet");
    let trip = app.add_event(Event::new("Lisbon")).expect("event");
    let restaurants = category_id(&app, "Restaurants");
    app.start_travel(eur.clone(), trip, 1.1).expect("travel on");
    let txn = app
        .add_transaction(Transaction::new(
            date(2024, 5, 2),
            100.0,
            CategoryKind::Expense,
            restaurants,
            card,
            eur.clone(),
        ))
        .expect("transaction");
    let stored = app.book().transaction(txn).expect("stored").clone();
    assert_eq!(app.display_amount(&stored), (110.0, usd()));

    app.migrate_currency(jpy.clone(), ConversionMode::Convert)
        .expect("migrate");

    let mode = app.travel_mode().expect("still travelling");
    assert_eq!(mode.currency, eur);
    assert!((mode.rate - 165.0).abs() < 1e-9);
    let stored = app.book().transaction(txn).expect("stored").clone();
    assert_eq!(stored.currency, eur);
    assert_eq!(app.display_amount(&stored), (16500.0, jpy));
}

#[test]
fn travel_mode_ends_when_its_quote_cannot_carry_over() {
    let mut relabelled = memory_app();
    let trip = relabelled.add_event(Event::new("Rome")).expect("event");
    relabelled
        .start_travel(CurrencyCode::new("EUR"), trip, 1.1)
        .expect("travel on");
    relabelled
        .migrate_currency(CurrencyCode::new("GBP"), ConversionMode::Relabel)
        .expect("relabel");
    assert_eq!(relabelled.config().default_currency, CurrencyCode::new("GBP"));
    assert!(relabelled.travel_mode().is_none());

    let mut moved_into_travel_currency = memory_app();
    let trip = moved_into_travel_currency
        .add_event(Event::new("Paris"))
        .expect("event");
    moved_into_travel_currency
        .start_travel(CurrencyCode::new("EUR"), trip, 1.1)
        .expect("travel on");
    moved_into_travel_currency
        .migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Convert)
        .expect("convert");
    assert!(moved_into_travel_currency.travel_mode().is_none());
}

/// Memory store whose wallet writes fail while `fail_wallets` is set.
struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_wallets: Arc<AtomicBool>,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        if key == StorageKey::Wallets.as_str() && self.fail_wallets.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("disk full".into()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, CoreError> {
        self.inner.keys()
    }
}

#[test]
fn failed_migration_write_rolls_back_collections_and_config() {
    let base = temp_base();
    let inner = Arc::new(MemoryStore::new());
    let fail_wallets = Arc::new(AtomicBool::new(false));
    let store = FlakyStore {
        inner: Arc::clone(&inner),
        fail_wallets: Arc::clone(&fail_wallets),
    };
    let config_manager = ConfigManager::with_base_dir(base.clone()).expect("manager");
    let mut app = WalletBook::open(config_manager, Box::new(store))
        .expect("open")
        .with_rate_provider(Box::new(rates()));
    let groceries = category_id(&app, "Groceries");
    let cash = app
        .add_wallet(Wallet::new("Cash", usd()).with_balance(100.0))
        .expect("wallet");
    let txn = app
        .add_transaction(Transaction::new(
            date(2024, 6, 1),
            10.0,
            CategoryKind::Expense,
            groceries,
            cash,
            usd(),
        ))
        .expect("transaction");
    let events = record_events(&app);

    fail_wallets.store(true, Ordering::SeqCst);
    let err = app
        .migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Convert)
        .expect_err("wallet write fails");
    assert!(matches!(err, AppError::Core(CoreError::Storage(_))));

    assert_eq!(app.config().default_currency, usd());
    assert_eq!(app.book().transaction(txn).expect("txn").amount, 10.0);
    assert!(events.lock().expect("events").is_empty());
    let reloaded = ConfigManager::with_base_dir(base.clone())
        .expect("manager")
        .load()
        .expect("config");
    assert_eq!(reloaded.default_currency, usd());
    let persisted = inner
        .get(StorageKey::Transactions.as_str())
        .expect("get")
        .expect("transactions stored");
    assert!(persisted.contains("USD"));
    assert!(!persisted.contains("EUR"));

    fail_wallets.store(false, Ordering::SeqCst);
    app.migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Convert)
        .expect("migrate once the store recovers");
    assert_eq!(app.config().default_currency, CurrencyCode::new("EUR"));
    assert_eq!(app.book().transaction(txn).expect("txn").amount, 5.0);
}

#[test]
fn convert_without_api_key_fails_before_touching_anything() {
    let config_manager = ConfigManager::with_base_dir(temp_base()).expect("manager");
    let mut app = WalletBook::open(config_manager, Box::new(MemoryStore::new())).expect("open");
    let cash = app
        .add_wallet(Wallet::new("Cash", usd()).with_balance(10.0))
        .expect("wallet");
    let before = app.book().clone();

    let err = app
        .migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Convert)
        .unwrap_err();
    assert!(matches!(err, AppError::Fx(_)));
    assert_eq!(app.book(), &before);
    assert_eq!(app.config().default_currency, usd());

    let report = app
        .migrate_currency(CurrencyCode::new("EUR"), ConversionMode::Relabel)
        .expect("relabel needs no rates");
    assert_eq!(report.rate, 1.0);
    let wallet = app.book().wallet(cash).expect("wallet");
    assert_eq!((wallet.balance, wallet.currency.as_str()), (10.0, "EUR"));
}

#[test]
fn category_tree_edits_persist() {
    let mut app = memory_app();
    let food = category_id(&app, "Food");
    let housing = category_id(&app, "Housing");
    let snacks = app
        .add_category(Category::new("Snacks", CategoryKind::Expense).with_parent(food))
        .expect("snacks");
    app.move_category(snacks, Some(housing)).expect("move");
    app.rename_category(snacks, "Late snacks").expect("rename");

    let moved = app.book().category(snacks).expect("category");
    assert_eq!(moved.parent_id, Some(housing));
    assert_eq!(moved.name, "Late snacks");
    assert!(app.move_category(housing, Some(snacks)).is_err());
}

#[test]
fn debts_track_payments_through_the_app() {
    let mut app = memory_app();
    let debt = app
        .add_debt(Debt::new(DebtKind::Receivable, "Alex", 30.0, usd()))
        .expect("debt");
    let payment = app.add_debt_payment(debt, date(2024, 1, 5), 10.0).expect("pay");
    assert_eq!(app.book().debt(debt).expect("debt").status, DebtStatus::Partial);
    assert!(app.add_debt_payment(debt, date(2024, 1, 6), 25.0).is_err());
    assert_eq!(app.outstanding_debts(DebtKind::Receivable).get(&usd()), Some(&20.0));

    app.remove_debt_payment(debt, payment).expect("remove");
    assert_eq!(app.book().debt(debt).expect("debt").status, DebtStatus::Unpaid);
    assert!(app.update_debt_terms(debt, 25.0, Some(date(2024, 2, 1)), None).is_ok());
    app.delete_debt(debt).expect("delete");
    assert!(app.book().debts.is_empty());
}

#[test]
fn month_summary_skips_excluded_transactions() {
    let mut app = memory_app();
    let cash = app.add_wallet(Wallet::new("Cash", usd())).expect("wallet");
    let salary = category_id(&app, "Salary");
    let groceries = category_id(&app, "Groceries");
    app.add_transaction(Transaction::new(
        date(2024, 7, 1),
        1000.0,
        CategoryKind::Income,
        salary,
        cash,
        usd(),
    ))
    .expect("income");
    app.add_transaction(Transaction::new(
        date(2024, 7, 9),
        80.0,
        CategoryKind::Expense,
        groceries,
        cash,
        usd(),
    ))
    .expect("expense");
    app.add_transaction(
        Transaction::new(
            date(2024, 7, 10),
            500.0,
            CategoryKind::Expense,
            groceries,
            cash,
            usd(),
        )
        .excluded_from_report(),
    )
    .expect("excluded");

    let summary = app.month_summary(date(2024, 7, 20));
    let totals = summary.totals.get(&usd()).expect("usd totals");
    assert_eq!((totals.income, totals.expense, totals.net()), (1000.0, 80.0, 920.0));
    assert_eq!((summary.transaction_count, summary.excluded_count), (2, 1));
    assert_eq!(app.wallet_balance(cash).expect("balance"), 420.0);
}
