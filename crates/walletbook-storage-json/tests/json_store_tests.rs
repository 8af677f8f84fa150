use std::fs;

use tempfile::tempdir;
use walletbook_core::{
    storage::{load_book, save_book, KeyValueStore, StorageKey},
    CategoryService, WalletService,
};
use walletbook_domain::{Book, Category, CategoryKind, CurrencyCode, Wallet};
use walletbook_storage_json::{JsonFileStore, StoragePaths};

fn sample_book() -> Book {
    let mut book = Book::new();
    CategoryService::seed_defaults(&mut book);
    let bills = CategoryService::add(&mut book, Category::new("Bills", CategoryKind::Expense))
        .expect("add bills");
    CategoryService::add(
        &mut book,
        Category::new("Electricity", CategoryKind::Expense).with_parent(bills),
    )
    .expect("add child");
    WalletService::add(
        &mut book,
        Wallet::new("Checking", CurrencyCode::new("EUR")).with_balance(250.0),
    )
    .expect("add wallet");
    book
}

#[test]
fn json_store_writes_one_file_per_key() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");

    store.set("walletbook.wallets", "[]").expect("set");
    assert_eq!(
        store.get("walletbook.wallets").expect("get").as_deref(),
        Some("[]")
    );
    assert!(store.key_path("walletbook.wallets").exists());
    assert_eq!(store.get("walletbook.missing").expect("get"), None);
    assert_eq!(store.keys().expect("keys"), vec!["walletbook.wallets".to_string()]);

    store.remove("walletbook.wallets").expect("remove");
    assert!(store.keys().expect("keys").is_empty());
    store.remove("walletbook.wallets").expect("removing twice is fine");
}

#[test]
fn json_store_leaves_no_tmp_files_behind() {
    let dir = tempdir().expect("tempdir");
    let paths = StoragePaths::under(dir.path());
    let store = JsonFileStore::new(paths.clone()).expect("create store");
    store.set("walletbook.events", "[]").expect("first write");
    store.set("walletbook.events", "[1]").expect("overwrite");

    let leftovers: Vec<_> = fs::read_dir(&paths.data_root)
        .expect("read dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    assert_eq!(store.get("walletbook.events").expect("get").as_deref(), Some("[1]"));
}

#[test]
fn book_survives_a_round_trip_through_disk() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");
    let book = sample_book();

    save_book(&store, &book).expect("save");
    for key in StorageKey::ALL {
        assert!(store.key_path(key.as_str()).exists(), "{} missing", key);
    }

    let reopened = JsonFileStore::new(StoragePaths::under(dir.path())).expect("reopen");
    let loaded = load_book(&reopened).expect("load");
    assert_eq!(loaded, book);
}

#[test]
fn corrupt_collection_surfaces_as_serde_error() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");
    store
        .set(StorageKey::Categories.as_str(), "{not json")
        .expect("set");

    let err = load_book(&store).unwrap_err();
    assert!(err.to_string().contains("walletbook.categories"));
}

#[test]
fn backups_snapshot_and_restore_every_key() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");
    let book = sample_book();
    save_book(&store, &book).expect("save");

    let id = store
        .backup(Some("before migration"))
        .expect("backup")
        .expect("json store supports backups");
    assert!(id.ends_with("_before-migration"));

    save_book(&store, &Book::new()).expect("overwrite with empty book");
    assert!(load_book(&store).expect("load").categories.is_empty());

    let backups = store.list_backups().expect("list");
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].file_count, StorageKey::ALL.len());
    assert!(backups[0].created_at.is_some());

    store.restore_backup(&id).expect("restore");
    assert_eq!(load_book(&store).expect("load"), book);
}

#[test]
fn backups_are_pruned_to_retention() {
    let dir = tempdir().expect("tempdir");
    let store =
        JsonFileStore::with_retention(StoragePaths::under(dir.path()), 2).expect("create store");
    store.set("walletbook.debts", "[]").expect("set");

    let mut ids = Vec::new();
    for note in ["one", "two", "three"] {
        ids.push(store.backup(Some(note)).expect("backup").expect("id"));
    }

    let remaining: Vec<String> = store
        .list_backups()
        .expect("list")
        .into_iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&ids[2]));
}

#[test]
fn restoring_unknown_backup_fails() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");
    assert!(store.restore_backup("20200101_000000").is_err());
}

#[test]
fn backups_can_be_deleted_by_id() {
    let dir = tempdir().expect("tempdir");
    let store = JsonFileStore::new(StoragePaths::under(dir.path())).expect("create store");
    store.set("walletbook.debts", "[]").expect("set");

    let first = store.backup(Some("same")).expect("backup").expect("id");
    let second = store.backup(Some("same")).expect("backup").expect("id");
    assert_ne!(first, second);

    store.delete_backup(&first).expect("delete");
    let remaining: Vec<String> = store
        .list_backups()
        .expect("list")
        .into_iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(remaining, vec![second]);

    store.delete_backup(&first).expect("deleting twice is a no-op");
    assert!(store.delete_backup("../data").is_err());
    assert!(store.get("walletbook.debts").expect("get").is_some());
}
