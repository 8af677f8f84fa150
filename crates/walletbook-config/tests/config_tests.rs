use std::fs;

use tempfile::tempdir;
use uuid::Uuid;
use walletbook_config::{Config, ConfigError, ConfigManager};
use walletbook_domain::{CurrencyCode, TravelMode};

#[test]
fn default_config_has_usable_fields() {
    let cfg = Config::default();

    assert!(cfg.default_currency.is_valid());
    assert!(!cfg.locale.is_empty());
    assert!(cfg.exchange_api_key.is_none());
    assert!(!cfg.is_travelling());
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    assert_eq!(manager.load().expect("load"), Config::default());
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));

    let cfg = Config {
        locale: "pt-BR".into(),
        default_currency: CurrencyCode::new("brl"),
        exchange_api_key: Some("secret".into()),
        travel_mode: Some(TravelMode::new(CurrencyCode::new("JPY"), Uuid::new_v4(), 0.0067)),
        ..Config::default()
    };

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded, cfg);
    assert_eq!(loaded.default_currency.as_str(), "BRL");
}

#[test]
fn invalid_config_is_not_saved() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let cfg = Config {
        default_currency: CurrencyCode::new("EURO"),
        ..Config::default()
    };

    let err = manager.save(&cfg).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(!manager.config_path().exists());
}

#[test]
fn corrupt_file_reports_serde_error() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    fs::write(manager.config_path(), "{ nope").expect("write");

    assert!(matches!(manager.load(), Err(ConfigError::Serde(_))));
}

#[test]
fn config_backups_can_be_listed_and_restored() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let original = Config {
        locale: "de-DE".into(),
        default_currency: CurrencyCode::new("EUR"),
        ..Config::default()
    };
    manager.save(&original).expect("save");
    let name = manager
        .backup(&original, Some("Before currency switch"))
        .expect("backup");
    assert!(name.starts_with("config_"));
    assert!(name.ends_with("_before-currency-switch.json"));

    manager.save(&Config::default()).expect("overwrite");
    assert_eq!(manager.list_backups().expect("list"), vec![name.clone()]);

    let restored = manager.restore(&name).expect("restore");
    assert_eq!(restored, original);
    assert_eq!(manager.load().expect("reload"), original);

    assert!(matches!(
        manager.restore("config_19990101_000000.json"),
        Err(ConfigError::BackupNotFound(_))
    ));
}

#[test]
fn backups_taken_in_quick_succession_do_not_overwrite_each_other() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let locales = ["en-US", "fr-FR", "ja-JP"];
    let mut names = Vec::new();
    for locale in locales {
        let config = Config {
            locale: locale.into(),
            ..Config::default()
        };
        names.push(manager.backup(&config, Some("same note")).expect("backup"));
    }

    let mut listed = manager.list_backups().expect("list");
    assert_eq!(listed.len(), locales.len());
    listed.sort();
    let mut expected = names.clone();
    expected.sort();
    assert_eq!(listed, expected);
    if names[0][..22] == names[1][..22] {
        assert!(names[1].ends_with("_same-note-2.json"));
    }

    for (name, locale) in names.iter().zip(locales) {
        assert_eq!(manager.restore(name).expect("restore").locale, locale);
    }
}
