//! walletbook-config
//!
//! Persisted user settings: locale, home currency, exchange API access,
//! data location and the travel mode flag.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::Config;
