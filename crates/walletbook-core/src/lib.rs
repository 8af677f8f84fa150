//! walletbook-core
//!
//! Business rules and services for walletbook.
//! Depends on walletbook-domain. No terminal I/O, no filesystem, no network;
//! persistence and rate lookups go through the `KeyValueStore` and
//! `RateProvider` seams.

pub mod category_service;
pub mod currency_service;
pub mod debt_service;
pub mod error;
pub mod event_service;
pub mod exchange;
pub mod notify;
pub mod report_service;
pub mod storage;
pub mod transaction_service;
pub mod travel_service;
pub mod wallet_service;

pub use category_service::*;
pub use currency_service::*;
pub use debt_service::*;
pub use error::CoreError;
pub use event_service::*;
pub use exchange::*;
pub use notify::*;
pub use report_service::*;
pub use storage::*;
pub use transaction_service::*;
pub use travel_service::*;
pub use wallet_service::*;
