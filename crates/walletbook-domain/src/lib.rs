//! walletbook-domain
//!
//! Pure domain models (Category, Transaction, Wallet, Debt, Event, Book, TravelMode).
//! No I/O, no storage, no network. Only data types and core enums.

pub mod book;
pub mod category;
pub mod common;
pub mod debt;
pub mod event;
pub mod transaction;
pub mod travel;
pub mod wallet;

pub use book::*;
pub use category::*;
pub use common::*;
pub use debt::*;
pub use event::*;
pub use transaction::*;
pub use travel::*;
pub use wallet::*;
