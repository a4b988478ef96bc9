//! Time-gated ticket sale ledger.
//!
//! The sale ledger is the authorization and custody core of the stack: it
//! decides who may buy (via an injected [`access_registry::Whitelist`]
//! lookup), when they may buy (strictly before the configured start time,
//! evaluated against a caller-supplied clock reading), at what price, and it
//! custodies the collected currency until the administrator withdraws it
//! through the injected [`token_ledger::CurrencyLedger`].
//!
//! Each accepted purchase mints one uniquely numbered ticket; ids start at 1
//! and are assigned in strict purchase order, so id order is a true temporal
//! order of sales.

pub mod sale;

mod error;

pub use error::SaleError;
pub use sale::{SaleEvent, SaleSnapshot, TicketId, TicketSale};
