use thiserror::Error;

use access_registry::AccountId;
use token_ledger::Amount;

use crate::sale::TicketId;

/// Canonical error type surfaced by the sale ledger operations.
#[derive(Debug, Error)]
pub enum SaleError {
    /// Caller of an administrator-restricted operation is not the
    /// administrator.
    #[error("caller {caller} is not the sale administrator")]
    Unauthorized { caller: AccountId },

    /// Purchase attempted at or after the configured start time.
    #[error("sale closed: the event has already started")]
    SaleClosed,

    /// Buyer failed the purchase eligibility checks. A missing allowlist
    /// entry, a short balance, and a short allowance all surface as this one
    /// kind; callers cannot tell the causes apart without querying the
    /// registry and the settlement ledger themselves.
    #[error("insufficient funds to buy a ticket for {buyer}")]
    InsufficientFunds { buyer: AccountId },

    /// Withdrawal larger than the currently custodied balance.
    #[error("custody balance {available} is below the requested {requested}")]
    InsufficientCustodyBalance { requested: Amount, available: Amount },

    /// Query for a ticket id that was never minted.
    #[error("unknown ticket {ticket_id}")]
    UnknownTicket { ticket_id: TicketId },
}
