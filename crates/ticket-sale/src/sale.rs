use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use access_registry::{AccountId, Whitelist};
use token_ledger::{Amount, CurrencyLedger};

use crate::error::SaleError;

pub type TicketId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleEvent {
    TicketPurchased {
        ticket_id: TicketId,
        buyer: AccountId,
        price: Amount,
    },
    PriceUpdated {
        price: Amount,
    },
    FundsWithdrawn {
        to: AccountId,
        amount: Amount,
    },
}

/// Serializable view of the sale state for persistence or inspection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaleSnapshot {
    pub name: String,
    pub symbol: String,
    pub administrator: AccountId,
    pub custody_account: AccountId,
    pub ticket_price: Amount,
    pub start_time: u64,
    pub next_ticket_id: TicketId,
    pub tickets: BTreeMap<TicketId, AccountId>,
    pub events: Vec<SaleEvent>,
}

/// Access-controlled, time-gated ticket sale.
///
/// The sale owns no collaborator: the allowlist registry and the settlement
/// ledger are borrowed per operation, so any [`Whitelist`] or
/// [`CurrencyLedger`] implementation can stand in. Time is likewise injected
/// as a plain Unix-seconds reading; the sale never consults a live clock.
pub struct TicketSale {
    name: String,
    symbol: String,
    administrator: AccountId,
    custody_account: AccountId,
    ticket_price: Amount,
    start_time: u64,
    next_ticket_id: TicketId,
    tickets: BTreeMap<TicketId, AccountId>,
    events: Vec<SaleEvent>,
}

impl TicketSale {
    /// Configure a sale. `start_time` is taken as given: a value already in
    /// the past yields a sale that is closed from the moment of
    /// construction.
    pub fn new(
        name: String,
        symbol: String,
        administrator: AccountId,
        custody_account: AccountId,
        initial_price: Amount,
        start_time: u64,
    ) -> Self {
        Self {
            name,
            symbol,
            administrator,
            custody_account,
            ticket_price: initial_price,
            start_time,
            next_ticket_id: 1,
            tickets: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    /// The sale's own identity inside the settlement ledger. Collected funds
    /// accumulate under this account, and buyers must authorize it as
    /// allowance spender before purchasing.
    pub fn custody_account(&self) -> &AccountId {
        &self.custody_account
    }

    pub fn ticket_price(&self) -> Amount {
        self.ticket_price
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    /// Whether purchases are still accepted at `now` (Unix seconds).
    pub fn is_open(&self, now: u64) -> bool {
        now < self.start_time
    }

    pub fn tickets_sold(&self) -> u64 {
        self.next_ticket_id - 1
    }

    /// Owner of `ticket_id` at mint time.
    pub fn owner_of(&self, ticket_id: TicketId) -> Result<&AccountId, SaleError> {
        self.tickets
            .get(&ticket_id)
            .ok_or(SaleError::UnknownTicket { ticket_id })
    }

    pub fn events(&self) -> &[SaleEvent] {
        &self.events
    }

    /// Sell one ticket to `buyer` at the current price.
    ///
    /// The buyer must be enrolled in `registry`, hold at least the ticket
    /// price in the settlement ledger, and have authorized the custody
    /// account for at least that much. Which of the three checks failed is
    /// not reported; all three surface as
    /// [`SaleError::InsufficientFunds`].
    ///
    /// Local state changes only after the settlement debit has succeeded, so
    /// a rejected purchase leaves balances and the ticket counter untouched.
    pub fn purchase_ticket(
        &mut self,
        registry: &impl Whitelist,
        currency: &mut impl CurrencyLedger,
        buyer: &AccountId,
        now: u64,
    ) -> Result<TicketId, SaleError> {
        if !self.is_open(now) {
            return Err(SaleError::SaleClosed);
        }
        if !registry.is_whitelisted(buyer) || currency.balance_of(buyer) < self.ticket_price {
            return Err(SaleError::InsufficientFunds {
                buyer: buyer.clone(),
            });
        }
        currency
            .transfer_from(
                &self.custody_account,
                buyer,
                &self.custody_account,
                self.ticket_price,
            )
            .map_err(|_| SaleError::InsufficientFunds {
                buyer: buyer.clone(),
            })?;

        let ticket_id = self.next_ticket_id;
        self.tickets.insert(ticket_id, buyer.clone());
        self.next_ticket_id += 1;
        self.events.push(SaleEvent::TicketPurchased {
            ticket_id,
            buyer: buyer.clone(),
            price: self.ticket_price,
        });
        Ok(ticket_id)
    }

    /// Set the ticket price for all subsequent purchases. Administrator
    /// only; zero and arbitrarily large values are both accepted, in either
    /// sale state.
    pub fn update_ticket_price(
        &mut self,
        caller: &AccountId,
        new_price: Amount,
    ) -> Result<(), SaleError> {
        self.authorize(caller)?;
        self.ticket_price = new_price;
        self.events.push(SaleEvent::PriceUpdated { price: new_price });
        Ok(())
    }

    /// Release `amount` of custodied currency to the administrator.
    pub fn withdraw(
        &mut self,
        caller: &AccountId,
        currency: &mut impl CurrencyLedger,
        amount: Amount,
    ) -> Result<(), SaleError> {
        self.authorize(caller)?;
        let available = currency.balance_of(&self.custody_account);
        if available < amount {
            return Err(SaleError::InsufficientCustodyBalance {
                requested: amount,
                available,
            });
        }
        currency
            .transfer(&self.custody_account, &self.administrator, amount)
            .map_err(|_| SaleError::InsufficientCustodyBalance {
                requested: amount,
                available,
            })?;
        self.events.push(SaleEvent::FundsWithdrawn {
            to: self.administrator.clone(),
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> SaleSnapshot {
        SaleSnapshot {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            administrator: self.administrator.clone(),
            custody_account: self.custody_account.clone(),
            ticket_price: self.ticket_price,
            start_time: self.start_time,
            next_ticket_id: self.next_ticket_id,
            tickets: self.tickets.clone(),
            events: self.events.clone(),
        }
    }

    fn authorize(&self, caller: &AccountId) -> Result<(), SaleError> {
        if caller != &self.administrator {
            return Err(SaleError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}
