//! Fungible settlement ledger.
//!
//! Conventional balance/allowance bookkeeping: the administrator mints units,
//! holders move them with [`TokenLedger::transfer`], and a holder may
//! authorize a spender to pull funds on its behalf through
//! [`TokenLedger::approve`] / [`TokenLedger::transfer_from`]. The sale ledger
//! consumes only the [`CurrencyLedger`] slice of this surface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type AccountId = String;
pub type Amount = u64;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("insufficient balance in account {account}")]
    InsufficientBalance { account: AccountId },
    #[error("allowance granted by {owner} to {spender} is too low")]
    InsufficientAllowance { owner: AccountId, spender: AccountId },
    #[error("caller {caller} is not the token administrator")]
    Unauthorized { caller: AccountId },
}

/// Settlement surface consumed by the sale ledger: one balance query, one
/// allowance-based debit, one direct transfer out of the caller's own funds.
pub trait CurrencyLedger {
    fn balance_of(&self, account: &AccountId) -> Amount;

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError>;

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError>;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEvent {
    Minted {
        to: AccountId,
        amount: Amount,
    },
    Transferred {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Approved {
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub name: String,
    pub symbol: String,
    pub total_supply: Amount,
    pub balances: BTreeMap<AccountId, Amount>,
    pub events: Vec<TokenEvent>,
    pub state_root: [u8; 32],
}

pub struct TokenLedger {
    name: String,
    symbol: String,
    administrator: AccountId,
    total_supply: Amount,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    events: Vec<TokenEvent>,
}

impl TokenLedger {
    pub fn new(name: String, symbol: String, administrator: AccountId) -> Self {
        Self {
            name,
            symbol,
            administrator,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
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

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Create `amount` new units for `to`. Administrator only.
    pub fn mint(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        if caller != &self.administrator {
            return Err(TokenError::Unauthorized {
                caller: caller.clone(),
            });
        }
        self.credit(to, amount);
        self.total_supply += amount;
        self.events.push(TokenEvent::Minted {
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount);
        self.events.push(TokenEvent::Transferred {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    /// Authorize `spender` to pull up to `amount` from `owner`. Overwrites
    /// any previous authorization for the pair.
    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount);
        self.events.push(TokenEvent::Approved {
            owner: owner.clone(),
            spender: spender.clone(),
            amount,
        });
    }

    /// Move `amount` from `from` to `to` on the authority of `spender`'s
    /// allowance. The allowance check runs before the balance debit, so a
    /// failure of either leaves balances and allowance untouched.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let remaining = self.allowance(from, spender);
        if remaining < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from.clone(),
                spender: spender.clone(),
            });
        }
        self.debit(from, amount)?;
        self.allowances
            .entry(from.clone())
            .or_default()
            .insert(spender.clone(), remaining - amount);
        self.credit(to, amount);
        self.events.push(TokenEvent::Transferred {
            from: from.clone(),
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            total_supply: self.total_supply,
            balances: self.balances.clone(),
            events: self.events.clone(),
            state_root: compute_state_root(&self.balances, &self.allowances),
        }
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        *self.balances.entry(account.clone()).or_default() += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), TokenError> {
        if amount == 0 {
            return Ok(());
        }
        match self.balances.get_mut(account) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                Ok(())
            }
            _ => Err(TokenError::InsufficientBalance {
                account: account.clone(),
            }),
        }
    }
}

impl CurrencyLedger for TokenLedger {
    fn balance_of(&self, account: &AccountId) -> Amount {
        TokenLedger::balance_of(self, account)
    }

    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        TokenLedger::transfer(self, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        TokenLedger::transfer_from(self, spender, from, to, amount)
    }
}

fn compute_state_root(
    balances: &BTreeMap<AccountId, Amount>,
    allowances: &BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for (account, amount) in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"balance");
        hasher.update(account.as_bytes());
        hasher.update(amount.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (owner, spenders) in allowances {
        for (spender, amount) in spenders {
            let mut hasher = Sha256::new();
            hasher.update(b"allowance");
            hasher.update(owner.as_bytes());
            hasher.update(spender.as_bytes());
            hasher.update(amount.to_le_bytes());
            leaves.push(hasher.finalize().into());
        }
    }
    fold_root(leaves)
}

fn fold_root(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"token-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for pair in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(&pair[0]);
            // odd leaf pairs with itself
            hasher.update(pair.get(1).unwrap_or(&pair[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountId {
        id.to_string()
    }

    fn funded_ledger() -> TokenLedger {
        let mut ledger = TokenLedger::new("Community Yen".into(), "CMY".into(), acct("admin"));
        ledger.mint(&acct("admin"), &acct("alice"), 100).unwrap();
        ledger.mint(&acct("admin"), &acct("bob"), 50).unwrap();
        ledger
    }

    #[test]
    fn minting_requires_the_administrator() {
        let mut ledger = funded_ledger();
        let err = ledger.mint(&acct("alice"), &acct("alice"), 1_000).unwrap_err();
        match err {
            TokenError::Unauthorized { caller } => assert_eq!(caller, "alice"),
            _ => panic!("unexpected error"),
        }
        assert_eq!(ledger.total_supply(), 150);
    }

    #[test]
    fn transfer_moves_balances_and_records_an_event() {
        let mut ledger = funded_ledger();
        ledger.transfer(&acct("alice"), &acct("bob"), 30).unwrap();
        assert_eq!(ledger.balance_of(&acct("alice")), 70);
        assert_eq!(ledger.balance_of(&acct("bob")), 80);
        assert_eq!(ledger.total_supply(), 150);
        assert!(matches!(
            ledger.events().last(),
            Some(TokenEvent::Transferred { amount: 30, .. })
        ));
    }

    #[test]
    fn transfer_fails_without_funds() {
        let mut ledger = funded_ledger();
        let err = ledger.transfer(&acct("bob"), &acct("alice"), 51).unwrap_err();
        match err {
            TokenError::InsufficientBalance { account } => assert_eq!(account, "bob"),
            _ => panic!("unexpected error"),
        }
        assert_eq!(ledger.balance_of(&acct("bob")), 50);
        assert_eq!(ledger.balance_of(&acct("alice")), 100);
    }

    #[test]
    fn transfer_from_consumes_the_allowance() {
        let mut ledger = funded_ledger();
        ledger.approve(&acct("alice"), &acct("shop"), 80);
        ledger
            .transfer_from(&acct("shop"), &acct("alice"), &acct("shop"), 30)
            .unwrap();
        assert_eq!(ledger.balance_of(&acct("alice")), 70);
        assert_eq!(ledger.balance_of(&acct("shop")), 30);
        assert_eq!(ledger.allowance(&acct("alice"), &acct("shop")), 50);
    }

    #[test]
    fn transfer_from_rejects_a_short_allowance_untouched() {
        let mut ledger = funded_ledger();
        ledger.approve(&acct("alice"), &acct("shop"), 10);
        let err = ledger
            .transfer_from(&acct("shop"), &acct("alice"), &acct("shop"), 11)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));
        assert_eq!(ledger.balance_of(&acct("alice")), 100);
        assert_eq!(ledger.allowance(&acct("alice"), &acct("shop")), 10);
    }

    #[test]
    fn transfer_from_rejects_a_short_balance_untouched() {
        let mut ledger = funded_ledger();
        ledger.approve(&acct("bob"), &acct("shop"), 1_000);
        let err = ledger
            .transfer_from(&acct("shop"), &acct("bob"), &acct("shop"), 51)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&acct("bob")), 50);
        assert_eq!(ledger.allowance(&acct("bob"), &acct("shop")), 1_000);
    }

    #[test]
    fn state_root_is_deterministic() {
        let ledger = funded_ledger();
        let root1 = ledger.snapshot().state_root;
        let root2 = ledger.snapshot().state_root;
        assert_eq!(root1, root2);

        let mut changed = funded_ledger();
        changed.transfer(&acct("alice"), &acct("bob"), 1).unwrap();
        assert_ne!(root1, changed.snapshot().state_root);
    }

    #[test]
    fn snapshot_events_use_tagged_encoding() {
        let ledger = funded_ledger();
        let value = serde_json::to_value(ledger.snapshot()).unwrap();
        assert_eq!(value["events"][0]["type"], "minted");
        assert_eq!(value["balances"]["alice"], 100);
    }
}
