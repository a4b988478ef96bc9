//! Participant allowlist for the ticket sale stack.
//!
//! The registry keeps the authoritative set of identities permitted to
//! transact with the sale ledger. Membership lookups are open to everyone and
//! never fail; mutations are restricted to the administrator fixed at
//! construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub type AccountId = String;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("caller {caller} is not the registry administrator")]
    Unauthorized { caller: AccountId },
}

/// Membership lookup consumed by collaborating components. Implement this on
/// a stub to substitute the registry in tests.
pub trait Whitelist {
    fn is_whitelisted(&self, id: &AccountId) -> bool;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    MemberAdded { id: AccountId },
    MemberRemoved { id: AccountId },
}

#[derive(Clone, Debug)]
pub struct Registry {
    administrator: AccountId,
    members: BTreeSet<AccountId>,
    events: Vec<RegistryEvent>,
}

impl Registry {
    pub fn new(administrator: AccountId) -> Self {
        Self {
            administrator,
            members: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    pub fn members(&self) -> impl Iterator<Item = &AccountId> {
        self.members.iter()
    }

    /// Effective mutations in application order. Idempotent no-ops are not
    /// recorded.
    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    /// Enroll `id`. Enrolling a present member is a no-op success.
    pub fn add(&mut self, caller: &AccountId, id: AccountId) -> Result<(), RegistryError> {
        self.authorize(caller)?;
        self.insert(id);
        Ok(())
    }

    /// Enroll every id in order. The authorization check runs before the
    /// first insertion, so a rejected call leaves the set untouched.
    pub fn bulk_add(&mut self, caller: &AccountId, ids: Vec<AccountId>) -> Result<(), RegistryError> {
        self.authorize(caller)?;
        for id in ids {
            self.insert(id);
        }
        Ok(())
    }

    /// Strike `id`. Removing an absent member is a no-op success.
    pub fn remove(&mut self, caller: &AccountId, id: &AccountId) -> Result<(), RegistryError> {
        self.authorize(caller)?;
        if self.members.remove(id) {
            self.events.push(RegistryEvent::MemberRemoved { id: id.clone() });
        }
        Ok(())
    }

    fn authorize(&self, caller: &AccountId) -> Result<(), RegistryError> {
        if caller != &self.administrator {
            return Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, id: AccountId) {
        if self.members.insert(id.clone()) {
            self.events.push(RegistryEvent::MemberAdded { id });
        }
    }
}

impl Whitelist for Registry {
    fn is_whitelisted(&self, id: &AccountId) -> bool {
        self.members.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(id: &str) -> AccountId {
        id.to_string()
    }

    #[test]
    fn administrator_can_add_and_remove_members() {
        let admin = acct("admin");
        let mut registry = Registry::new(admin.clone());
        registry.add(&admin, acct("alice")).unwrap();
        assert!(registry.is_whitelisted(&acct("alice")));
        registry.remove(&admin, &acct("alice")).unwrap();
        assert!(!registry.is_whitelisted(&acct("alice")));
        assert_eq!(registry.events().len(), 2);
    }

    #[test]
    fn non_administrator_cannot_mutate() {
        let admin = acct("admin");
        let mut registry = Registry::new(admin.clone());
        let err = registry.add(&acct("mallory"), acct("mallory")).unwrap_err();
        match err {
            RegistryError::Unauthorized { caller } => assert_eq!(caller, "mallory"),
        }
        assert!(!registry.is_whitelisted(&acct("mallory")));
        assert!(registry
            .remove(&acct("mallory"), &acct("mallory"))
            .is_err());
    }

    #[test]
    fn repeated_enrollment_is_a_no_op() {
        let admin = acct("admin");
        let mut registry = Registry::new(admin.clone());
        registry.add(&admin, acct("alice")).unwrap();
        registry.add(&admin, acct("alice")).unwrap();
        registry.remove(&admin, &acct("bob")).unwrap();
        assert_eq!(registry.events().len(), 1);
    }

    #[test]
    fn bulk_add_is_all_or_nothing() {
        let admin = acct("admin");
        let mut registry = Registry::new(admin.clone());
        registry
            .bulk_add(&admin, vec![acct("alice"), acct("bob"), acct("alice")])
            .unwrap();
        assert_eq!(registry.members().count(), 2);

        let err = registry
            .bulk_add(&acct("mallory"), vec![acct("carol"), acct("dave")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized { .. }));
        assert!(!registry.is_whitelisted(&acct("carol")));
        assert!(!registry.is_whitelisted(&acct("dave")));
        assert_eq!(registry.members().count(), 2);
    }

    #[test]
    fn zero_identity_may_be_enrolled() {
        let admin = acct("admin");
        let mut registry = Registry::new(admin.clone());
        assert!(!registry.is_whitelisted(&acct("")));
        registry.add(&admin, acct("")).unwrap();
        assert!(registry.is_whitelisted(&acct("")));
    }
}
