use parking_lot::RwLock;
use pocketbank_types::{Amount, Result, StoreError, StoreResult, Username};
use std::collections::BTreeMap;

use crate::store::AccountStore;

/// In-memory account store
/// Suitable for testing and demo purposes
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<Username, Amount>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        MemoryStore {
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// Initialize with pre-funded accounts
    pub fn with_accounts(accounts: BTreeMap<Username, Amount>) -> Self {
        MemoryStore {
            accounts: RwLock::new(accounts),
        }
    }

    /// Sum of all balances
    pub fn total(&self) -> Result<Amount> {
        self.accounts
            .read()
            .values()
            .try_fold(Amount::ZERO, |acc, balance| acc.checked_add(*balance))
    }
}

impl AccountStore for MemoryStore {
    fn get_balance(&self, username: &Username) -> StoreResult<Option<Amount>> {
        Ok(self.accounts.read().get(username).copied())
    }

    fn set_balance(&self, username: &Username, balance: Amount) -> StoreResult<()> {
        let mut accounts = self.accounts.write();
        match accounts.get_mut(username) {
            Some(slot) => {
                *slot = balance;
                Ok(())
            }
            None => Err(StoreError::MissingAccount(username.clone())),
        }
    }

    fn exists(&self, username: &Username) -> StoreResult<bool> {
        Ok(self.accounts.read().contains_key(username))
    }

    fn create_account(&self, username: &Username) -> StoreResult<bool> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(username) {
            return Ok(false);
        }
        accounts.insert(username.clone(), Amount::ZERO);
        Ok(true)
    }

    fn accounts(&self) -> StoreResult<Vec<(Username, Amount)>> {
        Ok(self
            .accounts
            .read()
            .iter()
            .map(|(name, balance)| (name.clone(), *balance))
            .collect())
    }
}
