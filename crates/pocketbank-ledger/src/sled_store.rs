use pocketbank_types::{Amount, StoreError, StoreResult, Username};
use std::path::Path;

use crate::store::AccountStore;

const ACCOUNTS_TREE: &str = "accounts";

/// Durable account store on top of sled.
///
/// Keys are the username bytes, values the balance in cents as a 16-byte
/// big-endian `i128`. Every write is flushed before it returns, so a
/// successful `set_balance` survives a crash.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
    accounts: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path).map_err(backend)?;
        Self::from_db(db)
    }

    /// Store backed by a temporary directory removed on drop
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(backend)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        let accounts = db.open_tree(ACCOUNTS_TREE).map_err(backend)?;
        Ok(SledStore { db, accounts })
    }

    /// A failure here comes after the write was applied in memory; it is
    /// reported as `Io` so callers do not replay the mutation.
    fn flush(&self) -> StoreResult<()> {
        self.db
            .flush()
            .map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(())
    }
}

fn backend(err: sled::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn encode(balance: Amount) -> Vec<u8> {
    balance.cents().to_be_bytes().to_vec()
}

fn decode(key: &[u8], value: &[u8]) -> StoreResult<Amount> {
    let bytes: [u8; 16] = value.try_into().map_err(|_| StoreError::Corrupt {
        key: String::from_utf8_lossy(key).into_owned(),
        reason: format!("expected 16 balance bytes, found {}", value.len()),
    })?;
    Ok(Amount::from_cents(i128::from_be_bytes(bytes)))
}

impl AccountStore for SledStore {
    fn get_balance(&self, username: &Username) -> StoreResult<Option<Amount>> {
        let key = username.as_str().as_bytes();
        self.accounts
            .get(key)
            .map_err(backend)?
            .map(|value| decode(key, &value))
            .transpose()
    }

    fn set_balance(&self, username: &Username, balance: Amount) -> StoreResult<()> {
        let encoded = encode(balance);
        // Only replaces an existing value; a missing key stays missing.
        let updated = self
            .accounts
            .update_and_fetch(username.as_str(), |old| old.map(|_| encoded.clone()))
            .map_err(backend)?;
        if updated.is_none() {
            return Err(StoreError::MissingAccount(username.clone()));
        }
        self.flush()
    }

    fn exists(&self, username: &Username) -> StoreResult<bool> {
        self.accounts
            .contains_key(username.as_str())
            .map_err(backend)
    }

    fn create_account(&self, username: &Username) -> StoreResult<bool> {
        let created = self
            .accounts
            .compare_and_swap(
                username.as_str(),
                None::<&[u8]>,
                Some(encode(Amount::ZERO)),
            )
            .map_err(backend)?
            .is_ok();
        if created {
            self.flush()?;
        }
        Ok(created)
    }

    fn accounts(&self) -> StoreResult<Vec<(Username, Amount)>> {
        let mut out = Vec::new();
        for entry in self.accounts.iter() {
            let (key, value) = entry.map_err(backend)?;
            let name = std::str::from_utf8(&key)
                .ok()
                .and_then(|raw| Username::new(raw).ok())
                .ok_or_else(|| StoreError::Corrupt {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    reason: "key is not a valid username".to_string(),
                })?;
            out.push((name, decode(&key, &value)?));
        }
        Ok(out)
    }
}
