use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use pocketbank_types::{LedgerError, Result, Username};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-username mutual exclusion for read-compute-write sequences.
///
/// Mutexes are created on first use and kept for the lifetime of the
/// registry.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: DashMap<Username, Arc<Mutex<()>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles for `accounts`, deduplicated and sorted so that every caller
    /// acquires them in the same global order.
    pub fn lock_set(&self, accounts: &[&Username]) -> LockSet {
        let mut keys: Vec<Username> = accounts.iter().map(|name| (*name).clone()).collect();
        keys.sort();
        keys.dedup();

        let handles = keys
            .into_iter()
            .map(|name| {
                let handle = self.locks.entry(name.clone()).or_default().value().clone();
                (name, handle)
            })
            .collect();
        LockSet { handles }
    }

    /// Number of accounts that have a mutex registered
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Ordered set of account mutexes for one operation
#[derive(Debug)]
pub struct LockSet {
    handles: Vec<(Username, Arc<Mutex<()>>)>,
}

impl LockSet {
    /// Accounts covered by this set, in acquisition order
    pub fn accounts(&self) -> impl Iterator<Item = &Username> {
        self.handles.iter().map(|(name, _)| name)
    }

    /// Lock every account in order, giving up once `timeout` has elapsed.
    ///
    /// On timeout the guards taken so far are dropped and `Busy` names
    /// the account that could not be locked.
    pub fn acquire(&self, timeout: Duration) -> Result<Vec<MutexGuard<'_, ()>>> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut guards = Vec::with_capacity(self.handles.len());

        for (name, handle) in &self.handles {
            match handle.try_lock_until(deadline) {
                Some(guard) => guards.push(guard),
                None => {
                    return Err(LedgerError::Busy {
                        account: name.clone(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }
        }

        tracing::debug!(
            accounts = self.handles.len(),
            waited_us = started.elapsed().as_micros() as u64,
            "account locks acquired"
        );
        Ok(guards)
    }
}
