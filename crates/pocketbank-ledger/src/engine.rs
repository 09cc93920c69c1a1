use pocketbank_types::{Amount, LedgerError, Result, StoreError, Username};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::LedgerConfig;
use crate::locks::AccountLocks;
use crate::store::AccountStore;

/// Progress of a single transfer call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferStage {
    Validating,
    SenderChecked,
    RecipientChecked,
    SenderDebited,
    RecipientCredited,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Validating => "validating",
            TransferStage::SenderChecked => "sender_checked",
            TransferStage::RecipientChecked => "recipient_checked",
            TransferStage::SenderDebited => "sender_debited",
            TransferStage::RecipientCredited => "recipient_credited",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub sender: Username,
    pub recipient: Username,
    pub amount: Amount,
    pub sender_balance: Amount,
    pub recipient_balance: Amount,
}

/// One row of the account ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub rank: usize,
    pub username: Username,
    pub balance: Amount,
}

/// Deposit, withdrawal and transfer over an injected [`AccountStore`].
///
/// Every read-compute-write runs under the per-account lock of each account
/// it touches, so the engine can be shared between threads behind an `Arc`.
pub struct LedgerEngine<S> {
    store: S,
    locks: AccountLocks,
    lock_timeout: Duration,
}

impl<S: AccountStore> LedgerEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, &LedgerConfig::default())
    }

    pub fn with_config(store: S, config: &LedgerConfig) -> Self {
        LedgerEngine {
            store,
            locks: AccountLocks::new(),
            lock_timeout: config.lock_timeout(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// Register a new account with a zero balance
    pub fn open_account(&self, username: &str) -> Result<Username> {
        report("open_account", username, self.apply_open_account(username))
    }

    /// Current balance of an account
    pub fn balance(&self, username: &str) -> Result<Amount> {
        report("balance", username, self.apply_balance(username))
    }

    /// Add `amount_input` to the account and return the new balance
    pub fn deposit(&self, username: &str, amount_input: &str) -> Result<Amount> {
        report("deposit", username, self.apply_deposit(username, amount_input))
    }

    /// Take `amount_input` from the account and return the new balance.
    /// Fails with `InsufficientFunds` and no mutation if it would overdraw.
    pub fn withdraw(&self, username: &str, amount_input: &str) -> Result<Amount> {
        report("withdraw", username, self.apply_withdraw(username, amount_input))
    }

    /// Move `amount_input` from `sender` to `recipient`.
    ///
    /// The sender is debited before the recipient is credited. If the credit
    /// cannot be written, or the debit was written but not flushed, the call
    /// fails with `PartialTransferFailure`. A credit that was written but not
    /// flushed fails with `StoreError::Io`, which is not retryable.
    pub fn transfer(
        &self,
        sender: &str,
        amount_input: &str,
        recipient: &str,
    ) -> Result<TransferReceipt> {
        let mut stage = TransferStage::Validating;
        let result = self.apply_transfer(sender, amount_input, recipient, &mut stage);
        match &result {
            Ok(receipt) => info!(
                sender = %receipt.sender,
                recipient = %receipt.recipient,
                amount = %receipt.amount,
                sender_balance = %receipt.sender_balance,
                recipient_balance = %receipt.recipient_balance,
                "transfer applied"
            ),
            // Logged with full reconciliation detail where it happens.
            Err(LedgerError::PartialTransferFailure { .. }) => {}
            Err(err) if err.is_rejection() || matches!(err, LedgerError::Busy { .. }) => warn!(
                sender,
                recipient,
                stage = %stage,
                error = %err,
                "transfer rejected"
            ),
            Err(err) => error!(
                sender,
                recipient,
                stage = %stage,
                error = %err,
                "transfer failed"
            ),
        }
        result
    }

    /// Every account ordered by balance, highest first, ties by username.
    ///
    /// Reads each balance individually without taking account locks; the
    /// result is a view, not a consistent snapshot.
    pub fn ranking(&self) -> Result<Vec<AccountSummary>> {
        let mut accounts = self.store.accounts()?;
        accounts.sort_by(|(a_name, a_balance), (b_name, b_balance)| {
            b_balance.cmp(a_balance).then_with(|| a_name.cmp(b_name))
        });
        Ok(accounts
            .into_iter()
            .enumerate()
            .map(|(i, (username, balance))| AccountSummary {
                rank: i + 1,
                username,
                balance,
            })
            .collect())
    }

    fn apply_open_account(&self, username: &str) -> Result<Username> {
        let account = Username::new(username)?;
        let locks = self.locks.lock_set(&[&account]);
        let _guards = locks.acquire(self.lock_timeout)?;

        if !self.store.create_account(&account)? {
            return Err(LedgerError::AccountExists(account));
        }
        info!(account = %account, "account opened");
        Ok(account)
    }

    fn apply_balance(&self, username: &str) -> Result<Amount> {
        let account = lookup_key(username)?;
        let locks = self.locks.lock_set(&[&account]);
        let _guards = locks.acquire(self.lock_timeout)?;
        self.read_balance(&account)
    }

    fn apply_deposit(&self, username: &str, amount_input: &str) -> Result<Amount> {
        let amount = Amount::parse_positive(amount_input)?;
        let account = lookup_key(username)?;
        let locks = self.locks.lock_set(&[&account]);
        let _guards = locks.acquire(self.lock_timeout)?;

        let current = self.read_balance(&account)?;
        let balance = current.checked_add(amount)?;
        self.store.set_balance(&account, balance)?;

        info!(account = %account, amount = %amount, balance = %balance, "deposit applied");
        Ok(balance)
    }

    fn apply_withdraw(&self, username: &str, amount_input: &str) -> Result<Amount> {
        let amount = Amount::parse_positive(amount_input)?;
        let account = lookup_key(username)?;
        let locks = self.locks.lock_set(&[&account]);
        let _guards = locks.acquire(self.lock_timeout)?;

        let current = self.read_balance(&account)?;
        if amount > current {
            return Err(LedgerError::InsufficientFunds {
                account,
                balance: current,
                requested: amount,
            });
        }
        let balance = current.checked_sub(amount)?;
        self.store.set_balance(&account, balance)?;

        info!(account = %account, amount = %amount, balance = %balance, "withdrawal applied");
        Ok(balance)
    }

    fn apply_transfer(
        &self,
        sender: &str,
        amount_input: &str,
        recipient: &str,
        stage: &mut TransferStage,
    ) -> Result<TransferReceipt> {
        let amount = Amount::parse_positive(amount_input)?;

        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(LedgerError::InvalidRecipient(
                "recipient not specified".to_string(),
            ));
        }
        let recipient = Username::new(recipient)
            .map_err(|e| LedgerError::InvalidRecipient(e.to_string()))?;
        let sender = lookup_key(sender)?;
        if sender == recipient {
            return Err(LedgerError::InvalidRecipient(format!(
                "cannot transfer to own account {}",
                sender
            )));
        }

        let locks = self.locks.lock_set(&[&sender, &recipient]);
        let _guards = locks.acquire(self.lock_timeout)?;

        let sender_balance = self.read_balance(&sender)?;
        if amount > sender_balance {
            return Err(LedgerError::InsufficientFunds {
                account: sender,
                balance: sender_balance,
                requested: amount,
            });
        }
        *stage = TransferStage::SenderChecked;

        if !self.store.exists(&recipient)? {
            return Err(LedgerError::RecipientNotFound(recipient));
        }
        let recipient_balance = match self.store.get_balance(&recipient)? {
            Some(balance) => balance,
            None => return Err(LedgerError::RecipientNotFound(recipient)),
        };
        *stage = TransferStage::RecipientChecked;

        let sender_new = sender_balance.checked_sub(amount)?;
        let recipient_new = recipient_balance.checked_add(amount)?;

        match self.store.set_balance(&sender, sender_new) {
            Ok(()) => {}
            // Debit applied but not durable; the credit is never attempted.
            Err(reason @ StoreError::Io(_)) => {
                *stage = TransferStage::SenderDebited;
                return Err(partial_failure(
                    sender,
                    recipient,
                    amount,
                    sender_new,
                    recipient_balance,
                    reason,
                ));
            }
            Err(err) => return Err(err.into()),
        }
        *stage = TransferStage::SenderDebited;

        match self.store.set_balance(&recipient, recipient_new) {
            Ok(()) => {}
            // Both writes applied; only their durability is unknown.
            Err(err @ StoreError::Io(_)) => {
                *stage = TransferStage::RecipientCredited;
                return Err(err.into());
            }
            Err(reason) => {
                return Err(partial_failure(
                    sender,
                    recipient,
                    amount,
                    sender_new,
                    recipient_balance,
                    reason,
                ));
            }
        }
        *stage = TransferStage::RecipientCredited;

        Ok(TransferReceipt {
            sender,
            recipient,
            amount,
            sender_balance: sender_new,
            recipient_balance: recipient_new,
        })
    }

    fn read_balance(&self, account: &Username) -> Result<Amount> {
        self.store
            .get_balance(account)?
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }
}

fn partial_failure(
    sender: Username,
    recipient: Username,
    amount: Amount,
    sender_balance: Amount,
    recipient_balance: Amount,
    reason: StoreError,
) -> LedgerError {
    error!(
        sender = %sender,
        recipient = %recipient,
        amount = %amount,
        sender_balance = %sender_balance,
        recipient_balance = %recipient_balance,
        error = %reason,
        "transfer partially applied: sender debited, recipient credit pending"
    );
    LedgerError::PartialTransferFailure {
        sender,
        recipient,
        amount,
        sender_balance,
        reason,
    }
}

/// Usernames that cannot be valid can never name an existing account
fn lookup_key(username: &str) -> Result<Username> {
    Username::new(username).map_err(|_| LedgerError::AccountNotFound(username.to_string()))
}

fn report<T>(operation: &'static str, account: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        if err.is_rejection() || matches!(err, LedgerError::Busy { .. }) {
            warn!(operation, account, error = %err, "operation rejected");
        } else {
            error!(operation, account, error = %err, "operation failed");
        }
    }
    result
}
