use thiserror::Error;

use crate::amount::Amount;
use crate::username::Username;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountExists(Username),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(Username),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Insufficient funds: account={account}, balance={balance}, requested={requested}")]
    InsufficientFunds {
        account: Username,
        balance: Amount,
        requested: Amount,
    },

    #[error("Account busy: {account} (waited {waited_ms} ms)")]
    Busy { account: Username, waited_ms: u64 },

    /// The sender was debited but the recipient credit did not apply.
    /// Carries everything needed to reconcile by hand; never retry.
    #[error(
        "Partial transfer failure: {sender} debited {amount} (balance now {sender_balance}), \
         credit to {recipient} not applied: {reason}"
    )]
    PartialTransferFailure {
        sender: Username,
        recipient: Username,
        amount: Amount,
        sender_balance: Amount,
        #[source]
        reason: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Infrastructure failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Busy { .. } => true,
            LedgerError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Business-rule rejections. These never touch persisted state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_)
                | LedgerError::InvalidUsername(_)
                | LedgerError::AccountNotFound(_)
                | LedgerError::AccountExists(_)
                | LedgerError::RecipientNotFound(_)
                | LedgerError::InvalidRecipient(_)
                | LedgerError::InsufficientFunds { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No such account in store: {0}")]
    MissingAccount(Username),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The write reached the backend but could not be flushed to disk, so
    /// whether it survives a crash is unknown. Retrying would apply the
    /// mutation a second time.
    #[error("Storage flush failed after write: {0}")]
    Io(String),
}

impl StoreError {
    /// Failures that left the store untouched
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::MissingAccount(_) | StoreError::Backend(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
