use pocketbank_types::{Amount, StoreResult, Username};

/// Persistence boundary for account balances.
///
/// Every single call is atomic for the account it touches. There is no
/// multi-account transaction: callers that update two accounts must
/// serialise access themselves (see [`crate::AccountLocks`]).
pub trait AccountStore: Send + Sync {
    /// Current balance, or `None` if the account is not registered
    fn get_balance(&self, username: &Username) -> StoreResult<Option<Amount>>;

    /// Overwrite the balance of a registered account.
    /// Fails with `StoreError::MissingAccount` for unknown users.
    fn set_balance(&self, username: &Username, balance: Amount) -> StoreResult<()>;

    /// Check whether the account is registered
    fn exists(&self, username: &Username) -> StoreResult<bool> {
        Ok(self.get_balance(username)?.is_some())
    }

    /// Register a new account with a zero balance.
    /// Returns `false` (and changes nothing) if it already exists.
    fn create_account(&self, username: &Username) -> StoreResult<bool>;

    /// All registered accounts with their balances, in username order
    fn accounts(&self) -> StoreResult<Vec<(Username, Amount)>>;
}
