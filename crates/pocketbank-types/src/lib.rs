mod amount;
mod username;
mod error;

pub use amount::{Amount, DECIMALS};
pub use username::Username;
pub use error::{LedgerError, Result, StoreError, StoreResult};
