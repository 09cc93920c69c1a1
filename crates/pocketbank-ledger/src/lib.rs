mod config;
mod engine;
mod locks;
mod memory;
mod sled_store;
mod store;

pub use config::{LedgerConfig, StoreConfig};
pub use engine::{AccountSummary, LedgerEngine, TransferReceipt, TransferStage};
pub use locks::{AccountLocks, LockSet};
pub use memory::MemoryStore;
pub use sled_store::SledStore;
pub use store::AccountStore;
