mod kv_store;
mod ledger;
mod validator_set;

pub use kv_store::MemoryKvStore;
pub use ledger::MemoryLedger;
pub use validator_set::MemoryValidatorSet;
