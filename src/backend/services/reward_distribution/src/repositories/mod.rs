pub mod memory;
pub mod reward_repository;
pub mod traits;
pub mod transaction_manager;

pub use reward_repository::RewardRecordStore;
pub use transaction_manager::TransactionManager;
