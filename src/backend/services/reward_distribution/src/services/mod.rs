pub mod allocation_service;
pub mod fee_split;
pub mod genesis;
pub mod reward_service;
