//! Block-level reward allocation for an oracle network.
//!
//! Reward records are collected per request while validators report
//! data-source results, then allocated once: validator fees to the validators
//! that signed the previous block, provider fees to data-source providers.

pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::{FeeSplitMode, RemainderPolicy, RewardParams};
pub use services::allocation_service::{AllocationEngine, AllocationOutcome, SkipReason};
pub use services::reward_service::RewardService;
pub use utils::errors::{AllocationError, CollectionError};
