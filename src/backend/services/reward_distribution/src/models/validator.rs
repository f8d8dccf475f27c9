use serde::{Deserialize, Serialize};

use crate::utils::decimal::Dec;

/// 20-byte account or validator operator address, `0x`-hex in serde and
/// `Debug`. Ordered bytewise, which is the canonical iteration order for
/// every payout loop.
pub type Address = primitive_types::H160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorStatus {
    Active,
    Inactive,
}

/// Validator state as reported by the validator-set provider for one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub voting_power: i64,
    pub commission_rate: Dec,
    pub status: ValidatorStatus,
}

/// Copy of a validator's state taken when its report is recorded. Never a
/// live reference: later power changes do not leak into allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    pub address: Address,
    pub voting_power: i64,
    pub status: ValidatorStatus,
}

/// One entry of the consensus vote feed for the block being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteInfo {
    pub validator: Address,
    pub signed_last_block: bool,
}

impl VoteInfo {
    pub fn signed(validator: Address) -> Self {
        Self {
            validator,
            signed_last_block: true,
        }
    }

    pub fn absent(validator: Address) -> Self {
        Self {
            validator,
            signed_last_block: false,
        }
    }
}
