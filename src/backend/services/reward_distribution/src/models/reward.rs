use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::coin::Coins;
use crate::models::validator::{Address, ValidatorSnapshot};
use crate::utils::errors::ArithmeticError;

/// Identifier of a reward record: the request sequence number or block height
/// it was collected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub u64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single data-source endpoint and the fee promised to its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub url: String,
    pub metadata: Vec<String>,
    pub provider: Address,
    pub fees: Coins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceResult {
    pub entry_point: EntryPoint,
    pub result: Vec<u8>,
    pub status: ResultStatus,
    /// Part of `entry_point.fees` that went into `provider_fees` when the
    /// report was recorded. This is what the provider is paid.
    pub provider_share: Coins,
}

impl DatasourceResult {
    /// Result whose provider keeps the full entry-point fee. Reports recorded
    /// through the reward service overwrite the share with the fee split.
    pub fn new(entry_point: EntryPoint, result: Vec<u8>, status: ResultStatus) -> Self {
        let provider_share = entry_point.fees.clone();
        Self {
            entry_point,
            result,
            status,
            provider_share,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    /// Results are still being appended.
    Accumulating,
    /// Tokens distributed; the record is read-only from here on.
    Allocated,
}

/// Fees and validator snapshot collected for one completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub datasource_results: Vec<DatasourceResult>,
    pub provider_fees: Coins,
    pub validator_fees: Coins,
    pub validators: Vec<ValidatorSnapshot>,
    pub total_power: i64,
    pub status: RewardStatus,
}

impl Default for RewardRecord {
    fn default() -> Self {
        Self {
            datasource_results: Vec::new(),
            provider_fees: Coins::new(),
            validator_fees: Coins::new(),
            validators: Vec::new(),
            total_power: 0,
            status: RewardStatus::Accumulating,
        }
    }
}

impl RewardRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allocated(&self) -> bool {
        self.status == RewardStatus::Allocated
    }

    pub fn has_validator(&self, address: &Address) -> bool {
        self.validators.iter().any(|v| &v.address == address)
    }

    /// Sum of snapshot voting powers, which `total_power` must equal.
    pub fn summed_power(&self) -> Result<i64, ArithmeticError> {
        self.validators.iter().try_fold(0i64, |acc, v| {
            if v.voting_power < 0 {
                return Err(ArithmeticError::NegativeAmount);
            }
            acc.checked_add(v.voting_power)
                .ok_or(ArithmeticError::Overflow)
        })
    }

    /// Total share owed to each provider, keyed in canonical address order.
    pub fn provider_contributions(&self) -> Result<BTreeMap<Address, Coins>, ArithmeticError> {
        let mut contributions = BTreeMap::new();
        for result in &self.datasource_results {
            let entry = contributions
                .entry(result.entry_point.provider)
                .or_insert_with(Coins::new);
            *entry = entry.checked_add(&result.provider_share)?;
        }
        Ok(contributions)
    }
}
