use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::RewardParams;
use crate::models::coin::Coins;
use crate::models::reward::{RecordKey, RewardRecord};
use crate::repositories::reward_repository::RewardRecordStore;
use crate::repositories::traits::{KvStore, ParamsProvider};
use crate::utils::errors::GenesisError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisRecord {
    pub key: RecordKey,
    pub record: RewardRecord,
}

/// Snapshot of the reward module: parameters plus every stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: RewardParams,
    #[serde(default)]
    pub records: Vec<GenesisRecord>,
}

impl GenesisState {
    /// Checks parameters and the bookkeeping invariants of every record.
    pub fn validate(&self) -> Result<(), GenesisError> {
        self.params.validate()?;

        let mut seen = BTreeSet::new();
        for GenesisRecord { key, record } in &self.records {
            if !seen.insert(*key) {
                return Err(GenesisError::DuplicateRecord(*key));
            }
            validate_record(*key, record)?;
        }
        Ok(())
    }
}

fn validate_record(key: RecordKey, record: &RewardRecord) -> Result<(), GenesisError> {
    let invalid = |reason: String| GenesisError::InvalidRecord { key, reason };

    if let Some(v) = record.validators.iter().find(|v| v.voting_power < 0) {
        return Err(invalid(format!("negative voting power for {:?}", v.address)));
    }
    let summed = record.summed_power().map_err(|e| invalid(e.to_string()))?;
    if summed != record.total_power {
        return Err(invalid(format!(
            "total power {} does not match validator sum {}",
            record.total_power, summed
        )));
    }

    let mut validators = BTreeSet::new();
    for v in &record.validators {
        if !validators.insert(v.address) {
            return Err(invalid(format!("validator {:?} listed twice", v.address)));
        }
    }

    record
        .provider_fees
        .validate()
        .and_then(|_| record.validator_fees.validate())
        .map_err(|e| invalid(e.to_string()))?;
    for result in &record.datasource_results {
        result
            .entry_point
            .fees
            .validate()
            .and_then(|_| result.provider_share.validate())
            .map_err(|e| invalid(e.to_string()))?;
    }

    // Allocation pays every share in full
    let owed = record
        .provider_contributions()
        .and_then(|shares| {
            shares
                .values()
                .try_fold(Coins::new(), |acc, share| acc.checked_add(share))
        })
        .map_err(|e| invalid(e.to_string()))?;
    if record.provider_fees.checked_sub(&owed).is_err() {
        return Err(invalid(format!(
            "provider shares {} exceed provider fees {}",
            owed, record.provider_fees
        )));
    }
    Ok(())
}

/// Exports the current parameters and all records in key order.
pub fn export_genesis<S, P>(store: S, params: &P) -> Result<GenesisState, GenesisError>
where
    S: KvStore,
    P: ParamsProvider,
{
    let records = RewardRecordStore::new(store)
        .records()?
        .into_iter()
        .map(|(key, record)| GenesisRecord { key, record })
        .collect();

    Ok(GenesisState {
        params: params.reward_params(),
        records,
    })
}

/// Validates `state` and writes its records. Nothing is written if any
/// record is invalid. Returns the parameters for the caller to install.
pub fn import_genesis<S: KvStore>(
    store: S,
    state: &GenesisState,
) -> Result<RewardParams, GenesisError> {
    state.validate()?;

    let mut records = RewardRecordStore::new(store);
    for GenesisRecord { key, .. } in &state.records {
        if records.has(*key) {
            return Err(GenesisError::DuplicateRecord(*key));
        }
    }
    for GenesisRecord { key, record } in &state.records {
        records.set(*key, record)?;
    }

    info!(records = state.records.len(), "reward genesis imported");
    Ok(state.params.clone())
}
