use tracing::{debug, info};

use crate::models::reward::{DatasourceResult, RecordKey, RewardRecord};
use crate::models::validator::{Address, ValidatorSnapshot};
use crate::repositories::reward_repository::RewardRecordStore;
use crate::repositories::traits::{KvStore, ParamsProvider, ValidatorSetProvider};
use crate::services::fee_split::{FeeSplit, FeeSplitPolicy};
use crate::utils::errors::{ArithmeticError, CollectionError};

/// Builds reward records while a request is collecting results.
pub struct RewardService<V, P> {
    validators: V,
    params: P,
}

impl<V, P> RewardService<V, P>
where
    V: ValidatorSetProvider,
    P: ParamsProvider,
{
    pub fn new(validators: V, params: P) -> Self {
        Self { validators, params }
    }

    /// Starts fee collection for `key` with an empty accumulating record.
    pub fn begin_collection<S: KvStore>(
        &self,
        store: S,
        key: RecordKey,
    ) -> Result<RewardRecord, CollectionError> {
        let mut records = RewardRecordStore::new(store);
        if records.has(key) {
            return Err(CollectionError::RecordExists(key));
        }

        let record = RewardRecord::new();
        records.set(key, &record)?;
        debug!(record_key = %key, "reward collection started");
        Ok(record)
    }

    /// Records one validator's report: snapshots the validator as of
    /// `height`, appends its data-source results and accumulates their
    /// split fees. Returns the split contributed by this report.
    pub fn record_report<S: KvStore>(
        &self,
        store: S,
        key: RecordKey,
        height: u64,
        validator: &Address,
        mut results: Vec<DatasourceResult>,
    ) -> Result<FeeSplit, CollectionError> {
        let mut records = RewardRecordStore::new(store);
        let mut record = records
            .get(key)?
            .ok_or(CollectionError::RecordNotFound(key))?;

        if record.is_allocated() {
            return Err(CollectionError::RecordFinalized(key));
        }
        if record.has_validator(validator) {
            return Err(CollectionError::DuplicateValidator(*validator));
        }

        let info = self
            .validators
            .validator(height, validator)
            .ok_or(CollectionError::UnknownValidator(*validator, height))?;
        if info.voting_power < 0 {
            return Err(CollectionError::NegativeVotingPower(*validator));
        }

        let params = self.params.reward_params();
        params.validate()?;
        let policy = FeeSplitPolicy::from_params(&params)?;

        let mut contributed = FeeSplit::default();
        for result in &mut results {
            result.entry_point.fees.validate()?;
            let split = policy.split(&result.entry_point.fees)?;
            contributed = contributed.checked_add(&split)?;
            result.provider_share = split.provider;
        }

        record.provider_fees = record.provider_fees.checked_add(&contributed.provider)?;
        record.validator_fees = record.validator_fees.checked_add(&contributed.validator)?;
        record.total_power = record
            .total_power
            .checked_add(info.voting_power)
            .ok_or(ArithmeticError::Overflow)?;
        record.validators.push(ValidatorSnapshot {
            address: *validator,
            voting_power: info.voting_power,
            status: info.status,
        });
        record.datasource_results.extend(results);

        records.set(key, &record)?;

        info!(
            record_key = %key,
            validator = ?validator,
            voting_power = info.voting_power,
            provider_fees = %contributed.provider,
            validator_fees = %contributed.validator,
            "validator report recorded"
        );
        Ok(contributed)
    }

    pub fn record<S: KvStore>(
        &self,
        store: S,
        key: RecordKey,
    ) -> Result<Option<RewardRecord>, CollectionError> {
        Ok(RewardRecordStore::new(store).get(key)?)
    }
}
