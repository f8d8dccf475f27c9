use std::collections::BTreeMap;

use crate::config::RewardParams;
use crate::models::coin::Coins;
use crate::models::validator::{Address, ValidatorInfo};
use crate::utils::errors::LedgerError;

/// Raw key-value namespace the reward records live in.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All entries under `prefix`, ascending by key.
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

impl<S: KvStore + ?Sized> KvStore for &mut S {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        (**self).set(key, value)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        (**self).scan_prefix(prefix)
    }
}

/// Credits gathered by one block-processing step, applied to a ledger as a
/// single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    pub balances: BTreeMap<Address, Coins>,
    pub outstanding: BTreeMap<Address, Coins>,
    pub community_pool: Coins,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty() && self.outstanding.is_empty() && self.community_pool.is_zero()
    }
}

/// Account balances and validator outstanding rewards.
pub trait Ledger {
    /// Credits a provider (or any plain account) balance.
    fn credit(&mut self, account: &Address, coins: &Coins) -> Result<(), LedgerError>;

    /// Credits a validator's accrued, not-yet-withdrawn rewards.
    fn credit_outstanding_rewards(
        &mut self,
        validator: &Address,
        coins: &Coins,
    ) -> Result<(), LedgerError>;

    fn fund_community_pool(&mut self, coins: &Coins) -> Result<(), LedgerError>;

    /// Applies every credit in `batch` or none of them. On error the ledger
    /// must be left exactly as it was; transactions rely on this to commit
    /// the record store only after the ledger has accepted the whole batch.
    fn apply_batch(&mut self, batch: &LedgerBatch) -> Result<(), LedgerError>;

    fn balance(&self, account: &Address) -> Coins;
    fn outstanding_rewards(&self, validator: &Address) -> Coins;
    fn community_pool(&self) -> Coins;
}

/// Validator power and status as of a given height.
pub trait ValidatorSetProvider {
    fn validator(&self, height: u64, address: &Address) -> Option<ValidatorInfo>;
}

impl<V: ValidatorSetProvider + ?Sized> ValidatorSetProvider for &V {
    fn validator(&self, height: u64, address: &Address) -> Option<ValidatorInfo> {
        (**self).validator(height, address)
    }
}

/// Governance-controlled parameters. Queried on every call, never cached.
pub trait ParamsProvider {
    fn reward_params(&self) -> RewardParams;
}

impl ParamsProvider for RewardParams {
    fn reward_params(&self) -> RewardParams {
        self.clone()
    }
}

impl<P: ParamsProvider + ?Sized> ParamsProvider for &P {
    fn reward_params(&self) -> RewardParams {
        (**self).reward_params()
    }
}
