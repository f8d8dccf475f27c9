use crate::models::reward::{RecordKey, RewardRecord};
use crate::repositories::traits::KvStore;
use crate::utils::errors::StoreError;

/// Namespace prefix for reward records.
pub const REWARD_KEY_PREFIX: &[u8] = b"reward/";

/// Big-endian so that a prefix scan walks records in key order.
pub fn reward_store_key(key: RecordKey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(REWARD_KEY_PREFIX.len() + 8);
    bytes.extend_from_slice(REWARD_KEY_PREFIX);
    bytes.extend_from_slice(&key.0.to_be_bytes());
    bytes
}

fn record_key_from_store_key(raw: &[u8]) -> Result<RecordKey, StoreError> {
    let suffix = raw
        .strip_prefix(REWARD_KEY_PREFIX)
        .filter(|suffix| suffix.len() == 8)
        .ok_or_else(|| StoreError::Decode {
            key: hex::encode(raw),
            reason: "malformed reward key".to_string(),
        })?;
    let mut be = [0u8; 8];
    be.copy_from_slice(suffix);
    Ok(RecordKey(u64::from_be_bytes(be)))
}

/// Reward record persistence over a key-value namespace. Holds no state of
/// its own; the store handle is whatever the current block context passes in.
pub struct RewardRecordStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> RewardRecordStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates or overwrites the record at `key`.
    pub fn set(&mut self, key: RecordKey, record: &RewardRecord) -> Result<(), StoreError> {
        let value = serde_json::to_vec(record).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.store.set(&reward_store_key(key), value);
        Ok(())
    }

    /// `Ok(None)` when absent; decode failures are errors.
    pub fn get(&self, key: RecordKey) -> Result<Option<RewardRecord>, StoreError> {
        match self.store.get(&reward_store_key(key)) {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn has(&self, key: RecordKey) -> bool {
        self.store.has(&reward_store_key(key))
    }

    /// Every record in ascending key order, for audit and export.
    pub fn records(&self) -> Result<Vec<(RecordKey, RewardRecord)>, StoreError> {
        self.store
            .scan_prefix(REWARD_KEY_PREFIX)
            .into_iter()
            .map(|(raw, bytes)| {
                let key = record_key_from_store_key(&raw)?;
                Ok((key, decode(key, &bytes)?))
            })
            .collect()
    }
}

fn decode(key: RecordKey, bytes: &[u8]) -> Result<RewardRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
