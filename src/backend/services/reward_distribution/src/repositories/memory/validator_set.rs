use std::collections::BTreeMap;

use crate::models::validator::{Address, ValidatorInfo};
use crate::repositories::traits::ValidatorSetProvider;

/// Validator set with per-height history. A lookup at height `h` sees the
/// latest update made at or below `h`.
#[derive(Debug, Clone, Default)]
pub struct MemoryValidatorSet {
    history: BTreeMap<Address, BTreeMap<u64, ValidatorInfo>>,
}

impl MemoryValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_validator(&mut self, height: u64, address: Address, info: ValidatorInfo) {
        self.history
            .entry(address)
            .or_default()
            .insert(height, info);
    }
}

impl ValidatorSetProvider for MemoryValidatorSet {
    fn validator(&self, height: u64, address: &Address) -> Option<ValidatorInfo> {
        self.history
            .get(address)?
            .range(..=height)
            .next_back()
            .map(|(_, info)| info.clone())
    }
}
