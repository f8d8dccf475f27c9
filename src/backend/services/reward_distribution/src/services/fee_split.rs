use crate::config::{FeeSplitMode, RewardParams};
use crate::models::coin::Coins;
use crate::utils::decimal::Dec;
use crate::utils::errors::{ArithmeticError, ConfigError};

/// Provider and validator-pool portions of one fee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeSplit {
    pub provider: Coins,
    pub validator: Coins,
}

impl FeeSplit {
    pub fn checked_add(&self, other: &FeeSplit) -> Result<FeeSplit, ArithmeticError> {
        Ok(FeeSplit {
            provider: self.provider.checked_add(&other.provider)?,
            validator: self.validator.checked_add(&other.validator)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSplitPolicy {
    ratio: Dec,
    mode: FeeSplitMode,
}

impl FeeSplitPolicy {
    pub fn new(ratio: Dec, mode: FeeSplitMode) -> Result<Self, ConfigError> {
        if ratio > Dec::one() {
            return Err(ConfigError::InvalidRatio(ratio.to_string()));
        }
        Ok(Self { ratio, mode })
    }

    pub fn from_params(params: &RewardParams) -> Result<Self, ConfigError> {
        Self::new(params.validator_reward_ratio, params.fee_split_mode)
    }

    /// `(provider, validator)` for a single amount. The validator share is
    /// `truncate(fee * ratio)`; ratio 0 and 1 need no special handling.
    pub fn split_amount(&self, fee: u128) -> Result<(u128, u128), ArithmeticError> {
        let (validator, _) = Dec::from_int(fee).mul_truncate(&self.ratio)?.truncate()?;
        let provider = match self.mode {
            FeeSplitMode::Deduct => fee
                .checked_sub(validator)
                .ok_or(ArithmeticError::NegativeAmount)?,
            FeeSplitMode::Surcharge => fee,
        };
        Ok((provider, validator))
    }

    pub fn split(&self, fee: &Coins) -> Result<FeeSplit, ArithmeticError> {
        let mut split = FeeSplit::default();
        for (denom, amount) in fee.iter() {
            let (provider, validator) = self.split_amount(amount)?;
            split.provider.add_amount(denom, provider)?;
            split.validator.add_amount(denom, validator)?;
        }
        Ok(split)
    }
}
