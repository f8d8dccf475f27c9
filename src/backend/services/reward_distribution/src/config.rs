use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::decimal::Dec;
use crate::utils::errors::ConfigError;

/// Token units per unit of consensus power.
pub const DEFAULT_POWER_REDUCTION: u64 = 1_000_000;

/// How a data-source fee is divided between provider and validator pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSplitMode {
    /// The validator share is carved out of the fee; the provider keeps the rest.
    Deduct,
    /// The provider keeps the full fee; the validator share is charged on top.
    Surcharge,
}

/// Where the unallocated part of a record goes after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// Left uncredited.
    Unallocated,
    CommunityPool,
}

/// Reward parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParams {
    /// Fraction of each data-source fee owed to the validator pool, in `[0, 1]`
    pub validator_reward_ratio: Dec,
    #[serde(default = "default_fee_split_mode")]
    pub fee_split_mode: FeeSplitMode,
    /// Power fractions are taken over `power * power_reduction` and divided
    /// back out after weighting, keeping extra precision before truncation
    #[serde(default = "default_power_reduction")]
    pub power_reduction: u64,
    #[serde(default = "default_remainder_policy")]
    pub remainder_policy: RemainderPolicy,
}

fn default_fee_split_mode() -> FeeSplitMode {
    FeeSplitMode::Deduct
}

fn default_power_reduction() -> u64 {
    DEFAULT_POWER_REDUCTION
}

fn default_remainder_policy() -> RemainderPolicy {
    RemainderPolicy::Unallocated
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            validator_reward_ratio: Dec::with_prec(40, 2).unwrap_or_default(),
            fee_split_mode: default_fee_split_mode(),
            power_reduction: default_power_reduction(),
            remainder_policy: default_remainder_policy(),
        }
    }
}

impl RewardParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validator_reward_ratio > Dec::one() {
            return Err(ConfigError::InvalidRatio(
                self.validator_reward_ratio.to_string(),
            ));
        }
        if self.power_reduction == 0 {
            return Err(ConfigError::InvalidPowerReduction);
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let params: RewardParams =
            toml::from_str(contents).context("failed to parse reward params")?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid {}", path.display()))
    }

    /// Save parameters to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let toml = toml::to_string_pretty(self).context("failed to encode reward params")?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
