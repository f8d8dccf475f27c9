use thiserror::Error;

use crate::models::reward::RecordKey;
use crate::models::validator::Address;

/// Fixed-point and coin arithmetic failures. Always fatal: they mean an
/// upstream invariant is already broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("negative amount")]
    NegativeAmount,

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("invalid denom: {0:?}")]
    InvalidDenom(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("failed to decode value at {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("failed to encode value: {0}")]
    Encode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("balance overflow for {0:?}")]
    BalanceOverflow(Address),

    #[error("community pool overflow")]
    CommunityPoolOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("validator reward ratio must be within [0, 1], got {0}")]
    InvalidRatio(String),

    #[error("power reduction must be positive")]
    InvalidPowerReduction,
}

/// Errors surfaced by `AllocationEngine::allocate_tokens`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("reward record {0} not found")]
    RecordNotFound(RecordKey),

    #[error("reward record {0} already allocated")]
    AlreadyAllocated(RecordKey),

    #[error("total power mismatch: recorded {recorded}, validators sum to {computed}")]
    PowerMismatch { recorded: i64, computed: i64 },

    #[error("negative voting power for validator {0:?}")]
    NegativeVotingPower(Address),

    #[error("invalid reward params: {0}")]
    Params(#[from] ConfigError),

    #[error("arithmetic invariant violated: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl AllocationError {
    /// Fatal errors must halt block processing. The rest are reported to the
    /// caller, which decides by deployment policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AllocationError::RecordNotFound(_) | AllocationError::AlreadyAllocated(_)
        )
    }
}

/// Errors raised while a reward record is still accumulating.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("reward record {0} already exists")]
    RecordExists(RecordKey),

    #[error("reward record {0} not found")]
    RecordNotFound(RecordKey),

    #[error("reward record {0} is allocated and read-only")]
    RecordFinalized(RecordKey),

    #[error("validator {0:?} unknown at height {1}")]
    UnknownValidator(Address, u64),

    #[error("validator {0:?} already reported for this record")]
    DuplicateValidator(Address),

    #[error("negative voting power for validator {0:?}")]
    NegativeVotingPower(Address),

    #[error("invalid reward params: {0}")]
    Params(#[from] ConfigError),

    #[error("arithmetic invariant violated: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenesisError {
    #[error("invalid reward params: {0}")]
    Params(#[from] ConfigError),

    #[error("invalid reward record {key}: {reason}")]
    InvalidRecord { key: RecordKey, reason: String },

    #[error("duplicate reward record {0}")]
    DuplicateRecord(RecordKey),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, AllocationError>;
