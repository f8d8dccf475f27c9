//! Reward allocation.
//!
//! Once per processed block the engine takes a finished reward record and
//! splits it: validator fees go to the validators that signed the previous
//! block, weighted by voting power, and each data-source provider is paid
//! exactly the provider share its entry points were recorded with.
//!
//! Every validator division truncates toward zero, so the credited total can
//! never exceed what was collected. Whatever is cut off stays in the
//! outcome's remainder and is either left unallocated or sent to the
//! community pool. All payout loops run in ascending address order.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::{RemainderPolicy, RewardParams};
use crate::models::coin::{Coins, DecCoins};
use crate::models::reward::{RecordKey, RewardRecord, RewardStatus};
use crate::models::validator::{Address, ValidatorSnapshot, VoteInfo};
use crate::repositories::reward_repository::RewardRecordStore;
use crate::repositories::traits::{KvStore, Ledger, ParamsProvider};
use crate::repositories::transaction_manager::TransactionManager;
use crate::utils::decimal::Dec;
use crate::utils::errors::{AllocationError, ArithmeticError};

/// Why validator distribution was skipped for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ZeroTotalPower,
    EmptyEligibleSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorPayout {
    pub validator: Address,
    pub voting_power: i64,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPayout {
    pub provider: Address,
    pub amount: Coins,
}

/// Payouts computed for one record, before anything is credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub validator_payouts: Vec<ValidatorPayout>,
    pub provider_payouts: Vec<ProviderPayout>,
    pub skipped: Option<SkipReason>,
    /// Validator fees not credited: truncation plus the share of slots that
    /// did not sign or were skipped.
    pub validator_remainder: Coins,
    /// Provider fees not owed to any result. Zero for records built through
    /// the reward service.
    pub provider_remainder: Coins,
}

impl AllocationPlan {
    pub fn validator_total(&self) -> Result<Coins, ArithmeticError> {
        self.validator_payouts
            .iter()
            .try_fold(Coins::new(), |acc, p| acc.checked_add(&p.amount))
    }

    pub fn provider_total(&self) -> Result<Coins, ArithmeticError> {
        self.provider_payouts
            .iter()
            .try_fold(Coins::new(), |acc, p| acc.checked_add(&p.amount))
    }

    pub fn remainder(&self) -> Result<Coins, ArithmeticError> {
        self.validator_remainder.checked_add(&self.provider_remainder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub key: RecordKey,
    pub plan: AllocationPlan,
    pub remainder: Coins,
    pub remainder_policy: RemainderPolicy,
}

/// Computes the payouts for `record` without touching any state.
///
/// Validator `i` eligible in this round receives
/// `truncate((validator_fees / n) * (power_i * R / total_power) / R)` per
/// denom, where `n` is the number of validator slots in the record and `R`
/// the configured power reduction. Provider `p` receives the sum of the
/// `provider_share` of its results, with no rounding.
pub fn compute_allocation(
    record: &RewardRecord,
    votes: &[VoteInfo],
    params: &RewardParams,
) -> Result<AllocationPlan, ArithmeticError> {
    let signed: BTreeSet<Address> = votes
        .iter()
        .filter(|vote| vote.signed_last_block)
        .map(|vote| vote.validator)
        .collect();

    let mut eligible: Vec<&ValidatorSnapshot> = record
        .validators
        .iter()
        .filter(|v| signed.contains(&v.address))
        .collect();
    eligible.sort_by(|a, b| a.address.cmp(&b.address));

    let skipped = if record.total_power == 0 {
        Some(SkipReason::ZeroTotalPower)
    } else if eligible.is_empty() {
        Some(SkipReason::EmptyEligibleSet)
    } else {
        None
    };

    let mut validator_payouts = Vec::with_capacity(eligible.len());
    if skipped.is_none() {
        let slots = record.validators.len() as u128;
        let reduction = u128::from(params.power_reduction);
        let base = DecCoins::from_coins(&record.validator_fees).quo_int_truncate(slots)?;
        let total_power = Dec::from_int(non_negative(record.total_power)?);

        for validator in eligible {
            let fraction = Dec::from_int(non_negative(validator.voting_power)?)
                .mul_int(reduction)?
                .quo_truncate(&total_power)?;
            let (amount, change) = base
                .mul_dec_truncate(&fraction)?
                .quo_int_truncate(reduction)?
                .truncate()?;

            debug!(
                validator = ?validator.address,
                power_fraction = %fraction,
                amount = %amount,
                truncated = ?change,
                "validator share computed"
            );
            validator_payouts.push(ValidatorPayout {
                validator: validator.address,
                voting_power: validator.voting_power,
                amount,
            });
        }
    }

    let provider_payouts: Vec<_> = record
        .provider_contributions()?
        .into_iter()
        .map(|(provider, amount)| ProviderPayout { provider, amount })
        .collect();

    let mut plan = AllocationPlan {
        validator_payouts,
        provider_payouts,
        skipped,
        validator_remainder: Coins::new(),
        provider_remainder: Coins::new(),
    };
    // Fails with NegativeAmount if anything was over-credited
    plan.validator_remainder = record.validator_fees.checked_sub(&plan.validator_total()?)?;
    plan.provider_remainder = record.provider_fees.checked_sub(&plan.provider_total()?)?;
    Ok(plan)
}

fn non_negative(value: i64) -> Result<u128, ArithmeticError> {
    u128::try_from(value).map_err(|_| ArithmeticError::NegativeAmount)
}

/// Validates power bookkeeping before any division happens.
fn check_power(record: &RewardRecord) -> Result<(), AllocationError> {
    if let Some(v) = record.validators.iter().find(|v| v.voting_power < 0) {
        return Err(AllocationError::NegativeVotingPower(v.address));
    }
    let computed = record.summed_power()?;
    if computed != record.total_power {
        return Err(AllocationError::PowerMismatch {
            recorded: record.total_power,
            computed,
        });
    }
    Ok(())
}

/// Distributes reward records. Parameters come from the injected provider
/// on every call; the store and ledger belong to the calling block context.
pub struct AllocationEngine<P> {
    params: P,
}

impl<P: ParamsProvider> AllocationEngine<P> {
    pub fn new(params: P) -> Self {
        Self { params }
    }

    /// Allocates the record at `key` to the validators that signed the last
    /// block and to its data-source providers, then marks it allocated.
    ///
    /// Store and ledger effects are committed together or not at all. A
    /// second call for the same key fails with `AlreadyAllocated`.
    pub fn allocate_tokens<S, L>(
        &self,
        store: &mut S,
        ledger: &mut L,
        votes: &[VoteInfo],
        key: RecordKey,
    ) -> Result<AllocationOutcome, AllocationError>
    where
        S: KvStore,
        L: Ledger,
    {
        TransactionManager::with_transaction(store, ledger, |store, ledger| {
            self.allocate_in(store, ledger, votes, key)
        })
    }

    fn allocate_in<S, L>(
        &self,
        store: &mut S,
        ledger: &mut L,
        votes: &[VoteInfo],
        key: RecordKey,
    ) -> Result<AllocationOutcome, AllocationError>
    where
        S: KvStore,
        L: Ledger,
    {
        let mut records = RewardRecordStore::new(store);
        let mut record = records
            .get(key)?
            .ok_or(AllocationError::RecordNotFound(key))?;
        if record.is_allocated() {
            return Err(AllocationError::AlreadyAllocated(key));
        }

        let params = self.params.reward_params();
        params.validate()?;
        check_power(&record)?;

        let plan = compute_allocation(&record, votes, &params)?;

        for payout in &plan.validator_payouts {
            if !payout.amount.is_zero() {
                ledger.credit_outstanding_rewards(&payout.validator, &payout.amount)?;
            }
        }
        for payout in &plan.provider_payouts {
            if !payout.amount.is_zero() {
                ledger.credit(&payout.provider, &payout.amount)?;
                debug!(record_key = %key, provider = ?payout.provider, amount = %payout.amount, "provider credited");
            }
        }

        let remainder = plan.remainder()?;
        if params.remainder_policy == RemainderPolicy::CommunityPool && !remainder.is_zero() {
            ledger.fund_community_pool(&remainder)?;
        }

        record.status = RewardStatus::Allocated;
        records.set(key, &record)?;

        if let Some(reason) = plan.skipped {
            warn!(record_key = %key, reason = ?reason, "validator distribution skipped");
        }
        info!(
            record_key = %key,
            validators = plan.validator_payouts.len(),
            providers = plan.provider_payouts.len(),
            validator_remainder = %plan.validator_remainder,
            provider_remainder = %plan.provider_remainder,
            remainder_policy = ?params.remainder_policy,
            "reward record allocated"
        );

        Ok(AllocationOutcome {
            key,
            plan,
            remainder,
            remainder_policy: params.remainder_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reward::{DatasourceResult, EntryPoint, ResultStatus};
    use crate::models::validator::ValidatorStatus;
    use crate::services::fee_split::FeeSplitPolicy;
    use proptest::prelude::*;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn orai(amount: u128) -> Coins {
        Coins::single("orai", amount).unwrap()
    }

    fn snapshot(b: u8, power: i64) -> ValidatorSnapshot {
        ValidatorSnapshot {
            address: addr(b),
            voting_power: power,
            status: ValidatorStatus::Active,
        }
    }

    fn result(provider: u8, fee: u128) -> DatasourceResult {
        DatasourceResult::new(
            EntryPoint {
                url: String::new(),
                metadata: Vec::new(),
                provider: addr(provider),
                fees: orai(fee),
            },
            Vec::new(),
            ResultStatus::Success,
        )
    }

    fn record(powers: &[i64], validator_fees: u128, providers: &[(u8, u128)]) -> RewardRecord {
        let validators: Vec<_> = powers
            .iter()
            .enumerate()
            .map(|(i, p)| snapshot(100 + i as u8, *p))
            .collect();
        let results: Vec<_> = providers.iter().map(|(p, fee)| result(*p, *fee)).collect();
        let provider_fees: u128 = providers.iter().map(|(_, fee)| fee).sum();
        RewardRecord {
            datasource_results: results,
            provider_fees: orai(provider_fees),
            validator_fees: orai(validator_fees),
            total_power: powers.iter().sum(),
            validators,
            status: RewardStatus::Accumulating,
        }
    }

    fn all_signed(record: &RewardRecord) -> Vec<VoteInfo> {
        record
            .validators
            .iter()
            .map(|v| VoteInfo::signed(v.address))
            .collect()
    }

    #[test]
    fn three_validator_shares() {
        let r = record(&[30, 25, 15], 15, &[(1, 5), (2, 5), (3, 3)]);
        let plan = compute_allocation(&r, &all_signed(&r), &RewardParams::default()).unwrap();
        let amounts: Vec<_> = plan
            .validator_payouts
            .iter()
            .map(|p| p.amount.amount_of("orai"))
            .collect();
        assert_eq!(amounts, vec![2, 1, 1]);
        assert_eq!(plan.validator_remainder, orai(11));
        assert!(plan.provider_remainder.is_zero());
    }

    #[test]
    fn power_reduction_of_one_gives_same_integer_shares() {
        let r = record(&[30, 25, 15], 15, &[]);
        let params = RewardParams {
            power_reduction: 1,
            ..RewardParams::default()
        };
        let plan = compute_allocation(&r, &all_signed(&r), &params).unwrap();
        let amounts: Vec<_> = plan
            .validator_payouts
            .iter()
            .map(|p| p.amount.amount_of("orai"))
            .collect();
        assert_eq!(amounts, vec![2, 1, 1]);
    }

    #[test]
    fn deduct_mode_pays_each_provider_its_share() {
        // Fees 5 and 3 under the default 0.4 ratio keep 3 and 2 for the
        // providers and put 2 and 1 in the validator pool
        let policy = FeeSplitPolicy::from_params(&RewardParams::default()).unwrap();
        let mut results = vec![result(1, 5), result(2, 3)];
        let mut provider_fees = Coins::new();
        let mut validator_fees = Coins::new();
        for r in &mut results {
            let split = policy.split(&r.entry_point.fees).unwrap();
            provider_fees = provider_fees.checked_add(&split.provider).unwrap();
            validator_fees = validator_fees.checked_add(&split.validator).unwrap();
            r.provider_share = split.provider;
        }
        let r = RewardRecord {
            datasource_results: results,
            provider_fees,
            validator_fees,
            validators: vec![snapshot(100, 10)],
            total_power: 10,
            status: RewardStatus::Accumulating,
        };

        let plan = compute_allocation(&r, &all_signed(&r), &RewardParams::default()).unwrap();
        let paid: Vec<_> = plan
            .provider_payouts
            .iter()
            .map(|p| (p.provider, p.amount.amount_of("orai")))
            .collect();
        assert_eq!(paid, vec![(addr(1), 3), (addr(2), 2)]);
        assert!(plan.provider_remainder.is_zero());
        assert_eq!(plan.validator_total().unwrap(), orai(3));
    }

    #[test]
    fn shares_above_the_provider_pool_are_rejected() {
        let mut r = record(&[10], 0, &[(1, 4)]);
        r.provider_fees = orai(3);
        assert_eq!(
            compute_allocation(&r, &all_signed(&r), &RewardParams::default()),
            Err(ArithmeticError::NegativeAmount)
        );
    }

    #[test]
    fn zero_total_power_skips_validators_only() {
        let r = record(&[0, 0], 10, &[(1, 4)]);
        let plan = compute_allocation(&r, &all_signed(&r), &RewardParams::default()).unwrap();
        assert_eq!(plan.skipped, Some(SkipReason::ZeroTotalPower));
        assert!(plan.validator_payouts.is_empty());
        assert_eq!(plan.provider_payouts[0].amount, orai(4));
        assert_eq!(plan.validator_remainder, orai(10));
    }

    #[test]
    fn no_signers_skips_validators_only() {
        let r = record(&[10, 20], 10, &[(1, 4)]);
        let votes: Vec<_> = r.validators.iter().map(|v| VoteInfo::absent(v.address)).collect();
        let plan = compute_allocation(&r, &votes, &RewardParams::default()).unwrap();
        assert_eq!(plan.skipped, Some(SkipReason::EmptyEligibleSet));
        assert_eq!(plan.provider_payouts.len(), 1);
    }

    #[test]
    fn payouts_are_in_address_order_regardless_of_record_order() {
        let mut r = record(&[10, 20, 30], 600, &[(9, 1), (2, 1), (5, 1)]);
        r.validators.reverse();
        let mut votes = all_signed(&r);
        votes.reverse();
        let plan = compute_allocation(&r, &votes, &RewardParams::default()).unwrap();
        let validators: Vec<_> = plan.validator_payouts.iter().map(|p| p.validator).collect();
        assert_eq!(validators, vec![addr(100), addr(101), addr(102)]);
        let providers: Vec<_> = plan.provider_payouts.iter().map(|p| p.provider).collect();
        assert_eq!(providers, vec![addr(2), addr(5), addr(9)]);
    }

    proptest! {
        #[test]
        fn never_over_credits(
            powers in proptest::collection::vec(0i64..1_000_000, 1..8),
            validator_fees in 0u128..1_000_000_000,
            fees in proptest::collection::vec((1u8..20, 0u128..1_000_000), 0..8),
            reduction in prop_oneof![Just(1u64), Just(1_000_000u64)],
        ) {
            let r = record(&powers, validator_fees, &fees);
            let params = RewardParams { power_reduction: reduction, ..RewardParams::default() };
            let plan = compute_allocation(&r, &all_signed(&r), &params).unwrap();

            let credited = plan.validator_total().unwrap().checked_add(&plan.provider_total().unwrap()).unwrap();
            let collected = r.validator_fees.checked_add(&r.provider_fees).unwrap();
            prop_assert!(collected.checked_sub(&credited).is_ok());

            // Providers are paid exactly what they were promised
            prop_assert!(plan.provider_remainder.is_zero());

            // With every slot signed, validators share one slot's worth of
            // fees less at most one unit each
            if plan.skipped.is_none() {
                let n = powers.len() as u128;
                let credited = plan.validator_total().unwrap().amount_of("orai");
                prop_assert!(credited <= validator_fees / n);
                prop_assert!(credited + n + 1 >= validator_fees / n);
            }
        }

        #[test]
        fn shares_follow_power(
            p_a in 1i64..1_000_000_000,
            p_b in 1i64..1_000_000_000,
            validator_fees in 1u128..1_000_000_000_000,
        ) {
            let r = record(&[p_a, p_b], validator_fees, &[]);
            let plan = compute_allocation(&r, &all_signed(&r), &RewardParams::default()).unwrap();
            let total = (p_a + p_b) as u128;

            // Each share is within a truncation unit of fees / 2 * p / total
            for (payout, power) in plan.validator_payouts.iter().zip([p_a, p_b]) {
                let share = payout.amount.amount_of("orai");
                let exact = validator_fees * power as u128;
                prop_assert!(share * 2 * total <= exact);
                prop_assert!((share + 2) * 2 * total > exact);
            }
        }

        #[test]
        fn deterministic(
            powers in proptest::collection::vec(1i64..1_000, 1..6),
            validator_fees in 0u128..1_000_000,
        ) {
            let r = record(&powers, validator_fees, &[(1, 7), (2, 9)]);
            let votes = all_signed(&r);
            let a = compute_allocation(&r, &votes, &RewardParams::default()).unwrap();
            let b = compute_allocation(&r.clone(), &votes, &RewardParams::default()).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
