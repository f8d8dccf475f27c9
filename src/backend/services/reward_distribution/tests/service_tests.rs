use anyhow::Result;
use mockall::mock;
use mockall::predicate::*;

use reward_distribution::{
    config::{FeeSplitMode, RewardParams},
    models::{
        coin::Coins,
        reward::{DatasourceResult, EntryPoint, RecordKey, ResultStatus},
        validator::{Address, ValidatorInfo, ValidatorStatus, VoteInfo},
    },
    repositories::{
        memory::{MemoryKvStore, MemoryLedger, MemoryValidatorSet},
        traits::{ParamsProvider, ValidatorSetProvider},
    },
    services::{allocation_service::AllocationEngine, reward_service::RewardService},
    utils::{decimal::Dec, errors::CollectionError},
};

// Mock providers
mock! {
    pub Validators {}
    impl ValidatorSetProvider for Validators {
        fn validator(&self, height: u64, address: &Address) -> Option<ValidatorInfo>;
    }
}

mock! {
    pub Params {}
    impl ParamsProvider for Params {
        fn reward_params(&self) -> RewardParams;
    }
}

// Test helpers
fn addr(b: u8) -> Address {
    Address::repeat_byte(b)
}

fn orai(amount: u128) -> Coins {
    Coins::single("orai", amount).unwrap()
}

fn info(power: i64) -> ValidatorInfo {
    ValidatorInfo {
        voting_power: power,
        commission_rate: "0.05".parse().unwrap(),
        status: ValidatorStatus::Active,
    }
}

fn result(provider: u8, fee: u128) -> DatasourceResult {
    DatasourceResult::new(
        EntryPoint {
            url: "https://prices.example/orai".to_string(),
            metadata: Vec::new(),
            provider: addr(provider),
            fees: orai(fee),
        },
        b"0.85".to_vec(),
        ResultStatus::Success,
    )
}

fn params_with_ratio(ratio: &str) -> RewardParams {
    RewardParams {
        validator_reward_ratio: ratio.parse().unwrap(),
        fee_split_mode: FeeSplitMode::Deduct,
        ..RewardParams::default()
    }
}

const KEY: RecordKey = RecordKey(5);

#[test]
fn test_report_snapshots_validator_at_height() -> Result<()> {
    let mut validators = MockValidators::new();
    validators
        .expect_validator()
        .with(eq(42u64), eq(addr(1)))
        .times(1)
        .returning(|_, _| Some(info(30)));

    let mut params = MockParams::new();
    params
        .expect_reward_params()
        .returning(RewardParams::default);

    let service = RewardService::new(validators, params);
    let mut store = MemoryKvStore::new();
    service.begin_collection(&mut store, KEY)?;
    let split = service.record_report(&mut store, KEY, 42, &addr(1), vec![result(9, 10)])?;

    assert_eq!(split.validator, orai(4));
    assert_eq!(split.provider, orai(6));

    let record = service.record(&mut store, KEY)?.unwrap();
    assert_eq!(record.total_power, 30);
    assert_eq!(record.validators[0].voting_power, 30);
    assert_eq!(record.datasource_results.len(), 1);
    Ok(())
}

#[test]
fn test_params_are_read_on_every_report() -> Result<()> {
    let mut validators = MockValidators::new();
    validators
        .expect_validator()
        .returning(|_, _| Some(info(10)));

    // Governance changes the ratio between the two reports
    let mut params = MockParams::new();
    let mut seq = mockall::Sequence::new();
    params
        .expect_reward_params()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| params_with_ratio("0.5"));
    params
        .expect_reward_params()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| params_with_ratio("0.1"));

    let service = RewardService::new(validators, params);
    let mut store = MemoryKvStore::new();
    service.begin_collection(&mut store, KEY)?;
    service.record_report(&mut store, KEY, 1, &addr(1), vec![result(9, 10)])?;
    service.record_report(&mut store, KEY, 1, &addr(2), vec![result(9, 10)])?;

    let record = service.record(&mut store, KEY)?.unwrap();
    assert_eq!(record.validator_fees, orai(6));
    assert_eq!(record.provider_fees, orai(14));
    let shares: Vec<_> = record
        .datasource_results
        .iter()
        .map(|r| r.provider_share.clone())
        .collect();
    assert_eq!(shares, vec![orai(5), orai(9)]);
    Ok(())
}

#[test]
fn test_unknown_validator_is_rejected() -> Result<()> {
    let mut validators = MockValidators::new();
    validators.expect_validator().returning(|_, _| None);
    let mut params = MockParams::new();
    params.expect_reward_params().never();

    let service = RewardService::new(validators, params);
    let mut store = MemoryKvStore::new();
    service.begin_collection(&mut store, KEY)?;

    let err = service
        .record_report(&mut store, KEY, 7, &addr(3), vec![result(9, 1)])
        .unwrap_err();
    assert_eq!(err, CollectionError::UnknownValidator(addr(3), 7));
    Ok(())
}

#[test]
fn test_negative_power_is_rejected() -> Result<()> {
    let mut validators = MockValidators::new();
    validators.expect_validator().returning(|_, _| Some(info(-1)));
    let params = RewardParams::default();

    let service = RewardService::new(validators, &params);
    let mut store = MemoryKvStore::new();
    service.begin_collection(&mut store, KEY)?;

    let err = service
        .record_report(&mut store, KEY, 1, &addr(1), Vec::new())
        .unwrap_err();
    assert_eq!(err, CollectionError::NegativeVotingPower(addr(1)));
    Ok(())
}

#[test]
fn test_invalid_params_are_rejected() -> Result<()> {
    let mut validators = MockValidators::new();
    validators.expect_validator().returning(|_, _| Some(info(1)));
    let mut params = MockParams::new();
    params.expect_reward_params().returning(|| RewardParams {
        power_reduction: 0,
        ..RewardParams::default()
    });

    let service = RewardService::new(validators, params);
    let mut store = MemoryKvStore::new();
    service.begin_collection(&mut store, KEY)?;

    let err = service
        .record_report(&mut store, KEY, 1, &addr(1), vec![result(9, 1)])
        .unwrap_err();
    assert!(matches!(err, CollectionError::Params(_)));
    Ok(())
}

#[test]
fn test_lifecycle_errors() -> Result<()> {
    let mut set = MemoryValidatorSet::new();
    set.set_validator(1, addr(1), info(10));
    let params = RewardParams::default();
    let service = RewardService::new(&set, &params);
    let mut store = MemoryKvStore::new();

    assert_eq!(
        service
            .record_report(&mut store, KEY, 1, &addr(1), Vec::new())
            .unwrap_err(),
        CollectionError::RecordNotFound(KEY)
    );

    service.begin_collection(&mut store, KEY)?;
    assert_eq!(
        service.begin_collection(&mut store, KEY).unwrap_err(),
        CollectionError::RecordExists(KEY)
    );

    service.record_report(&mut store, KEY, 1, &addr(1), vec![result(9, 5)])?;
    assert_eq!(
        service
            .record_report(&mut store, KEY, 1, &addr(1), vec![result(9, 5)])
            .unwrap_err(),
        CollectionError::DuplicateValidator(addr(1))
    );

    let mut ledger = MemoryLedger::new();
    AllocationEngine::new(&params).allocate_tokens(
        &mut store,
        &mut ledger,
        &[VoteInfo::signed(addr(1))],
        KEY,
    )?;

    set.set_validator(2, addr(2), info(10));
    let service = RewardService::new(&set, &params);
    assert_eq!(
        service
            .record_report(&mut store, KEY, 2, &addr(2), Vec::new())
            .unwrap_err(),
        CollectionError::RecordFinalized(KEY)
    );
    Ok(())
}

#[test]
fn test_later_power_changes_do_not_leak_into_record() -> Result<()> {
    let mut set = MemoryValidatorSet::new();
    set.set_validator(1, addr(1), info(10));
    set.set_validator(1, addr(2), info(20));
    let params = RewardParams::default();
    let mut store = MemoryKvStore::new();

    {
        let service = RewardService::new(&set, &params);
        service.begin_collection(&mut store, KEY)?;
        service.record_report(&mut store, KEY, 1, &addr(1), vec![result(9, 5)])?;
    }

    // addr(1) is slashed after reporting
    set.set_validator(2, addr(1), info(1));
    let service = RewardService::new(&set, &params);
    service.record_report(&mut store, KEY, 2, &addr(2), vec![result(9, 5)])?;

    let record = service.record(&mut store, KEY)?.unwrap();
    assert_eq!(record.validators[0].voting_power, 10);
    assert_eq!(record.total_power, 30);
    assert!(record.validators.iter().all(|v| v.status == ValidatorStatus::Active));

    let commission: Dec = "0.05".parse()?;
    assert_eq!(set.validator(2, &addr(2)).unwrap().commission_rate, commission);
    Ok(())
}
