use std::collections::BTreeMap;

use crate::models::coin::Coins;
use crate::models::validator::Address;
use crate::repositories::traits::{Ledger, LedgerBatch};
use crate::utils::errors::LedgerError;

/// In-memory ledger keeping plain balances, validator outstanding rewards and
/// the community pool apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLedger {
    balances: BTreeMap<Address, Coins>,
    outstanding: BTreeMap<Address, Coins>,
    community_pool: Coins,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account balance, e.g. for genesis or tests.
    pub fn with_balance(mut self, account: Address, coins: Coins) -> Self {
        self.balances.insert(account, coins);
        self
    }

    /// Sum of everything ever credited through this ledger.
    pub fn total_supply(&self) -> Option<Coins> {
        self.balances
            .values()
            .chain(self.outstanding.values())
            .try_fold(self.community_pool.clone(), |acc, coins| {
                acc.checked_add(coins).ok()
            })
    }
}

fn add_to(
    book: &mut BTreeMap<Address, Coins>,
    account: &Address,
    coins: &Coins,
) -> Result<(), LedgerError> {
    let current = book.get(account).cloned().unwrap_or_default();
    let next = current
        .checked_add(coins)
        .map_err(|_| LedgerError::BalanceOverflow(*account))?;
    book.insert(*account, next);
    Ok(())
}

impl Ledger for MemoryLedger {
    fn credit(&mut self, account: &Address, coins: &Coins) -> Result<(), LedgerError> {
        add_to(&mut self.balances, account, coins)
    }

    fn credit_outstanding_rewards(
        &mut self,
        validator: &Address,
        coins: &Coins,
    ) -> Result<(), LedgerError> {
        add_to(&mut self.outstanding, validator, coins)
    }

    fn fund_community_pool(&mut self, coins: &Coins) -> Result<(), LedgerError> {
        self.community_pool = self
            .community_pool
            .checked_add(coins)
            .map_err(|_| LedgerError::CommunityPoolOverflow)?;
        Ok(())
    }

    fn apply_batch(&mut self, batch: &LedgerBatch) -> Result<(), LedgerError> {
        // Staged on a copy so a failing credit leaves the books untouched
        let mut next = self.clone();
        for (account, coins) in &batch.balances {
            add_to(&mut next.balances, account, coins)?;
        }
        for (validator, coins) in &batch.outstanding {
            add_to(&mut next.outstanding, validator, coins)?;
        }
        if !batch.community_pool.is_zero() {
            next.fund_community_pool(&batch.community_pool)?;
        }
        *self = next;
        Ok(())
    }

    fn balance(&self, account: &Address) -> Coins {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    fn outstanding_rewards(&self, validator: &Address) -> Coins {
        self.outstanding.get(validator).cloned().unwrap_or_default()
    }

    fn community_pool(&self) -> Coins {
        self.community_pool.clone()
    }
}
