use std::collections::BTreeMap;

use tracing::warn;

use crate::models::coin::Coins;
use crate::models::validator::Address;
use crate::repositories::traits::{KvStore, Ledger, LedgerBatch};
use crate::utils::errors::LedgerError;

/// Write buffer over a parent store. Reads see buffered writes first;
/// nothing reaches the parent until `commit`.
pub struct CacheKvStore<'a, S: KvStore> {
    parent: &'a mut S,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a, S: KvStore> CacheKvStore<'a, S> {
    pub fn new(parent: &'a mut S) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    pub fn commit(self) {
        let CacheKvStore { parent, writes } = self;
        for (key, value) in writes {
            parent.set(&key, value);
        }
    }
}

impl<S: KvStore> KvStore for CacheKvStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => Some(value.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key.to_vec(), value);
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.scan_prefix(prefix).into_iter().collect();
        for (key, value) in self.writes.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            merged.insert(key.clone(), value.clone());
        }
        merged.into_iter().collect()
    }
}

/// Buffered ledger credits. Overflow is checked against the parent's
/// balance at credit time, and `commit` hands the parent the whole batch in
/// one `apply_batch` call.
pub struct LedgerCache<'a, L: Ledger> {
    parent: &'a mut L,
    pending: LedgerBatch,
}

impl<'a, L: Ledger> LedgerCache<'a, L> {
    pub fn new(parent: &'a mut L) -> Self {
        Self {
            parent,
            pending: LedgerBatch::default(),
        }
    }

    pub fn commit(self) -> Result<(), LedgerError> {
        let LedgerCache { parent, pending } = self;
        if pending.is_empty() {
            return Ok(());
        }
        parent.apply_batch(&pending)
    }
}

fn buffer(
    pending: &mut BTreeMap<Address, Coins>,
    committed: Coins,
    account: &Address,
    coins: &Coins,
) -> Result<(), LedgerError> {
    let overflow = |_| LedgerError::BalanceOverflow(*account);
    let next = pending
        .get(account)
        .cloned()
        .unwrap_or_default()
        .checked_add(coins)
        .map_err(overflow)?;
    committed.checked_add(&next).map_err(overflow)?;
    pending.insert(*account, next);
    Ok(())
}

/// Committed plus pending amounts for a read, clamped at `u128::MAX`.
/// Buffering rejects overflowing sums, so a clamp means the parent changed
/// underneath the cache.
fn combined(
    committed: Coins,
    pending: &Coins,
    book: &'static str,
    account: Option<&Address>,
) -> Coins {
    let (sum, clamped) = committed.saturating_add(pending);
    if clamped {
        warn!(book, account = ?account, "ledger read overflowed, amount clamped to u128::MAX");
    }
    sum
}

impl<L: Ledger> Ledger for LedgerCache<'_, L> {
    fn credit(&mut self, account: &Address, coins: &Coins) -> Result<(), LedgerError> {
        let committed = self.parent.balance(account);
        buffer(&mut self.pending.balances, committed, account, coins)
    }

    fn credit_outstanding_rewards(
        &mut self,
        validator: &Address,
        coins: &Coins,
    ) -> Result<(), LedgerError> {
        let committed = self.parent.outstanding_rewards(validator);
        buffer(&mut self.pending.outstanding, committed, validator, coins)
    }

    fn fund_community_pool(&mut self, coins: &Coins) -> Result<(), LedgerError> {
        let next = self
            .pending
            .community_pool
            .checked_add(coins)
            .map_err(|_| LedgerError::CommunityPoolOverflow)?;
        self.parent
            .community_pool()
            .checked_add(&next)
            .map_err(|_| LedgerError::CommunityPoolOverflow)?;
        self.pending.community_pool = next;
        Ok(())
    }

    fn apply_batch(&mut self, batch: &LedgerBatch) -> Result<(), LedgerError> {
        let mut staged = self.pending.clone();
        for (account, coins) in &batch.balances {
            buffer(&mut staged.balances, self.parent.balance(account), account, coins)?;
        }
        for (validator, coins) in &batch.outstanding {
            let committed = self.parent.outstanding_rewards(validator);
            buffer(&mut staged.outstanding, committed, validator, coins)?;
        }
        if !batch.community_pool.is_zero() {
            let next = staged
                .community_pool
                .checked_add(&batch.community_pool)
                .map_err(|_| LedgerError::CommunityPoolOverflow)?;
            self.parent
                .community_pool()
                .checked_add(&next)
                .map_err(|_| LedgerError::CommunityPoolOverflow)?;
            staged.community_pool = next;
        }
        self.pending = staged;
        Ok(())
    }

    fn balance(&self, account: &Address) -> Coins {
        let pending = self.pending.balances.get(account).cloned().unwrap_or_default();
        combined(self.parent.balance(account), &pending, "balances", Some(account))
    }

    fn outstanding_rewards(&self, validator: &Address) -> Coins {
        let pending = self.pending.outstanding.get(validator).cloned().unwrap_or_default();
        combined(
            self.parent.outstanding_rewards(validator),
            &pending,
            "outstanding",
            Some(validator),
        )
    }

    fn community_pool(&self) -> Coins {
        combined(
            self.parent.community_pool(),
            &self.pending.community_pool,
            "community_pool",
            None,
        )
    }
}

/// Transaction manager for one block-processing step
pub struct TransactionManager;

impl TransactionManager {
    /// Execute a function within a transaction over the store and ledger.
    /// If the function returns an error, every buffered write is discarded;
    /// otherwise store writes and ledger credits are committed together.
    pub fn with_transaction<S, L, T, E, F>(store: &mut S, ledger: &mut L, f: F) -> Result<T, E>
    where
        S: KvStore,
        L: Ledger,
        E: From<LedgerError>,
        F: FnOnce(&mut CacheKvStore<'_, S>, &mut LedgerCache<'_, L>) -> Result<T, E>,
    {
        let mut store_tx = CacheKvStore::new(store);
        let mut ledger_tx = LedgerCache::new(ledger);

        let result = f(&mut store_tx, &mut ledger_tx)?;

        // The ledger applies the batch atomically, so a rejected batch
        // leaves both the ledger and the store untouched
        ledger_tx.commit()?;
        store_tx.commit();
        Ok(result)
    }
}
