//! Collaborators the pool calls out to: the asset ledger that actually moves
//! tokens, and the clock.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::ledger::{AccountId, Amount, Timestamp};

/// External fungible-asset ledger.
///
/// Implementations either move the full amount or return an error having
/// moved nothing.
pub trait AssetLedger {
    /// Pull `amount` from `from` into pool custody.
    fn transfer_into(&mut self, from: &str, amount: Amount) -> Result<(), TransferError>;

    /// Push `amount` out of pool custody to `to`.
    fn transfer_out_of(&mut self, to: &str, amount: Amount) -> Result<(), TransferError>;
}

pub trait Clock {
    /// Seconds; never decreases between calls.
    fn now(&self) -> Timestamp;
}

/// Account-balance token ledger kept in memory, with a dedicated custody
/// account standing in for the pool's holdings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InMemoryAssetLedger {
    balances: BTreeMap<AccountId, Amount>,
    custody: Amount,
}

impl InMemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, account: &str, amount: Amount) {
        let balance = self.balances.entry(account.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn custody(&self) -> Amount {
        self.custody
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn transfer_into(&mut self, from: &str, amount: Amount) -> Result<(), TransferError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                account: from.to_string(),
                available,
                requested: amount,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("custody overflow".into()))?;
        self.balances.insert(from.to_string(), available - amount);
        self.custody = custody;
        Ok(())
    }

    fn transfer_out_of(&mut self, to: &str, amount: Amount) -> Result<(), TransferError> {
        if self.custody < amount {
            return Err(TransferError::InsufficientFunds {
                account: "custody".into(),
                available: self.custody,
                requested: amount,
            });
        }
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected(format!("balance overflow for {to}")))?;
        self.custody -= amount;
        self.balances.insert(to.to_string(), balance);
        Ok(())
    }
}

/// Settable clock; clones share the same time so a test can keep a handle
/// while the pool owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn advance(&self, seconds: u64) {
        self.now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(seconds))
            })
            .ok();
    }

    /// Moves the clock to `at`; earlier values are ignored.
    pub fn set(&self, at: Timestamp) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
