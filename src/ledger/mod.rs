use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StakingError};

pub type AccountId = String;
pub type Amount = u64;
pub type Timestamp = u64;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Stake,
    Withdraw,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub amount: Amount,
    pub timestamp: Timestamp,
    pub kind: TransactionKind,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StakeRecord {
    pub balance: Amount,
    pub transactions: Vec<Transaction>,
}

impl StakeRecord {
    /// Balance implied by replaying the history, `None` if the history would
    /// ever drive the balance negative or past `u64::MAX`.
    pub fn replayed_balance(&self) -> Option<Amount> {
        self.transactions
            .iter()
            .try_fold(0u64, |acc, tx| match tx.kind {
                TransactionKind::Stake => acc.checked_add(tx.amount),
                TransactionKind::Withdraw => acc.checked_sub(tx.amount),
            })
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.transactions.last().map(|tx| tx.timestamp)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Staked {
        participant: AccountId,
        amount: Amount,
    },
    Withdrawn {
        participant: AccountId,
        amount: Amount,
    },
    AssetsAdded {
        amount: Amount,
    },
    AssetsRemoved {
        amount: Amount,
    },
    CarbonCreditsAdded {
        amount: Amount,
    },
}

/// Per-participant balances and histories plus the pool-wide staked total.
///
/// `credit` and `debit` are the only writers; both validate before touching
/// anything so a rejected call leaves the ledger as it was.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StakeLedger {
    records: BTreeMap<AccountId, StakeRecord>,
    total_staked: Amount,
}

impl StakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted records, checking every record against
    /// its own history and the staked total against the sum of balances.
    pub fn from_records(
        records: BTreeMap<AccountId, StakeRecord>,
        total_staked: Amount,
    ) -> Result<Self> {
        let mut sum: Amount = 0;
        for (participant, record) in &records {
            if record.replayed_balance() != Some(record.balance) {
                return Err(StakingError::CorruptSnapshot(format!(
                    "balance of {participant} does not match its history"
                )));
            }
            if record
                .transactions
                .windows(2)
                .any(|pair| pair[1].timestamp < pair[0].timestamp)
            {
                return Err(StakingError::CorruptSnapshot(format!(
                    "history of {participant} is not time ordered"
                )));
            }
            if record.transactions.iter().any(|tx| tx.amount == 0) {
                return Err(StakingError::CorruptSnapshot(format!(
                    "history of {participant} contains a zero amount"
                )));
            }
            sum = sum
                .checked_add(record.balance)
                .ok_or(StakingError::ArithmeticOverflow)?;
        }
        if sum != total_staked {
            return Err(StakingError::CorruptSnapshot(format!(
                "total staked {total_staked} differs from sum of balances {sum}"
            )));
        }
        Ok(Self {
            records,
            total_staked,
        })
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn record(&self, participant: &str) -> Option<&StakeRecord> {
        self.records.get(participant)
    }

    pub fn records(&self) -> &BTreeMap<AccountId, StakeRecord> {
        &self.records
    }

    pub fn balance_of(&self, participant: &str) -> Amount {
        self.records.get(participant).map_or(0, |r| r.balance)
    }

    pub fn credit(
        &mut self,
        participant: &AccountId,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(StakingError::ArithmeticOverflow)?;
        let balance = self
            .balance_of(participant)
            .checked_add(amount)
            .ok_or(StakingError::ArithmeticOverflow)?;

        let record = self
            .records
            .entry(participant.clone())
            .or_insert_with(StakeRecord::default);
        record.balance = balance;
        record.transactions.push(Transaction {
            amount,
            timestamp,
            kind: TransactionKind::Stake,
        });
        self.total_staked = total;
        Ok(())
    }

    pub fn debit(
        &mut self,
        participant: &AccountId,
        amount: Amount,
        timestamp: Timestamp,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let balance = self.balance_of(participant);
        if amount > balance {
            return Err(StakingError::InsufficientBalance {
                participant: participant.clone(),
                balance,
                requested: amount,
            });
        }
        let record = self
            .records
            .get_mut(participant)
            .ok_or_else(|| StakingError::InsufficientBalance {
                participant: participant.clone(),
                balance: 0,
                requested: amount,
            })?;
        record.balance -= amount;
        record.transactions.push(Transaction {
            amount,
            timestamp,
            kind: TransactionKind::Withdraw,
        });
        self.total_staked -= amount;
        Ok(())
    }

    /// Undo the most recent successful `debit` for `participant`.
    pub(crate) fn rollback_debit(&mut self, participant: &str) {
        let Some(record) = self.records.get_mut(participant) else {
            return;
        };
        if let Some(tx) = record.transactions.last() {
            if tx.kind == TransactionKind::Withdraw {
                let amount = tx.amount;
                record.transactions.pop();
                record.balance += amount;
                self.total_staked += amount;
            }
        }
    }
}
