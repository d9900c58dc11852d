//! Read-side yield computation.
//!
//! Nothing in here mutates the ledger or the reserves; every figure is
//! derived from a record, the config and the time passed in.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AccrualBasis, PoolConfig};
use crate::error::{Result, StakingError};
use crate::ledger::{Amount, StakeLedger, StakeRecord, Timestamp, TransactionKind};
use crate::reserve::AssetPool;

pub type Yield = u128;

/// One sample of the projection curve.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct YieldPoint {
    pub days: u64,
    pub cumulative_value: Yield,
    pub rate: Yield,
}

/// Aggregated dashboard view for one participant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolData {
    pub total_assets: Amount,
    pub total_staked: Amount,
    pub daily_rate: Yield,
    /// Reserved; always zero.
    pub curve_index: u32,
    pub accrued_yield: Yield,
    pub balance: Amount,
}

#[derive(Clone, Copy, Debug)]
struct Lot {
    amount: Amount,
    opened_at: Timestamp,
}

pub struct YieldEngine<'a> {
    config: &'a PoolConfig,
}

impl<'a> YieldEngine<'a> {
    pub fn new(config: &'a PoolConfig) -> Self {
        Self { config }
    }

    pub fn daily_rate(&self) -> Yield {
        self.config.daily_rate()
    }

    fn accrual_days(&self, since: Timestamp, now: Timestamp) -> u64 {
        self.config
            .rounding
            .days(now.saturating_sub(since), self.config.seconds_per_day)
    }

    fn accrue(&self, principal: Amount, days: u64) -> Result<Yield> {
        u128::from(principal)
            .checked_mul(self.daily_rate())
            .and_then(|v| v.checked_mul(u128::from(days)))
            .ok_or(StakingError::ArithmeticOverflow)
    }

    /// Cumulative entitlement of one record as of `now`.
    pub fn stake_yield(&self, record: Option<&StakeRecord>, now: Timestamp) -> Result<Yield> {
        let Some(record) = record else {
            return Ok(0);
        };
        let total = match self.config.basis {
            AccrualBasis::PerTransaction => self.per_transaction_yield(record, now)?,
            AccrualBasis::CurrentBalance => self.current_balance_yield(record, now)?,
        };
        debug!(
            basis = ?self.config.basis,
            transactions = record.transactions.len(),
            now,
            total,
            "computed stake yield"
        );
        Ok(total)
    }

    fn per_transaction_yield(&self, record: &StakeRecord, now: Timestamp) -> Result<Yield> {
        let mut lots: Vec<Lot> = Vec::with_capacity(record.transactions.len());
        for tx in &record.transactions {
            match tx.kind {
                TransactionKind::Stake => lots.push(Lot {
                    amount: tx.amount,
                    opened_at: tx.timestamp,
                }),
                TransactionKind::Withdraw => {
                    let mut remaining = tx.amount;
                    while remaining > 0 {
                        let Some(lot) = lots.last_mut() else { break };
                        if lot.amount <= remaining {
                            remaining -= lot.amount;
                            lots.pop();
                        } else {
                            lot.amount -= remaining;
                            remaining = 0;
                        }
                    }
                }
            }
        }

        lots.iter().try_fold(0u128, |acc, lot| {
            let days = self.accrual_days(lot.opened_at, now);
            acc.checked_add(self.accrue(lot.amount, days)?)
                .ok_or(StakingError::ArithmeticOverflow)
        })
    }

    fn current_balance_yield(&self, record: &StakeRecord, now: Timestamp) -> Result<Yield> {
        match record.last_timestamp() {
            Some(since) if record.balance > 0 => {
                self.accrue(record.balance, self.accrual_days(since, now))
            }
            _ => Ok(0),
        }
    }

    /// Projection curve sampled at the configured breakpoints.
    pub fn curve(&self) -> Result<Vec<YieldPoint>> {
        let daily = self.daily_rate();
        self.config
            .breakpoint_days
            .iter()
            .map(|&days| -> Result<YieldPoint> {
                let cumulative_value = u128::from(days)
                    .checked_mul(daily)
                    .ok_or(StakingError::ArithmeticOverflow)?;
                Ok(YieldPoint {
                    days,
                    cumulative_value,
                    rate: cumulative_value / self.config.presentation_divisor,
                })
            })
            .collect()
    }

    pub fn pool_data(
        &self,
        ledger: &StakeLedger,
        reserve: &AssetPool,
        participant: &str,
        now: Timestamp,
    ) -> Result<PoolData> {
        let record = ledger.record(participant);
        Ok(PoolData {
            total_assets: reserve.total_assets(),
            total_staked: ledger.total_staked(),
            daily_rate: self.daily_rate(),
            curve_index: 0,
            accrued_yield: self.stake_yield(record, now)?,
            balance: record.map_or(0, |r| r.balance),
        })
    }
}
