//! The staking pool: stake ledger, reserves and yield engine behind one
//! object.
//!
//! Every mutating method either commits fully or returns an error having
//! changed nothing. External transfers are issued with the ledger in a
//! settled state: deposits pull first and commit after, withdrawals commit
//! first and pay out after (undoing the commit if the payout fails).

use tracing::{info, instrument, warn};

use crate::config::PoolConfig;
use crate::error::{Result, StakingError};
use crate::external::{AssetLedger, Clock};
use crate::ledger::{
    AccountId, Amount, LedgerEvent, StakeLedger, StakeRecord, Timestamp, Transaction,
};
use crate::reserve::AssetPool;
use crate::snapshot::{compute_state_root, PoolSnapshot};
use crate::yields::{PoolData, Yield, YieldEngine, YieldPoint};

pub struct StakingPool<A, C> {
    config: PoolConfig,
    ledger: StakeLedger,
    reserve: AssetPool,
    creation_time: Timestamp,
    events: Vec<LedgerEvent>,
    asset: A,
    clock: C,
    /// Set while the asset ledger is being called. An owned collaborator
    /// reached through `&mut self` cannot call back in, so this only trips
    /// for ledgers that share state with the pool.
    entered: bool,
}

impl<A: AssetLedger, C: Clock> StakingPool<A, C> {
    pub fn new(owner: impl Into<AccountId>, config: PoolConfig, asset: A, clock: C) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StakingError::InvalidConfig(e.to_string()))?;
        let owner = owner.into();
        let creation_time = clock.now();
        info!(%owner, creation_time, "staking pool created");
        Ok(Self {
            config,
            ledger: StakeLedger::new(),
            reserve: AssetPool::new(owner),
            creation_time,
            events: Vec::new(),
            asset,
            clock,
            entered: false,
        })
    }

    /// Rebuild a pool from a snapshot after verifying its root and ledger
    /// invariants.
    pub fn restore(snapshot: PoolSnapshot, config: PoolConfig, asset: A, clock: C) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StakingError::InvalidConfig(e.to_string()))?;
        if snapshot.recompute_root() != snapshot.state_root {
            return Err(StakingError::CorruptSnapshot("state root mismatch".into()));
        }
        let ledger = StakeLedger::from_records(snapshot.records, snapshot.total_staked)?;
        let latest = ledger
            .records()
            .values()
            .filter_map(StakeRecord::last_timestamp)
            .fold(snapshot.creation_time, Timestamp::max);
        let now = clock.now();
        if now < latest {
            warn!(now, latest, "clock is behind the restored history");
            return Err(StakingError::CorruptSnapshot(format!(
                "clock at {now} is behind recorded history at {latest}"
            )));
        }
        info!(
            owner = %snapshot.owner,
            participants = ledger.records().len(),
            "staking pool restored"
        );
        Ok(Self {
            config,
            ledger,
            reserve: AssetPool::from_parts(
                snapshot.owner,
                snapshot.total_assets,
                snapshot.total_carbon_credits,
            ),
            creation_time: snapshot.creation_time,
            events: snapshot.events,
            asset,
            clock,
            entered: false,
        })
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.entered {
            warn!("rejected re-entrant call");
            return Err(StakingError::Reentrant);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn stake(&mut self, participant: &str, amount: Amount) -> Result<()> {
        self.ensure_idle()?;
        if amount == 0 {
            warn!("stake of zero rejected");
            return Err(StakingError::InvalidAmount);
        }
        // balances are bounded by the total, so this covers the record too
        self.ledger
            .total_staked()
            .checked_add(amount)
            .ok_or(StakingError::ArithmeticOverflow)?;

        self.entered = true;
        let pulled = self.asset.transfer_into(participant, amount);
        self.entered = false;
        if let Err(err) = pulled {
            warn!(%err, "stake pull failed");
            return Err(err.into());
        }

        let now = self.clock.now();
        self.ledger.credit(&participant.to_string(), amount, now)?;
        self.events.push(LedgerEvent::Staked {
            participant: participant.to_string(),
            amount,
        });
        info!(now, total_staked = self.ledger.total_staked(), "staked");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn withdraw(&mut self, participant: &str, amount: Amount) -> Result<()> {
        self.ensure_idle()?;
        let now = self.clock.now();
        if let Err(err) = self.ledger.debit(&participant.to_string(), amount, now) {
            warn!(%err, "withdraw rejected");
            return Err(err);
        }

        self.entered = true;
        let paid = self.asset.transfer_out_of(participant, amount);
        self.entered = false;
        if let Err(err) = paid {
            self.ledger.rollback_debit(participant);
            warn!(%err, "withdraw payout failed, ledger restored");
            return Err(err.into());
        }

        self.events.push(LedgerEvent::Withdrawn {
            participant: participant.to_string(),
            amount,
        });
        info!(now, total_staked = self.ledger.total_staked(), "withdrawn");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn add_assets(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_idle()?;
        if let Err(err) = self.reserve.add_assets(caller, amount) {
            warn!(%err, "add_assets rejected");
            return Err(err);
        }
        self.events.push(LedgerEvent::AssetsAdded { amount });
        info!(total_assets = self.reserve.total_assets(), "assets added");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove_assets(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_idle()?;
        if let Err(err) = self.reserve.remove_assets(caller, amount) {
            warn!(%err, "remove_assets rejected");
            return Err(err);
        }
        self.events.push(LedgerEvent::AssetsRemoved { amount });
        info!(total_assets = self.reserve.total_assets(), "assets removed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn add_carbon_credits(&mut self, caller: &str, amount: Amount) -> Result<()> {
        self.ensure_idle()?;
        if let Err(err) = self.reserve.add_carbon_credits(caller, amount) {
            warn!(%err, "add_carbon_credits rejected");
            return Err(err);
        }
        self.events.push(LedgerEvent::CarbonCreditsAdded { amount });
        info!(
            total_carbon_credits = self.reserve.total_carbon_credits(),
            "carbon credits added"
        );
        Ok(())
    }

    pub fn calculate_stake_yield(&self, participant: &str) -> Result<Yield> {
        YieldEngine::new(&self.config).stake_yield(self.ledger.record(participant), self.clock.now())
    }

    pub fn get_yields(&self) -> Result<Vec<YieldPoint>> {
        YieldEngine::new(&self.config).curve()
    }

    pub fn get_pool_data(&self, participant: &str) -> Result<PoolData> {
        YieldEngine::new(&self.config).pool_data(
            &self.ledger,
            &self.reserve,
            participant,
            self.clock.now(),
        )
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let totals = [
            self.ledger.total_staked(),
            self.reserve.total_assets(),
            self.reserve.total_carbon_credits(),
        ];
        PoolSnapshot {
            owner: self.reserve.owner().clone(),
            creation_time: self.creation_time,
            total_staked: totals[0],
            total_assets: totals[1],
            total_carbon_credits: totals[2],
            records: self.ledger.records().clone(),
            events: self.events.clone(),
            state_root: compute_state_root(
                self.reserve.owner(),
                self.creation_time,
                totals,
                self.ledger.records(),
                &self.events,
            ),
        }
    }
}

impl<A, C> StakingPool<A, C> {
    pub fn total_staked(&self) -> Amount {
        self.ledger.total_staked()
    }

    pub fn total_assets(&self) -> Amount {
        self.reserve.total_assets()
    }

    pub fn total_carbon_credits(&self) -> Amount {
        self.reserve.total_carbon_credits()
    }

    pub fn owner(&self) -> &AccountId {
        self.reserve.owner()
    }

    pub fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn get_stake(&self, participant: &str) -> Option<&StakeRecord> {
        self.ledger.record(participant)
    }

    pub fn balance_of(&self, participant: &str) -> Amount {
        self.ledger.balance_of(participant)
    }

    pub fn get_transactions(&self, participant: &str) -> &[Transaction] {
        self.ledger
            .record(participant)
            .map(|r| r.transactions.as_slice())
            .unwrap_or_default()
    }

    pub fn participants(&self) -> impl Iterator<Item = &AccountId> {
        self.ledger.records().keys()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn asset(&self) -> &A {
        &self.asset
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
