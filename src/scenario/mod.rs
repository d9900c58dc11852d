//! Scripted and randomized drivers for a pool backed by the in-memory asset
//! ledger and a manual clock.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PoolConfig;
use crate::error::StakingError;
use crate::external::{Clock, InMemoryAssetLedger, ManualClock};
use crate::ledger::{AccountId, Amount, Timestamp, Transaction};
use crate::pool::StakingPool;
use crate::snapshot::PoolSnapshot;
use crate::yields::{PoolData, YieldPoint};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub owner: AccountId,
    #[serde(default)]
    pub start: Timestamp,
    /// External token balances minted before the first step.
    #[serde(default)]
    pub accounts: BTreeMap<AccountId, Amount>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Advance { seconds: u64 },
    Stake { participant: AccountId, amount: Amount },
    Withdraw { participant: AccountId, amount: Amount },
    AddAssets { caller: AccountId, amount: Amount },
    RemoveAssets { caller: AccountId, amount: Amount },
    AddCarbonCredits { caller: AccountId, amount: Amount },
    Query { participant: AccountId },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Advance { .. } => "advance",
            Step::Stake { .. } => "stake",
            Step::Withdraw { .. } => "withdraw",
            Step::AddAssets { .. } => "add_assets",
            Step::RemoveAssets { .. } => "remove_assets",
            Step::AddCarbonCredits { .. } => "add_carbon_credits",
            Step::Query { .. } => "query",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub index: usize,
    pub op: String,
    pub at: Timestamp,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub index: usize,
    pub participant: AccountId,
    pub at: Timestamp,
    pub pool_data: PoolData,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub outcomes: Vec<StepOutcome>,
    pub queries: Vec<QueryResult>,
    pub curve: Vec<YieldPoint>,
    pub external_balances: BTreeMap<AccountId, Amount>,
    pub snapshot: PoolSnapshot,
}

/// Replays `scenario` step by step. A rejected step is recorded in its
/// outcome and the replay carries on, the way a reverted call would.
pub fn replay(scenario: &Scenario, config: PoolConfig) -> Result<Report, StakingError> {
    let mut asset = InMemoryAssetLedger::new();
    for (account, amount) in &scenario.accounts {
        asset.mint(account, *amount);
    }
    let clock = ManualClock::new(scenario.start);
    let mut pool = StakingPool::new(scenario.owner.clone(), config, asset, clock.clone())?;

    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    let mut queries = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        let result = match step {
            Step::Advance { seconds } => {
                clock.advance(*seconds);
                Ok(())
            }
            Step::Stake {
                participant,
                amount,
            } => pool.stake(participant, *amount),
            Step::Withdraw {
                participant,
                amount,
            } => pool.withdraw(participant, *amount),
            Step::AddAssets { caller, amount } => pool.add_assets(caller, *amount),
            Step::RemoveAssets { caller, amount } => pool.remove_assets(caller, *amount),
            Step::AddCarbonCredits { caller, amount } => pool.add_carbon_credits(caller, *amount),
            Step::Query { participant } => pool.get_pool_data(participant).map(|pool_data| {
                queries.push(QueryResult {
                    index,
                    participant: participant.clone(),
                    at: clock.now(),
                    pool_data,
                    transactions: pool.get_transactions(participant).to_vec(),
                });
            }),
        };
        debug!(index, op = step.name(), ok = result.is_ok(), "scenario step");
        outcomes.push(StepOutcome {
            index,
            op: step.name().to_string(),
            at: clock.now(),
            error: result.err().map(|e| e.to_string()),
        });
    }

    let external_balances = scenario
        .accounts
        .keys()
        .chain(pool.participants())
        .map(|account| (account.clone(), pool.asset().balance_of(account)))
        .collect();

    Ok(Report {
        outcomes,
        queries,
        curve: pool.get_yields()?,
        external_balances,
        snapshot: pool.snapshot(),
    })
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationParams {
    pub participants: usize,
    pub steps: usize,
    pub seed: u64,
    pub initial_balance: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationSummary {
    pub params: SimulationParams,
    pub committed: usize,
    pub rejected: usize,
    pub total_staked: Amount,
    pub total_assets: Amount,
    pub custody: Amount,
    pub violations: Vec<String>,
    pub state_root: String,
}

/// Drives a seeded random mix of operations and then checks the ledger
/// invariants against the pool and the asset ledger.
pub fn simulate(params: SimulationParams, config: PoolConfig) -> Result<SimulationSummary, StakingError> {
    const OWNER: &str = "owner";
    let mut rng = StdRng::seed_from_u64(params.seed);
    let names: Vec<AccountId> = (0..params.participants.max(1))
        .map(|idx| format!("participant-{idx}"))
        .collect();

    let mut asset = InMemoryAssetLedger::new();
    for name in &names {
        asset.mint(name, params.initial_balance);
    }
    let clock = ManualClock::new(0);
    let mut pool = StakingPool::new(OWNER, config, asset, clock.clone())?;

    let max_amount = (params.initial_balance / 4).max(1);
    let (mut committed, mut rejected) = (0usize, 0usize);
    for _ in 0..params.steps {
        let who = &names[rng.gen_range(0..names.len())];
        let amount = rng.gen_range(0..=max_amount);
        let result = match rng.gen_range(0..10u8) {
            0..=3 => pool.stake(who, amount),
            4..=6 => pool.withdraw(who, amount),
            7 => pool.add_assets(OWNER, amount),
            8 => pool.remove_assets(if rng.gen_bool(0.9) { OWNER } else { who.as_str() }, amount),
            _ => {
                clock.advance(rng.gen_range(0..3 * pool.config().seconds_per_day));
                Ok(())
            }
        };
        match result {
            Ok(()) => committed += 1,
            Err(_) => rejected += 1,
        }
    }

    let mut violations = Vec::new();
    let mut sum: Amount = 0;
    for name in pool.participants() {
        let Some(record) = pool.get_stake(name) else {
            continue;
        };
        if record.replayed_balance() != Some(record.balance) {
            violations.push(format!("{name}: balance differs from history"));
        }
        if record
            .transactions
            .windows(2)
            .any(|w| w[1].timestamp < w[0].timestamp)
        {
            violations.push(format!("{name}: history out of order"));
        }
        if let Err(err) = pool.calculate_stake_yield(name) {
            violations.push(format!("{name}: yield failed: {err}"));
        }
        sum = sum.saturating_add(record.balance);
    }
    if sum != pool.total_staked() {
        violations.push(format!(
            "total staked {} differs from sum of balances {sum}",
            pool.total_staked()
        ));
    }
    if pool.asset().custody() != pool.total_staked() {
        violations.push(format!(
            "custody {} differs from total staked {}",
            pool.asset().custody(),
            pool.total_staked()
        ));
    }

    Ok(SimulationSummary {
        params,
        committed,
        rejected,
        total_staked: pool.total_staked(),
        total_assets: pool.total_assets(),
        custody: pool.asset().custody(),
        violations,
        state_root: hex::encode(pool.snapshot().state_root),
    })
}
