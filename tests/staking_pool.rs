use proptest::prelude::*;

use staking_pool::{
    external::{Clock, InMemoryAssetLedger, ManualClock},
    ledger::{LedgerEvent, TransactionKind},
    AccrualBasis, DayRounding, PoolConfig, StakingError, StakingPool,
};

const DAY: u64 = 86_400;

type Pool = StakingPool<InMemoryAssetLedger, ManualClock>;

fn deploy(config: PoolConfig) -> (Pool, ManualClock) {
    let mut asset = InMemoryAssetLedger::new();
    asset.mint("owner", 1_000_000);
    asset.mint("addr1", 1_000);
    asset.mint("addr2", 1_000);
    let clock = ManualClock::new(1_700_000_000);
    let pool = StakingPool::new("owner", config, asset, clock.clone()).unwrap();
    (pool, clock)
}

#[test]
fn adds_assets() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.add_assets("owner", 100).unwrap();
    assert_eq!(pool.total_assets(), 100);
    assert_eq!(pool.events(), &[LedgerEvent::AssetsAdded { amount: 100 }]);
}

#[test]
fn rejects_reserve_removal_beyond_total() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.add_assets("owner", 100).unwrap();
    assert!(matches!(
        pool.remove_assets("owner", 150),
        Err(StakingError::InsufficientReserve { .. })
    ));
    assert_eq!(pool.total_assets(), 100);
}

#[test]
fn stakes_and_withdraws() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.stake("addr1", 100).unwrap();
    assert_eq!(pool.get_stake("addr1").unwrap().balance, 100);
    assert_eq!(pool.asset().balance_of("addr1"), 900);
    assert_eq!(pool.get_transactions("addr1").len(), 1);
    assert_eq!(pool.total_staked(), 100);

    pool.withdraw("addr1", 50).unwrap();
    assert_eq!(pool.get_stake("addr1").unwrap().balance, 50);
    assert_eq!(pool.asset().balance_of("addr1"), 950);
    assert_eq!(pool.total_staked(), 50);

    let txs = pool.get_transactions("addr1");
    assert_eq!(txs.len(), 2);
    assert_eq!((txs[0].amount, txs[0].kind), (100, TransactionKind::Stake));
    assert_eq!((txs[1].amount, txs[1].kind), (50, TransactionKind::Withdraw));
}

#[test]
fn builds_yield_curve() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.stake("owner", 100).unwrap();
    pool.add_assets("owner", 100).unwrap();
    pool.add_assets("owner", 200).unwrap();
    assert_eq!(pool.total_assets(), 300);

    let curve = pool.get_yields().unwrap();
    assert_eq!(curve[0].cumulative_value, 0);
    assert_eq!(curve[1].cumulative_value, 27_397_260);
    assert_eq!(curve[2].cumulative_value, 82_191_780);
    assert_eq!(curve[1].rate, 273_972);
    assert_eq!(curve[2].rate, 821_917);
}

#[test]
fn first_stake_earns_one_day() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.add_assets("owner", 1_000).unwrap();
    pool.stake("owner", 100).unwrap();
    assert_eq!(pool.calculate_stake_yield("owner").unwrap(), 100 * (1_000_000_000 / 365));
}

#[test]
fn rejects_non_owner_reserve_calls() {
    let (mut pool, _) = deploy(PoolConfig::default());
    let err = pool.add_assets("addr1", 1).unwrap_err();
    assert_eq!(err.to_string(), "caller is not the owner (addr1)");
    assert!(matches!(
        pool.remove_assets("addr1", 1),
        Err(StakingError::Unauthorized { .. })
    ));
    assert_eq!(pool.total_assets(), 0);
}

#[test]
fn generates_pool_stats() {
    let (mut pool, clock) = deploy(PoolConfig::default());
    pool.add_assets("owner", 1_000).unwrap();
    pool.stake("addr1", 100).unwrap();
    clock.advance(10 * DAY);
    let stats = pool.get_pool_data("addr1").unwrap();
    assert_eq!(stats.total_assets, 1_000);
    assert_eq!(stats.total_staked, 100);
    assert_eq!(stats.daily_rate, 2_739_726);
    assert_eq!(stats.curve_index, 0);
    assert_eq!(stats.accrued_yield, 3_013_698_600);
    assert_eq!(stats.balance, 100);
}

#[test]
fn records_many_small_stakes() {
    let (mut pool, _) = deploy(PoolConfig::default());
    pool.add_carbon_credits("owner", 1_000).unwrap();
    for i in 0..10 {
        pool.stake("addr1", i + 1).unwrap();
    }
    assert_eq!(pool.get_transactions("addr1").len(), 10);
    pool.stake("owner", 100).unwrap();
    pool.stake("addr2", 100).unwrap();
    assert_eq!(pool.total_staked(), 55 + 200);
    assert_eq!(pool.total_carbon_credits(), 1_000);
}

#[test]
fn rounding_policies_at_day_boundaries() {
    let with = |rounding| PoolConfig {
        rounding,
        ..PoolConfig::default()
    };
    for (elapsed, plus_one, ceil, floor) in [
        (0, 1u128, 1u128, 1u128),
        (DAY - 1, 1, 1, 1),
        (DAY, 2, 1, 1),
        (DAY + 1, 2, 2, 1),
        (5 * DAY, 6, 5, 5),
        (5 * DAY + 7, 6, 6, 5),
    ] {
        for (rounding, days) in [
            (DayRounding::FloorPlusOne, plus_one),
            (DayRounding::CeilMinOne, ceil),
            (DayRounding::FloorMinOne, floor),
        ] {
            let (mut pool, clock) = deploy(with(rounding));
            pool.stake("addr1", 10).unwrap();
            clock.advance(elapsed);
            assert_eq!(
                pool.calculate_stake_yield("addr1").unwrap(),
                10 * 2_739_726 * days,
                "{rounding:?} after {elapsed}s"
            );
        }
    }
}

#[test]
fn exact_ten_days_credits_eleven() {
    let (mut pool, clock) = deploy(PoolConfig::default());
    pool.stake("addr1", 100).unwrap();
    clock.advance(10 * DAY);
    assert_eq!(pool.get_pool_data("addr1").unwrap().accrued_yield, 3_013_698_600);
}

/// Stake, wait a day, stake again, then sample after one and ten more days.
fn two_stake_sequence(basis: AccrualBasis) -> Vec<u128> {
    let (mut pool, clock) = deploy(PoolConfig {
        basis,
        ..PoolConfig::default()
    });
    pool.add_assets("owner", 1_000).unwrap();
    pool.stake("owner", 100).unwrap();
    let mut seen = vec![pool.calculate_stake_yield("owner").unwrap()];
    clock.advance(DAY);
    pool.stake("owner", 100).unwrap();
    seen.push(pool.calculate_stake_yield("owner").unwrap());
    clock.advance(DAY);
    seen.push(pool.calculate_stake_yield("owner").unwrap());
    clock.advance(10 * DAY);
    seen.push(pool.calculate_stake_yield("owner").unwrap());
    seen
}

#[test]
fn two_stake_sequence_per_basis() {
    // Published figures for this sequence. The last two correspond to 250 and
    // 750 unit-days, which neither basis produces.
    let published: [u128; 4] = [273_972_600, 547_945_200, 684_931_500, 2_054_794_500];
    let daily = 2_739_726u128;

    let per_tx = two_stake_sequence(AccrualBasis::PerTransaction);
    assert_eq!(
        per_tx,
        vec![100 * daily, 300 * daily, 500 * daily, 2_500 * daily]
    );
    assert_eq!(per_tx[0], published[0]);
    assert!(per_tx[1..].iter().zip(&published[1..]).all(|(a, b)| a != b));

    let balance = two_stake_sequence(AccrualBasis::CurrentBalance);
    assert_eq!(
        balance,
        vec![100 * daily, 200 * daily, 400 * daily, 2_400 * daily]
    );
    assert_eq!(balance[..2], published[..2]);
    assert!(balance[2..].iter().zip(&published[2..]).all(|(a, b)| a != b));
}

#[test]
fn accrual_bases_after_interleaved_history() {
    let run = |basis| {
        let (mut pool, clock) = deploy(PoolConfig {
            basis,
            ..PoolConfig::default()
        });
        pool.stake("addr1", 100).unwrap();
        clock.advance(4 * DAY);
        pool.stake("addr1", 60).unwrap();
        clock.advance(DAY);
        pool.withdraw("addr1", 100).unwrap();
        clock.advance(2 * DAY);
        pool.calculate_stake_yield("addr1").unwrap()
    };
    // lots: 100 @ day0, 60 @ day4; withdraw 100 drains the 60 lot and 40 of the first
    assert_eq!(run(AccrualBasis::PerTransaction), 60 * 8 * 2_739_726);
    // balance 60 re-aged from the withdrawal two days ago
    assert_eq!(run(AccrualBasis::CurrentBalance), 60 * 3 * 2_739_726);
}

#[derive(Clone, Debug)]
enum Op {
    Stake(usize, u64),
    Withdraw(usize, u64),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 0..400u64).prop_map(|(who, amount)| Op::Stake(who, amount)),
        (0..3usize, 0..400u64).prop_map(|(who, amount)| Op::Withdraw(who, amount)),
        (0..3 * DAY).prop_map(Op::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn ledger_replay_matches_successful_calls(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        const WHO: [&str; 3] = ["addr1", "addr2", "owner"];
        let (mut pool, clock) = deploy(PoolConfig::default());
        let mut expected = [0u64; 3];
        let mut calls: [Vec<(u64, TransactionKind)>; 3] = Default::default();

        for op in ops {
            match op {
                Op::Stake(who, amount) => {
                    if pool.stake(WHO[who], amount).is_ok() {
                        expected[who] += amount;
                        calls[who].push((amount, TransactionKind::Stake));
                    }
                }
                Op::Withdraw(who, amount) => {
                    let before = pool.balance_of(WHO[who]);
                    match pool.withdraw(WHO[who], amount) {
                        Ok(()) => {
                            expected[who] -= amount;
                            calls[who].push((amount, TransactionKind::Withdraw));
                        }
                        Err(_) => {
                            prop_assert_eq!(pool.balance_of(WHO[who]), before);
                        }
                    }
                }
                Op::Advance(seconds) => clock.advance(seconds),
            }
            let sum: u64 = WHO.iter().map(|w| pool.balance_of(w)).sum();
            prop_assert_eq!(pool.total_staked(), sum);
        }

        for (idx, who) in WHO.iter().enumerate() {
            prop_assert_eq!(pool.balance_of(who), expected[idx]);
            let recorded: Vec<_> = pool
                .get_transactions(who)
                .iter()
                .map(|tx| (tx.amount, tx.kind))
                .collect();
            prop_assert_eq!(&recorded, &calls[idx]);
            let times: Vec<_> = pool.get_transactions(who).iter().map(|tx| tx.timestamp).collect();
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
        prop_assert_eq!(pool.asset().custody(), pool.total_staked());
    }

    #[test]
    fn yield_never_decreases_while_history_is_unchanged(
        ops in proptest::collection::vec(op_strategy(), 1..30),
        waits in proptest::collection::vec(0..5 * DAY, 1..10),
        per_transaction in any::<bool>(),
    ) {
        let basis = if per_transaction { AccrualBasis::PerTransaction } else { AccrualBasis::CurrentBalance };
        let (mut pool, clock) = deploy(PoolConfig { basis, ..PoolConfig::default() });
        for op in ops {
            match op {
                Op::Stake(_, amount) => { let _ = pool.stake("addr1", amount); }
                Op::Withdraw(_, amount) => { let _ = pool.withdraw("addr1", amount); }
                Op::Advance(seconds) => clock.advance(seconds),
            }
        }
        let mut last = pool.calculate_stake_yield("addr1").unwrap();
        for wait in waits {
            clock.advance(wait);
            let now = pool.calculate_stake_yield("addr1").unwrap();
            prop_assert!(now >= last, "yield fell from {} to {} at {}", last, now, clock.now());
            last = now;
        }
    }

    #[test]
    fn curve_is_linear_in_days(scale in 1u128..1_000_000_000_000u128, days in 1u64..10_000) {
        let config = PoolConfig {
            annual_rate_scale: scale,
            breakpoint_days: vec![0, days, 3 * days],
            ..PoolConfig::default()
        };
        let (pool, _) = deploy(config);
        let curve = pool.get_yields().unwrap();
        prop_assert_eq!(curve[0].cumulative_value, 0);
        prop_assert_eq!(curve[1].cumulative_value, curve[2].cumulative_value / 3);
    }
}
