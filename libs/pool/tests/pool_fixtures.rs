//! End-to-end pool scenarios with reference values.
//!
//! The numeric expectations come from hand-derived evaluations of the cost
//! curve at the production parameters; exact assertions are used where every
//! intermediate rounds cleanly, tolerances of 1e-9 or looser elsewhere.

use proptest::prelude::*;
use std::sync::Arc;
use tidepool_pool::{
    dec, AccountId, AggregateGroup, Decimal, GroupId, InMemoryVault, ManualClock, PoolConfig,
    PoolEngine, PoolError, PoolEvent, PoolId, ReserveLedger, StaticPriceFeed, TokenId, TokenVault,
};

const POOL: PoolId = PoolId(1);
const POOL_ACCOUNT: AccountId = AccountId(100);
const ADMIN: AccountId = AccountId(1);
const USER: AccountId = AccountId(2);
const OTHER: AccountId = AccountId(3);

const DAI: TokenId = TokenId(10);
const USDC: TokenId = TokenId(11);
const USD_GROUP: GroupId = GroupId(1);

const DEADLINE: i64 = 10_000;

struct Harness {
    pool: PoolEngine,
    vault: Arc<InMemoryVault>,
    feed: Arc<StaticPriceFeed>,
}

fn harness() -> Harness {
    let feed = Arc::new(StaticPriceFeed::with_prices([
        (DAI, dec!(1)),
        (USDC, dec!(1)),
    ]));
    let vault = Arc::new(InMemoryVault::new());
    let clock = Arc::new(ManualClock::at(1_000));
    let mut pool = PoolEngine::new(
        POOL,
        POOL_ACCOUNT,
        ADMIN,
        PoolConfig::default(),
        feed.clone(),
        vault.clone(),
        clock,
    )
    .unwrap();
    pool.register_group(
        ADMIN,
        AggregateGroup {
            id: USD_GROUP,
            name: "USD-Stablecoins".to_string(),
            stable: true,
        },
    )
    .unwrap();
    pool.add_asset(
        ADMIN,
        ReserveLedger::new(DAI, 18, USD_GROUP, POOL, ADMIN).unwrap(),
    )
    .unwrap();
    pool.add_asset(
        ADMIN,
        ReserveLedger::new(USDC, 6, USD_GROUP, POOL, ADMIN).unwrap(),
    )
    .unwrap();
    vault.fund(DAI, USER, dec!(1000000));
    vault.fund(USDC, USER, dec!(1000000));
    Harness { pool, vault, feed }
}

/// Force a reserve into a given state, bypassing pricing. Mirrors what a
/// maintenance script would do through the ledger API.
fn seed_reserve(
    h: &mut Harness,
    token: TokenId,
    cash: Decimal,
    liability: Decimal,
    shares: Decimal,
    holder: AccountId,
) {
    h.vault.fund(token, POOL_ACCOUNT, cash);
    let ledger = h.pool.ledger_mut(token).unwrap();
    if !cash.is_zero() {
        ledger.add_cash(POOL, cash).unwrap();
    }
    if !liability.is_zero() {
        ledger.add_liability(POOL, liability).unwrap();
    }
    if !shares.is_zero() {
        ledger.mint(POOL, holder, shares).unwrap();
    }
}

fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn deposit_fee_applies_above_full_coverage() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(200), dec!(100), dec!(100), OTHER);

    let shares = h.pool.deposit(USER, DAI, dec!(100), USER, DEADLINE).unwrap();
    assert_close(shares, dec!(99.999781514346136200), dec!(0.000000001));

    let ledger = h.pool.ledger(DAI).unwrap();
    assert_eq!(ledger.cash(), dec!(300));
    assert_close(
        ledger.liability(),
        dec!(199.999781514346136200),
        dec!(0.000000001),
    );
}

#[test]
fn deposit_gains_when_group_is_impaired() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(10000), dec!(10000), dec!(10000), OTHER);
    seed_reserve(&mut h, USDC, dec!(2500), dec!(10000), dec!(10000), OTHER);

    // Group coverage is 12500 / 20000 = 0.625, so a 1000 deposit is
    // credited with 1600 of liability.
    let shares = h.pool.deposit(USER, DAI, dec!(1000), USER, DEADLINE).unwrap();
    assert_eq!(shares, dec!(1600));
    assert_eq!(h.pool.ledger(DAI).unwrap().liability(), dec!(11600));
    assert_eq!(h.pool.ledger(DAI).unwrap().cash(), dec!(11000));
}

#[test]
fn withdraw_loses_when_group_is_impaired() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(10000), dec!(10000), dec!(10000), USER);
    seed_reserve(&mut h, USDC, dec!(2500), dec!(10000), dec!(10000), OTHER);

    // The reserve itself is fully covered, so there is no withdrawal fee,
    // but group coverage 0.625 impairs the payout.
    let amount = h
        .pool
        .withdraw(USER, DAI, dec!(1000), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_eq!(amount, dec!(625));
    let ledger = h.pool.ledger(DAI).unwrap();
    assert_eq!(ledger.cash(), dec!(9375));
    assert_eq!(ledger.liability(), dec!(9000));
}

#[test]
fn withdraw_pays_fee_below_full_coverage() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(60), dec!(100), dec!(100), USER);

    let quote = h.pool.quote_potential_withdraw(DAI, dec!(10)).unwrap();
    assert_close(quote.fee, dec!(0.038954704068184700), dec!(0.000000001));

    // Group coverage equals the reserve's 0.6, so the already-reduced
    // payout is impaired by the same ratio.
    let amount = h
        .pool
        .withdraw(USER, DAI, dec!(10), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_close(amount, dec!(5.976627177559089180), dec!(0.000000001));
    assert_eq!(amount, quote.amount);
}

#[test]
fn deep_undercoverage_makes_fees_dominate() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(30), dec!(100), dec!(100), USER);

    let quote = h.pool.quote_potential_withdraw(DAI, dec!(10)).unwrap();
    assert_close(quote.fee, dec!(6.230923894000016920), dec!(0.000000001));
    assert_close(quote.amount, dec!(1.130722831799994924), dec!(0.000000001));
}

#[test]
fn withdraw_is_capped_at_available_cash() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(100), dec!(100), dec!(100), OTHER);
    seed_reserve(&mut h, USDC, dec!(50), dec!(100), dec!(100), USER);

    // Full exit pays no fee; group coverage 0.75 impairs the claim to 75,
    // and available cash caps it at 50.
    let quote = h.pool.quote_potential_withdraw(USDC, dec!(100)).unwrap();
    assert!(!quote.enough_cash);
    assert_eq!(quote.amount, dec!(50));

    let amount = h
        .pool
        .withdraw(USER, USDC, dec!(100), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_eq!(amount, dec!(50));
    let ledger = h.pool.ledger(USDC).unwrap();
    assert_eq!(ledger.cash(), dec!(0));
    assert_eq!(ledger.liability(), dec!(0));
}

#[test]
fn full_exit_at_low_coverage_pays_all_cash() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(60), dec!(100), dec!(100), USER);

    let amount = h
        .pool
        .withdraw(USER, DAI, dec!(100), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_eq!(amount, dec!(60));
    let ledger = h.pool.ledger(DAI).unwrap();
    assert_eq!(ledger.cash(), dec!(0));
    assert_eq!(ledger.liability(), dec!(0));
    assert_eq!(ledger.total_shares(), dec!(0));
}

#[test]
fn round_trip_above_full_coverage_is_not_profitable() {
    let mut h = harness();
    seed_reserve(&mut h, DAI, dec!(200), dec!(100), dec!(100), OTHER);

    let shares = h.pool.deposit(USER, DAI, dec!(100), USER, DEADLINE).unwrap();
    let amount = h
        .pool
        .withdraw(USER, DAI, shares, dec!(0), USER, DEADLINE)
        .unwrap();
    assert!(amount <= dec!(100));
}

#[test]
fn balanced_swap_dai_to_usdc_reference() {
    let mut h = harness();
    h.pool.set_haircut_rate(ADMIN, dec!(0.0003)).unwrap();
    h.pool.deposit(USER, DAI, dec!(10000), USER, DEADLINE).unwrap();
    h.pool.deposit(USER, USDC, dec!(10000), USER, DEADLINE).unwrap();

    let before = h.vault.balance_of(USDC, USER);
    let out = h
        .pool
        .swap(USER, DAI, USDC, dec!(100), dec!(90), USER, DEADLINE)
        .unwrap();
    assert_eq!(out, dec!(99.968879));
    assert_eq!(h.vault.balance_of(USDC, USER) - before, out);

    let dai = h.pool.ledger(DAI).unwrap();
    let usdc = h.pool.ledger(USDC).unwrap();
    assert_eq!(dai.cash(), dec!(10100));
    assert_eq!(dai.liability(), dec!(10000));
    // Haircut is retained as destination cash.
    assert_eq!(usdc.cash(), dec!(9900.031121));
    assert_eq!(usdc.liability(), dec!(10000));
}

#[test]
fn balanced_swap_usdc_to_dai_reference() {
    let mut h = harness();
    h.pool.set_haircut_rate(ADMIN, dec!(0.0003)).unwrap();
    h.pool.deposit(USER, DAI, dec!(10000), USER, DEADLINE).unwrap();
    h.pool.deposit(USER, USDC, dec!(10000), USER, DEADLINE).unwrap();

    let out = h
        .pool
        .swap(USER, USDC, DAI, dec!(100), dec!(90), USER, DEADLINE)
        .unwrap();
    assert_close(out, dec!(99.968879495882390916), dec!(0.000000001));
    assert_eq!(h.pool.ledger(USDC).unwrap().cash(), dec!(10100));
    assert_eq!(h.pool.ledger(DAI).unwrap().cash(), dec!(10000) - out);
}

#[test]
fn swap_from_empty_coverage_pays_reward() {
    let mut h = harness();
    h.pool.set_haircut_rate(ADMIN, dec!(0.0003)).unwrap();
    h.pool.deposit(USER, DAI, dec!(10000), USER, DEADLINE).unwrap();
    h.pool.deposit(USER, USDC, dec!(10000), USER, DEADLINE).unwrap();
    // Drain the USDC reserve's cash so its coverage is zero.
    h.pool
        .ledger_mut(USDC)
        .unwrap()
        .remove_cash(POOL, dec!(10000))
        .unwrap();

    let out = h
        .pool
        .swap(USER, USDC, DAI, dec!(100), dec!(90), USER, DEADLINE)
        .unwrap();
    // Refilling an empty reserve earns almost the full linear-branch bonus.
    assert_close(out, dec!(199.925427143740538487), dec!(0.000001));
}

#[test]
fn swap_events_carry_the_executed_amounts() {
    let mut h = harness();
    h.pool.deposit(USER, DAI, dec!(10000), USER, DEADLINE).unwrap();
    h.pool.deposit(USER, USDC, dec!(10000), USER, DEADLINE).unwrap();
    h.pool.drain_events();

    let out = h
        .pool
        .swap(USER, DAI, USDC, dec!(100), dec!(0), OTHER, DEADLINE)
        .unwrap();
    let events = h.pool.drain_events();
    assert_eq!(
        events,
        vec![PoolEvent::Swap {
            sender: USER,
            from_token: DAI,
            to_token: USDC,
            amount_in: dec!(100),
            amount_out: out,
            receiver: OTHER,
        }]
    );
}

// ---- cross-reserve withdrawals ----

const AVAX: TokenId = TokenId(20);
const SAVAX: TokenId = TokenId(21);
const AVAX_GROUP: GroupId = GroupId(2);
const SAVAX_RATE: Decimal = dec!(1.012287344219239968);

fn staking_harness() -> Harness {
    let mut h = harness();
    h.feed.set_price(AVAX, dec!(1));
    h.feed.set_price(SAVAX, SAVAX_RATE);
    h.pool
        .register_group(
            ADMIN,
            AggregateGroup {
                id: AVAX_GROUP,
                name: "Liquid staking AVAX".to_string(),
                stable: false,
            },
        )
        .unwrap();
    h.pool
        .add_asset(
            ADMIN,
            ReserveLedger::new(AVAX, 18, AVAX_GROUP, POOL, ADMIN).unwrap(),
        )
        .unwrap();
    h.pool
        .add_asset(
            ADMIN,
            ReserveLedger::new(SAVAX, 18, AVAX_GROUP, POOL, ADMIN).unwrap(),
        )
        .unwrap();
    h.vault.fund(AVAX, USER, dec!(100000));
    h.vault.fund(SAVAX, USER, dec!(100000));
    h.pool.deposit(USER, AVAX, dec!(100), USER, DEADLINE).unwrap();
    h.pool.deposit(USER, SAVAX, dec!(100), USER, DEADLINE).unwrap();
    h
}

#[test]
fn cross_reserve_withdrawal_burns_rate_adjusted_shares() {
    let mut h = staking_harness();
    // Give the staked side 70 of excess cash.
    seed_reserve(&mut h, SAVAX, dec!(70), dec!(0), dec!(0), USER);

    let max = h
        .pool
        .quote_max_initial_asset_withdrawable(AVAX, SAVAX)
        .unwrap();
    assert_eq!(max, dec!(70.860114095346797760));

    let before = h.vault.balance_of(SAVAX, USER);
    let amount = h
        .pool
        .withdraw_from_other_asset(USER, AVAX, SAVAX, dec!(70), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_eq!(amount, dec!(70));
    assert_eq!(h.vault.balance_of(SAVAX, USER) - before, dec!(70));

    let avax = h.pool.ledger(AVAX).unwrap();
    assert_eq!(avax.cash(), dec!(100));
    assert_eq!(avax.liability(), dec!(29.139885904653202240));
    assert_eq!(avax.total_shares(), dec!(29.139885904653202240));
    assert_eq!(avax.balance_of(USER), dec!(29.139885904653202240));

    let savax = h.pool.ledger(SAVAX).unwrap();
    assert_eq!(savax.cash(), dec!(100));
    assert_eq!(savax.liability(), dec!(100));
    assert_eq!(savax.total_shares(), dec!(100));
}

#[test]
fn cross_reserve_withdrawal_in_the_other_direction() {
    let mut h = staking_harness();
    seed_reserve(&mut h, AVAX, dec!(25), dec!(0), dec!(0), USER);

    let max = h
        .pool
        .quote_max_initial_asset_withdrawable(SAVAX, AVAX)
        .unwrap();
    assert_eq!(max, dec!(24.696545049945354502));

    let amount = h
        .pool
        .withdraw_from_other_asset(USER, SAVAX, AVAX, dec!(25), dec!(0), OTHER, DEADLINE)
        .unwrap();
    assert_eq!(amount, dec!(25));
    assert_eq!(h.vault.balance_of(AVAX, OTHER), dec!(25));

    let savax = h.pool.ledger(SAVAX).unwrap();
    assert_eq!(savax.cash(), dec!(100));
    assert_eq!(savax.liability(), dec!(75.303454950054645498));
    assert_eq!(savax.total_shares(), dec!(75.303454950054645498));

    let avax = h.pool.ledger(AVAX).unwrap();
    assert_eq!(avax.cash(), dec!(100));
    assert_eq!(avax.liability(), dec!(100));
}

#[test]
fn cross_reserve_withdrawal_quote_matches_execution() {
    let mut h = staking_harness();
    seed_reserve(&mut h, SAVAX, dec!(70), dec!(0), dec!(0), USER);

    let quote = h
        .pool
        .quote_potential_withdraw_from_other_asset(AVAX, SAVAX, dec!(40))
        .unwrap();
    let amount = h
        .pool
        .withdraw_from_other_asset(USER, AVAX, SAVAX, dec!(40), dec!(0), USER, DEADLINE)
        .unwrap();
    assert_eq!(amount, quote.amount);
}

#[test]
fn cross_reserve_withdrawal_needs_target_excess() {
    let mut h = staking_harness();
    // Both reserves fully covered, nothing above liability to hand out.
    let err = h
        .pool
        .withdraw_from_other_asset(USER, AVAX, SAVAX, dec!(10), dec!(0), USER, DEADLINE)
        .unwrap_err();
    assert!(matches!(err, PoolError::CoverageTooLow { token: SAVAX }));
    assert_eq!(
        h.pool
            .quote_max_initial_asset_withdrawable(AVAX, SAVAX)
            .unwrap(),
        dec!(0)
    );
}

#[test]
fn cross_reserve_withdrawal_rejects_dust() {
    let mut h = staking_harness();
    seed_reserve(&mut h, SAVAX, dec!(70), dec!(0), dec!(0), USER);
    let err = h
        .pool
        .withdraw_from_other_asset(
            USER,
            AVAX,
            SAVAX,
            dec!(0.00000001),
            dec!(0),
            USER,
            DEADLINE,
        )
        .unwrap_err();
    assert!(matches!(err, PoolError::Dust { .. }));
}

#[test]
fn cross_reserve_withdrawal_stays_within_excess() {
    let mut h = staking_harness();
    seed_reserve(&mut h, SAVAX, dec!(70), dec!(0), dec!(0), USER);
    // One tick above the available excess.
    let err = h
        .pool
        .withdraw_from_other_asset(
            USER,
            AVAX,
            SAVAX,
            dec!(70.000000000000000001),
            dec!(0),
            USER,
            DEADLINE,
        )
        .unwrap_err();
    assert!(matches!(err, PoolError::CoverageTooLow { .. }));
}

// ---- conservation under random operation sequences ----

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledgers_mirror_vault_custody(ops in prop::collection::vec((0u8..3, 1u64..2000), 1..20)) {
        let mut h = harness();
        h.pool.deposit(USER, DAI, dec!(5000), USER, DEADLINE).unwrap();
        h.pool.deposit(USER, USDC, dec!(5000), USER, DEADLINE).unwrap();

        for (op, raw) in ops {
            let amount = Decimal::from(raw);
            // Failed operations must leave no partial state behind; both
            // outcomes are checked by the invariant below.
            let _ = match op {
                0 => h.pool.deposit(USER, DAI, amount, USER, DEADLINE),
                1 => h.pool.swap(USER, DAI, USDC, amount, dec!(0), USER, DEADLINE),
                _ => h.pool.withdraw(USER, USDC, amount, dec!(0), USER, DEADLINE),
            };

            for token in [DAI, USDC] {
                let ledger = h.pool.ledger(token).unwrap();
                prop_assert_eq!(
                    ledger.cash(),
                    h.vault.balance_of(token, POOL_ACCOUNT),
                    "cash must mirror custody for {}", token
                );
                prop_assert!(ledger.cash() >= dec!(0));
                prop_assert!(ledger.liability() >= dec!(0));
            }
        }
    }
}
