//! Walk a pool through a deposit / swap / withdraw session with debug
//! logging enabled. Run with:
//!
//! ```text
//! RUST_LOG=debug cargo run -p tidepool-pool --example pool_session
//! ```

use std::sync::Arc;
use tidepool_pool::{
    dec, AccountId, AggregateGroup, GroupId, InMemoryVault, PoolConfig, PoolEngine, PoolId,
    ReserveLedger, StaticPriceFeed, SystemClock, TokenId,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let pool_id = PoolId(1);
    let admin = AccountId(1);
    let alice = AccountId(2);
    let dai = TokenId(10);
    let usdc = TokenId(11);
    let usd = GroupId(1);

    let feed = Arc::new(StaticPriceFeed::with_prices([(dai, dec!(1)), (usdc, dec!(1))]));
    let vault = Arc::new(InMemoryVault::new());
    vault.fund(dai, alice, dec!(50000));
    vault.fund(usdc, alice, dec!(50000));

    let mut pool = PoolEngine::new(
        pool_id,
        AccountId(100),
        admin,
        PoolConfig::default(),
        feed,
        vault.clone(),
        Arc::new(SystemClock),
    )?;
    pool.register_group(
        admin,
        AggregateGroup {
            id: usd,
            name: "USD stablecoins".to_string(),
            stable: true,
        },
    )?;
    pool.add_asset(admin, ReserveLedger::new(dai, 18, usd, pool_id, admin)?)?;
    pool.add_asset(admin, ReserveLedger::new(usdc, 6, usd, pool_id, admin)?)?;

    let deadline = chrono::Utc::now().timestamp() + 60;
    pool.deposit(alice, dai, dec!(10000), alice, deadline)?;
    pool.deposit(alice, usdc, dec!(10000), alice, deadline)?;

    let quote = pool.quote_potential_swap(dai, usdc, dec!(100))?;
    println!("quoted 100 DAI -> {} USDC", quote.amount_out);

    let out = pool.swap(alice, dai, usdc, dec!(100), quote.amount_out, alice, deadline)?;
    println!("swapped 100 DAI -> {out} USDC");

    let shares = pool.ledger(dai)?.balance_of(alice);
    let amount = pool.withdraw(alice, dai, shares, dec!(0), alice, deadline)?;
    println!("withdrew {shares} shares -> {amount} DAI");

    for event in pool.drain_events() {
        println!("event: {event:?}");
    }
    Ok(())
}
