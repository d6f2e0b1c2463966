use std::{sync::Arc, time::Duration};

use serum_data::{
    Cluster, DEX_PROGRAM_ID, ROUTER_PROGRAM_ID, ROUTER_REFERRERS,
    correlate::{Correlation, CorrelationKey, Correlator, DEFAULT_SCAN_WINDOW},
    ledger::{CompiledInstruction, TransactionInfo, method},
    testing::{self, MockLedger},
    types::Signature,
};
use solana_pubkey::Pubkey;

fn market() -> Pubkey { testing::key(1) }

fn open_orders() -> Pubkey { testing::key(7) }

fn owner() -> Pubkey { testing::key(70) }

fn fill_key() -> CorrelationKey { CorrelationKey::new(market(), open_orders(), owner(), 10.5, 3.0) }

/// Transaction with a single instruction of `program` over `accounts`.
fn transaction(signature: &str, slot: u64, program: Pubkey, accounts: &[Pubkey]) -> TransactionInfo {
    let mut account_keys = vec![program];
    account_keys.extend_from_slice(accounts);
    TransactionInfo {
        signature: signature.to_string(),
        slot,
        account_keys,
        instructions: vec![CompiledInstruction { program_id_index: 0, accounts: (1..=accounts.len()).collect() }],
    }
}

fn swap(signature: &str, slot: u64) -> TransactionInfo {
    transaction(
        signature,
        slot,
        ROUTER_PROGRAM_ID,
        &[owner(), DEX_PROGRAM_ID, market(), open_orders(), ROUTER_REFERRERS[0]],
    )
}

fn correlator(ledger: &Arc<MockLedger>) -> Correlator<MockLedger> {
    Correlator::new(&Cluster::mainnet(), Arc::clone(ledger), DEFAULT_SCAN_WINDOW)
}

async fn settled(correlator: &Correlator<MockLedger>, key: &CorrelationKey) -> Option<Signature> {
    loop {
        if let Some(result) = correlator.memoized(key) {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_lookups_share_one_scan() {
    let ledger = Arc::new(MockLedger::new().with_latency(Duration::from_millis(50)));
    ledger.add_transaction(owner(), swap("swap", 10));
    let correlator = correlator(&ledger);
    let other = correlator.clone();

    assert_eq!(correlator.lookup(fill_key()), Correlation::Pending);
    assert_eq!(other.lookup(fill_key()), Correlation::Pending);

    assert_eq!(settled(&correlator, &fill_key()).await, Some("swap".to_string()));
    assert_eq!(correlator.lookup(fill_key()), Correlation::Found("swap".to_string()));
    assert_eq!(other.lookup(fill_key()), Correlation::Found("swap".to_string()));
    assert_eq!(ledger.calls(method::GET_SIGNATURES_FOR_ADDRESS), 1);
    assert_eq!(correlator.memo_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scan_stops_at_first_match() {
    let ledger = Arc::new(MockLedger::new());
    ledger.add_transaction(owner(), swap("older", 10));
    ledger.add_transaction(owner(), transaction("transfer", 11, testing::key(50), &[owner()]));
    ledger.add_transaction(owner(), swap("newest", 12));
    let correlator = correlator(&ledger);

    correlator.lookup(fill_key());
    assert_eq!(settled(&correlator, &fill_key()).await, Some("newest".to_string()));
    assert_eq!(ledger.calls(method::GET_TRANSACTION), 1);
}

#[tokio::test(start_paused = true)]
async fn no_match_is_memoized() {
    let ledger = Arc::new(MockLedger::new());
    // Router swap on another venue
    ledger.add_transaction(
        owner(),
        transaction(
            "elsewhere",
            10,
            ROUTER_PROGRAM_ID,
            &[DEX_PROGRAM_ID, testing::key(2), open_orders(), ROUTER_REFERRERS[1]],
        ),
    );
    // All accounts present but called directly, not through the router
    ledger.add_transaction(
        owner(),
        transaction("direct", 11, DEX_PROGRAM_ID, &[DEX_PROGRAM_ID, market(), open_orders(), ROUTER_REFERRERS[2]]),
    );
    // Router swap without a referrer
    ledger.add_transaction(
        owner(),
        transaction("unreferred", 12, ROUTER_PROGRAM_ID, &[DEX_PROGRAM_ID, market(), open_orders()]),
    );
    let correlator = correlator(&ledger);

    assert_eq!(correlator.lookup(fill_key()), Correlation::Pending);
    assert_eq!(settled(&correlator, &fill_key()).await, None);
    assert_eq!(correlator.lookup(fill_key()), Correlation::NotFound);
    assert_eq!(ledger.calls(method::GET_SIGNATURES_FOR_ADDRESS), 1);
    assert_eq!(ledger.calls(method::GET_TRANSACTION), 3);
}

#[tokio::test(start_paused = true)]
async fn scan_window_is_bounded() {
    let ledger = Arc::new(MockLedger::new());
    ledger.add_transaction(owner(), swap("too-old", 1));
    for n in 0..DEFAULT_SCAN_WINDOW as u64 {
        ledger.add_transaction(owner(), transaction(&format!("noise-{}", n), 10 + n, testing::key(50), &[]));
    }
    let correlator = correlator(&ledger);

    correlator.lookup(fill_key());
    assert_eq!(settled(&correlator, &fill_key()).await, None);
    assert_eq!(ledger.calls(method::GET_TRANSACTION), DEFAULT_SCAN_WINDOW);
}

#[tokio::test(start_paused = true)]
async fn unknown_transaction_ends_scan() {
    let ledger = Arc::new(MockLedger::new());
    ledger.add_transaction(owner(), swap("swap", 10));
    ledger.add_missing_transaction(owner(), "pruned", 11);
    let correlator = correlator(&ledger);

    correlator.lookup(fill_key());
    assert_eq!(settled(&correlator, &fill_key()).await, None);
}

#[tokio::test(start_paused = true)]
async fn failed_scan_is_retried() {
    let ledger = Arc::new(MockLedger::new());
    ledger.add_transaction(owner(), swap("swap", 10));
    ledger.fail_next(method::GET_TRANSACTION, 1);
    let correlator = correlator(&ledger);

    assert_eq!(correlator.lookup(fill_key()), Correlation::Pending);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(correlator.memoized(&fill_key()).is_none());
    assert_eq!(correlator.memo_len(), 0);

    assert_eq!(correlator.lookup(fill_key()), Correlation::Pending);
    assert_eq!(settled(&correlator, &fill_key()).await, Some("swap".to_string()));
    assert_eq!(ledger.calls(method::GET_SIGNATURES_FOR_ADDRESS), 2);
}

#[tokio::test(start_paused = true)]
async fn keys_differ_by_fill() {
    let ledger = Arc::new(MockLedger::new());
    ledger.add_transaction(owner(), swap("swap", 10));
    let correlator = correlator(&ledger);

    let other = CorrelationKey::new(market(), open_orders(), owner(), 10.5, 3.5);
    correlator.lookup(fill_key());
    correlator.lookup(other);
    settled(&correlator, &fill_key()).await;
    settled(&correlator, &other).await;
    assert_eq!(correlator.memo_len(), 2);
    assert_eq!(ledger.calls(method::GET_SIGNATURES_FOR_ADDRESS), 2);
}
