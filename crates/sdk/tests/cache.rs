use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use serum_data::{
    Cluster,
    cache::Phase,
    identity::KnownEntities,
    ledger::method,
    market::{CacheConfig, MarketData},
    testing::{self, BookAccount, MarketAccount, MockLedger},
    tokens::TokenRegistry,
    types::Side,
};

fn market_data(ledger: &Arc<MockLedger>) -> MarketData<MockLedger> {
    let base = testing::key(2);
    let quote = testing::key(3);
    let tokens = TokenRegistry::from_tokens([testing::token(&base, "BASE", 0), testing::token(&quote, "QUOTE", 0)]);
    MarketData::new(
        Cluster::mainnet(),
        CacheConfig::default(),
        Arc::clone(ledger),
        Arc::new(tokens),
        Arc::new(KnownEntities::new()),
    )
}

async fn setup() -> (Arc<MockLedger>, MarketData<MockLedger>, MarketAccount) {
    let ledger = Arc::new(MockLedger::new());
    let market = MarketAccount::new(testing::key(1), testing::key(2), testing::key(3));
    ledger.install_market(&market, 100);
    let data = market_data(&ledger);
    data.refresh_registry().await.unwrap();
    (ledger, data, market)
}

fn bids(price_lots: u64) -> Vec<u8> { BookAccount::new(Side::Bid).order(price_lots, 1, testing::key(9)).encode() }

/// Slot floor only moves forward; a lagging node never replaces newer data.
#[tokio::test(start_paused = true)]
async fn slot_floor_is_monotonic() {
    let (ledger, data, market) = setup().await;
    let refresh = data.config().book_refresh;

    ledger.set_account(market.bids, bids(10), 100);
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 100);
    assert_eq!(book.best_price(), Some(10.0));

    // Lagging node rejecting the minimum slot
    ledger.set_account(market.bids, bids(11), 90);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 100);
    assert_eq!(book.best_price(), Some(10.0));

    // Lagging node ignoring the minimum slot
    ledger.set_honor_min_slot(false);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 100);
    assert_eq!(book.best_price(), Some(10.0));
    assert_eq!(data.slots(&market.address).bids, 100);

    // Same slot is accepted
    ledger.set_account(market.bids, bids(12), 100);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.best_price(), Some(12.0));

    ledger.set_account(market.bids, bids(13), 120);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 120);
    assert_eq!(book.best_price(), Some(13.0));
    assert_eq!(data.slots(&market.address).bids, 120);
}

/// A failed refresh keeps serving the last good snapshot and floor.
#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_last_good() {
    let (ledger, data, market) = setup().await;
    let refresh = data.config().book_refresh;

    ledger.set_account(market.asks, BookAccount::new(Side::Ask).order(20, 5, testing::key(9)).encode(), 150);
    let book = data.ask_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 150);

    ledger.set_account(market.asks, BookAccount::new(Side::Ask).order(21, 5, testing::key(9)).encode(), 160);
    ledger.fail_next(method::GET_ACCOUNT_INFO, 1);
    tokio::time::advance(refresh).await;
    let book = data.ask_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 150);
    assert_eq!(book.best_price(), Some(20.0));
    assert_eq!(data.ask_cache().phase(&market.address), Phase::Ready);
    assert_eq!(data.slots(&market.address).asks, 150);

    tokio::time::advance(refresh).await;
    let book = data.ask_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 160);
    assert_eq!(book.best_price(), Some(21.0));
}

/// Within the refresh interval reads are served from memory.
#[tokio::test(start_paused = true)]
async fn fresh_reads_do_not_hit_ledger() {
    let (ledger, data, market) = setup().await;

    data.bid_order_book(&market.address).await.unwrap();
    data.bid_order_book(&market.address).await.unwrap();
    tokio::time::advance(data.config().book_refresh / 2).await;
    data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 1);

    tokio::time::advance(data.config().book_refresh).await;
    data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 2);
}

/// Concurrent first reads share a single load.
#[tokio::test(start_paused = true)]
async fn concurrent_reads_share_one_load() {
    let (ledger, data, market) = setup().await;
    ledger.set_latency(Duration::from_millis(200));

    let reads = join_all((0..16).map(|_| data.event_queue(&market.address))).await;
    assert!(reads.iter().all(|r| r.is_some()));
    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 1);
}

/// Overlapping refreshes of a loaded venue share a single load.
#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_share_one_load() {
    let (ledger, data, market) = setup().await;
    ledger.set_account(market.bids, bids(10), 100);
    data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 1);

    ledger.set_account(market.bids, bids(11), 110);
    ledger.set_latency(Duration::from_millis(200));
    let cache = data.bid_cache();
    let (first, second) = tokio::join!(cache.refresh(&market.address), cache.refresh(&market.address));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 2);
    assert!(Arc::ptr_eq(&first.shared(), &second.shared()));
    assert_eq!(first.slot(), 110);
    assert_eq!(first.best_price(), Some(11.0));
}

/// An undecodable account is handled like a transport failure.
#[tokio::test(start_paused = true)]
async fn undecodable_refresh_keeps_last_good() {
    let (ledger, data, market) = setup().await;
    let refresh = data.config().book_refresh;

    ledger.set_account(market.bids, bids(10), 100);
    data.bid_order_book(&market.address).await.unwrap();

    ledger.set_account(market.bids, vec![0xab; 64], 120);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 100);
    assert_eq!(book.best_price(), Some(10.0));
    assert_eq!(data.bid_cache().phase(&market.address), Phase::Ready);
    assert_eq!(data.slots(&market.address).bids, 100);

    ledger.set_account(market.bids, bids(12), 130);
    tokio::time::advance(refresh).await;
    let book = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(book.slot(), 130);
    assert_eq!(book.best_price(), Some(12.0));
}

/// A venue that never loaded reads as absent, and loads once the node
/// recovers.
#[tokio::test(start_paused = true)]
async fn failed_first_load_is_absent() {
    let (ledger, data, market) = setup().await;

    ledger.fail_next(method::GET_ACCOUNT_INFO, 1);
    assert!(data.bid_order_book(&market.address).await.is_none());
    assert_eq!(data.bid_cache().phase(&market.address), Phase::Empty);
    assert_eq!(data.slots(&market.address).bids, 0);

    tokio::time::advance(data.config().book_refresh).await;
    assert!(data.bid_order_book(&market.address).await.is_some());
}

/// Background refreshers keep touched venues warm and stop on cancel.
#[tokio::test(start_paused = true)]
async fn refreshers_follow_the_ledger() {
    let (ledger, data, market) = setup().await;
    data.bid_order_book(&market.address).await.unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    let handles = data.spawn_refreshers(token.clone());

    ledger.set_account(market.bids, bids(42), 500);
    tokio::time::sleep(data.config().book_refresh * 3).await;
    let book = data.bid_cache().peek(&market.address).unwrap();
    assert_eq!(book.slot(), 500);
    assert_eq!(book.best_price(), Some(42.0));

    token.cancel();
    for handle in handles {
        handle.await.unwrap();
    }
}
