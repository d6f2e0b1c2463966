use std::sync::Arc;

use serum_data::{
    Cluster,
    identity::{Entity, KnownEntities},
    ledger::method,
    market::{CacheConfig, MarketData},
    testing::{self, BookAccount, EventQueueAccount, EventRecord, MarketAccount, MockLedger},
    tokens::TokenRegistry,
    types::Side,
};
use solana_pubkey::Pubkey;

struct Fixture {
    ledger: Arc<MockLedger>,
    data: MarketData<MockLedger>,
    market: MarketAccount,
}

const MAKER_CO: u64 = 70;

fn maker_co() -> Pubkey { testing::key(MAKER_CO) }

/// One venue with unit lot sizes and zero-decimal mints, so prices and
/// quantities equal their lot values.
async fn fixture() -> Fixture {
    let ledger = Arc::new(MockLedger::new());
    let market = MarketAccount::new(testing::key(1), testing::key(2), testing::key(3));
    ledger.install_market(&market, 100);

    // key(7) belongs to a known entity, key(8) to an anonymous wallet,
    // key(9) has no open-orders account on the ledger.
    ledger.set_account(testing::key(7), testing::encode_open_orders(&market.address, &maker_co()), 100);
    ledger.set_account(testing::key(8), testing::encode_open_orders(&market.address, &testing::key(80)), 100);

    let tokens = TokenRegistry::from_tokens([
        testing::token(&market.base_mint, "BASE", 0),
        testing::token(&market.quote_mint, "QUOTE", 0),
    ]);
    let entities = KnownEntities::new().with(maker_co(), "Maker Co", "maker.png");
    let data = MarketData::new(
        Cluster::mainnet(),
        CacheConfig::default(),
        Arc::clone(&ledger),
        Arc::new(tokens),
        Arc::new(entities),
    );
    data.refresh_registry().await.unwrap();
    Fixture { ledger, data, market }
}

#[tokio::test]
async fn venue_lookup() {
    let Fixture { data, market, .. } = fixture().await;

    let venue = data.venue(&market.address).unwrap();
    assert_eq!(venue.bids(), market.bids);
    assert_eq!(venue.event_queue(), market.event_queue);
    assert_eq!(data.venues_by_asset(&market.base_mint).len(), 1);
    assert!(data.venues_by_asset(&market.quote_mint).is_empty());

    let summary = data.venue_summary(&market.address).unwrap();
    assert_eq!(summary.name, "BASE - QUOTE");
    assert!(!summary.synthetic_decimals);
    assert_eq!(data.most_active(&market.base_mint, None).unwrap().address(), market.address);
    assert_eq!(data.most_active(&market.base_mint, Some(&market.quote_mint)).unwrap().address(), market.address);
}

#[tokio::test]
async fn books_and_listing() {
    let Fixture { ledger, data, market } = fixture().await;
    ledger.set_account(
        market.asks,
        BookAccount::new(Side::Ask).order(11, 2, testing::key(8)).order(10, 1, testing::key(7)).encode(),
        105,
    );
    ledger.set_account(
        market.bids,
        BookAccount::new(Side::Bid).order(8, 2, testing::key(9)).order(9, 1, testing::key(7)).encode(),
        104,
    );

    let asks = data.ask_order_book(&market.address).await.unwrap();
    assert_eq!(asks.slot(), 105);
    assert_eq!(asks.orders().iter().map(|o| o.price_lots()).collect::<Vec<_>>(), vec![10, 11]);
    let bids = data.bid_order_book(&market.address).await.unwrap();
    assert_eq!(bids.best_price(), Some(9.0));
    assert_eq!(bids.total_quantity(), 3.0);

    let listing = data.book_listing(&market.address, Side::Ask).await.unwrap();
    assert_eq!(listing.slot, 105);
    assert!(!listing.approximate);
    assert_eq!(listing.entries.len(), 2);
    // Notionals 10 and 22
    assert_eq!(listing.entries[0].percent, 10.0 / 32.0);
    assert_eq!(listing.entries[1].percent, 1.0);
    assert_eq!(listing.entries[0].owner, Some(maker_co()));
    assert_eq!(listing.entries[0].entity, Some(Entity { name: "Maker Co".into(), icon: "maker.png".into() }));
    assert_eq!(listing.entries[1].owner, Some(testing::key(80)));
    assert_eq!(listing.entries[1].entity, None);

    let listing = data.book_listing(&market.address, Side::Bid).await.unwrap();
    assert_eq!(listing.entries[0].price, 9.0);
    assert_eq!(listing.entries[1].owner, None);
}

#[tokio::test]
async fn depth_curves() {
    let Fixture { ledger, data, market } = fixture().await;
    ledger.set_account(
        market.asks,
        BookAccount::new(Side::Ask).order(10, 1, testing::key(7)).order(11, 2, testing::key(8)).encode(),
        110,
    );
    ledger.set_account(
        market.bids,
        BookAccount::new(Side::Bid).order(9, 1, testing::key(7)).order(8, 2, testing::key(8)).encode(),
        111,
    );

    let depth = data.depth(&market.address).await.unwrap();
    assert_eq!(depth.asks.iter().map(|p| p.cumulative).collect::<Vec<_>>(), vec![1.0, 3.0]);
    assert_eq!(depth.bids.iter().map(|p| p.price).collect::<Vec<_>>(), vec![8.0, 9.0]);
    assert_eq!(depth.bids.iter().map(|p| p.cumulative).collect::<Vec<_>>(), vec![3.0, 1.0]);
    assert_eq!(depth.midpoint, 9.5);
    assert_eq!((depth.bid_slot, depth.ask_slot), (111, 110));
    assert_eq!(depth.spread(), Some(1.0));
}

#[tokio::test]
async fn depth_with_one_empty_side() {
    let Fixture { ledger, data, market } = fixture().await;
    ledger.set_account(market.asks, BookAccount::new(Side::Ask).order(10, 1, testing::key(7)).encode(), 110);

    let depth = data.depth(&market.address).await.unwrap();
    assert!(depth.bids.is_empty());
    assert_eq!(depth.midpoint, 5.0);
}

#[tokio::test]
async fn trade_history_pairs_adjacent_fills() {
    let Fixture { ledger, data, market } = fixture().await;
    let queue = EventQueueAccount::new(vec![
        EventRecord::fill(Side::Bid, false, testing::key(7), 30, 3),
        EventRecord::fill(Side::Ask, true, testing::key(8), 30, 3),
        EventRecord::fill(Side::Ask, false, testing::key(9), 44, 4),
    ])
    .with_capacity(8)
    .with_head(6);
    ledger.set_account(market.event_queue, queue.encode(), 120);

    let trades = data.trade_history(&market.address).await;
    assert_eq!(trades.len(), 2);

    let first = &trades[0];
    assert_eq!(first.index, 0);
    assert_eq!((first.price, first.quantity), (10.0, 3.0));
    assert_eq!(first.side(), Side::Bid);
    assert!(first.fill && !first.maker_flag);
    assert_eq!(first.taker.owner, maker_co());
    assert!(first.taker.owner_resolved);
    assert_eq!(first.taker.display_name(), Some("Maker Co"));
    let maker = first.maker.as_ref().unwrap();
    assert_eq!(maker.open_orders, testing::key(8));
    assert_eq!(maker.owner, testing::key(80));

    let second = &trades[1];
    assert_eq!(second.index, 2);
    assert_eq!(second.price, 11.0);
    assert_eq!(second.side(), Side::Ask);
    assert!(second.maker.is_none());
    assert_eq!(second.taker.owner, testing::key(9));
    assert!(!second.taker.owner_resolved);

    // Owners of all three accounts fetched in one batch
    assert_eq!(ledger.calls(method::GET_MULTIPLE_ACCOUNTS), 1);
}

#[tokio::test]
async fn empty_event_queue_yields_no_trades() {
    let Fixture { data, market, .. } = fixture().await;
    assert!(data.event_queue(&market.address).await.unwrap().events().is_empty());
    assert!(data.trade_history(&market.address).await.is_empty());
}

#[tokio::test]
async fn unknown_venue_reads_are_empty() {
    let Fixture { ledger, data, .. } = fixture().await;
    let unknown = testing::key(404);

    assert!(data.venue(&unknown).is_none());
    assert!(data.bid_order_book(&unknown).await.is_none());
    assert!(data.ask_order_book(&unknown).await.is_none());
    assert!(data.book_listing(&unknown, Side::Bid).await.is_none());
    assert!(data.depth(&unknown).await.is_none());
    assert!(data.trade_history(&unknown).await.is_empty());
    assert_eq!(ledger.calls(method::GET_ACCOUNT_INFO), 0);
    assert!(data.bid_cache().is_empty());
}
