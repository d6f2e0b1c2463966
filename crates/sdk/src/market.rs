//! Read operations over cached market state.

use std::{sync::Arc, time::Duration};

use solana_pubkey::Pubkey;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    Cluster,
    cache::{RefreshableCache, Snapshot},
    correlate::{Correlation, CorrelationKey, Correlator, DEFAULT_SCAN_WINDOW},
    depth::MarketDepth,
    error::DataError,
    feeds::{BookFeed, EventQueueFeed},
    history::TradeHistoryProcessor,
    identity::{IdentityDirectory, OwnerResolver},
    ledger::Ledger,
    registry::MarketRegistry,
    state::{BookListing, EventQueueSnapshot, OrderBookSnapshot, Venue, VenueSummary},
    tokens::TokenMetadata,
    types::{Side, Slot, TradeHistoryEvent},
};

/// Refresh cadences and scan limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub book_refresh: Duration,
    pub event_queue_refresh: Duration,
    pub registry_refresh: Duration,
    /// Recent owner transactions scanned per correlation.
    pub correlation_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            book_refresh: Duration::from_secs(1),
            event_queue_refresh: Duration::from_millis(2_500),
            registry_refresh: Duration::from_secs(5 * 60),
            correlation_window: DEFAULT_SCAN_WINDOW,
        }
    }
}

pub type BookCache<L> = RefreshableCache<Pubkey, OrderBookSnapshot, BookFeed<L>>;
pub type EventQueueCache<L> = RefreshableCache<Pubkey, EventQueueSnapshot, EventQueueFeed<L>>;

/// Slot floors of the three feeds of one venue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedSlots {
    pub bids: Slot,
    pub asks: Slot,
    pub event_queue: Slot,
}

/// Market data service: venue registry, per-venue snapshot caches and the
/// analytics derived from them.
///
/// All read operations take a venue address. Reads of an unknown venue, or
/// of a venue whose feed never loaded, return an empty result rather than an
/// error.
pub struct MarketData<L> {
    config: CacheConfig,
    ledger: Arc<L>,
    registry: Arc<MarketRegistry>,
    tokens: Arc<dyn TokenMetadata>,
    directory: Arc<dyn IdentityDirectory>,
    owners: OwnerResolver<L>,
    bids: BookCache<L>,
    asks: BookCache<L>,
    events: EventQueueCache<L>,
    correlator: Correlator<L>,
}

impl<L: Ledger> MarketData<L> {
    pub fn new(
        cluster: Cluster,
        config: CacheConfig,
        ledger: Arc<L>,
        tokens: Arc<dyn TokenMetadata>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        let registry = Arc::new(MarketRegistry::new(cluster.clone()));
        let book_feed = |side| BookFeed::new(Arc::clone(&ledger), Arc::clone(&registry), side);
        let bids = RefreshableCache::new("bids", config.book_refresh, book_feed(Side::Bid));
        let asks = RefreshableCache::new("asks", config.book_refresh, book_feed(Side::Ask));
        let events = RefreshableCache::new(
            "event_queue",
            config.event_queue_refresh,
            EventQueueFeed::new(Arc::clone(&ledger), Arc::clone(&registry)),
        );
        Self {
            config,
            owners: OwnerResolver::new(Arc::clone(&ledger)),
            correlator: Correlator::new(&cluster, Arc::clone(&ledger), config.correlation_window),
            ledger,
            registry,
            tokens,
            directory,
            bids,
            asks,
            events,
        }
    }

    pub fn config(&self) -> &CacheConfig { &self.config }

    pub fn registry(&self) -> &Arc<MarketRegistry> { &self.registry }

    pub fn ledger(&self) -> &Arc<L> { &self.ledger }

    pub fn tokens(&self) -> &Arc<dyn TokenMetadata> { &self.tokens }

    pub fn bid_cache(&self) -> &BookCache<L> { &self.bids }

    pub fn ask_cache(&self) -> &BookCache<L> { &self.asks }

    pub fn event_queue_cache(&self) -> &EventQueueCache<L> { &self.events }

    pub fn correlator(&self) -> &Correlator<L> { &self.correlator }

    /// Reloads venue descriptors. A failed scan keeps the current registry.
    pub async fn refresh_registry(&self) -> Result<usize, DataError> {
        self.registry.refresh(self.ledger.as_ref(), self.tokens.as_ref()).await
    }

    pub fn venue(&self, id: &Pubkey) -> Option<Arc<Venue>> { self.registry.get(id) }

    pub fn venues_by_asset(&self, asset: &Pubkey) -> Vec<Arc<Venue>> { self.registry.list_by_asset(asset) }

    pub fn venue_summary(&self, id: &Pubkey) -> Option<VenueSummary> {
        self.venue(id).map(|v| VenueSummary::new(&v, self.tokens.as_ref()))
    }

    pub fn venue_summaries_by_asset(&self, asset: &Pubkey) -> Vec<VenueSummary> {
        self.registry.summaries_by_asset(asset, self.tokens.as_ref())
    }

    pub fn most_active(&self, base: &Pubkey, quote: Option<&Pubkey>) -> Option<Arc<Venue>> {
        match quote {
            Some(quote) => self.registry.most_active_pair(base, quote),
            None => self.registry.most_active(base),
        }
    }

    /// Cached bid book of a venue.
    pub async fn bid_order_book(&self, id: &Pubkey) -> Option<Snapshot<OrderBookSnapshot>> {
        self.registry.get(id)?;
        self.bids.get(id).await
    }

    /// Cached ask book of a venue.
    pub async fn ask_order_book(&self, id: &Pubkey) -> Option<Snapshot<OrderBookSnapshot>> {
        self.registry.get(id)?;
        self.asks.get(id).await
    }

    /// Cached event queue of a venue.
    pub async fn event_queue(&self, id: &Pubkey) -> Option<Snapshot<EventQueueSnapshot>> {
        self.registry.get(id)?;
        self.events.get(id).await
    }

    /// One side of a venue's book, best-first, with cumulative notional
    /// shares, resolved owners and display identities.
    pub async fn book_listing(&self, id: &Pubkey, side: Side) -> Option<BookListing> {
        let snapshot = match side {
            Side::Bid => self.bid_order_book(id).await?,
            Side::Ask => self.ask_order_book(id).await?,
        };
        let mut listing = BookListing::from_snapshot(&snapshot, snapshot.slot());
        let accounts = listing.entries.iter().map(|e| e.open_orders).collect::<Vec<_>>();
        let owners = self.owners.resolve(&accounts).await;
        for entry in listing.entries.iter_mut() {
            entry.owner = owners.get(&entry.open_orders).copied().flatten();
            entry.entity = entry.owner.and_then(|o| self.directory.entity(&o));
        }
        Some(listing)
    }

    /// Depth curves of a venue; `None` unless both sides have loaded.
    pub async fn depth(&self, id: &Pubkey) -> Option<MarketDepth> {
        let (bids, asks) = tokio::join!(self.bid_order_book(id), self.ask_order_book(id));
        let (bids, asks) = (bids?, asks?);
        Some(MarketDepth::from_books(&bids, &asks).with_slots(bids.slot(), asks.slot()))
    }

    /// Reconciled trades of a venue, newest first. Empty when the event queue
    /// never loaded.
    pub async fn trade_history(&self, id: &Pubkey) -> Vec<TradeHistoryEvent> {
        let Some(queue) = self.event_queue(id).await else {
            return Vec::new();
        };
        let accounts = queue.events().iter().map(|e| e.open_orders).collect::<Vec<_>>();
        let owners = self.owners.resolve(&accounts).await;
        TradeHistoryProcessor::new(&owners, self.directory.as_ref()).process(queue.events())
    }

    /// Swap transaction a fill belongs to, see [`Correlator::lookup`].
    pub fn correlate(
        &self,
        market: &Pubkey,
        open_orders: &Pubkey,
        owner: &Pubkey,
        price: f64,
        quantity: f64,
    ) -> Correlation {
        self.correlator.lookup(CorrelationKey::new(*market, *open_orders, *owner, price, quantity))
    }

    /// Correlates the taker side of a reconciled trade.
    pub fn correlate_trade(&self, market: &Pubkey, trade: &TradeHistoryEvent) -> Correlation {
        self.correlate(market, &trade.taker.open_orders, &trade.taker.owner, trade.price, trade.quantity)
    }

    /// Slot floors of a venue's feeds, 0 for feeds never loaded.
    pub fn slots(&self, id: &Pubkey) -> FeedSlots {
        FeedSlots { bids: self.bids.floor(id), asks: self.asks.floor(id), event_queue: self.events.floor(id) }
    }

    /// Spawns the cache refreshers and the registry refresher. All stop when
    /// `cancellation_token` is cancelled.
    pub fn spawn_refreshers(&self, cancellation_token: CancellationToken) -> Vec<JoinHandle<()>> {
        let registry = Arc::clone(&self.registry);
        let ledger = Arc::clone(&self.ledger);
        let tokens = Arc::clone(&self.tokens);
        let interval = self.config.registry_refresh;
        let token = cancellation_token.clone();
        let registry_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Registry is loaded by the caller before spawning
            ticker.tick().await;
            info!(interval = ?interval, "registry refresher started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = registry.refresh(ledger.as_ref(), tokens.as_ref()).await {
                            warn!(%err, "registry refresh failed, keeping current venues");
                        }
                    },
                }
            }
            info!("registry refresher stopped");
        });
        vec![
            self.bids.spawn_refresher(cancellation_token.clone()),
            self.asks.spawn_refresher(cancellation_token.clone()),
            self.events.spawn_refresher(cancellation_token),
            registry_task,
        ]
    }
}
