//! Snapshot loaders for the per-venue caches.

use std::sync::Arc;

use solana_pubkey::Pubkey;

use crate::{
    cache::{Fetched, SnapshotLoader},
    error::DataError,
    layout,
    ledger::Ledger,
    registry::MarketRegistry,
    state::{EventQueueSnapshot, OrderBookSnapshot},
    types::{Side, Slot},
};

/// Loads one side of a venue's book.
pub struct BookFeed<L> {
    ledger: Arc<L>,
    registry: Arc<MarketRegistry>,
    side: Side,
}

impl<L> BookFeed<L> {
    pub fn new(ledger: Arc<L>, registry: Arc<MarketRegistry>, side: Side) -> Self {
        Self { ledger, registry, side }
    }

    pub fn side(&self) -> Side { self.side }
}

impl<L: Ledger> SnapshotLoader<Pubkey, OrderBookSnapshot> for BookFeed<L> {
    async fn load(&self, market: &Pubkey, min_slot: Slot) -> Result<Fetched<OrderBookSnapshot>, DataError> {
        let venue = self.registry.get(market).ok_or(DataError::UnknownVenue(*market))?;
        let address = match self.side {
            Side::Bid => venue.bids(),
            Side::Ask => venue.asks(),
        };
        let account = self.ledger.account(&address, min_slot).await?;
        let book = layout::decode_order_book(&account.data, venue.converter())?;
        if book.side() != self.side {
            return Err(DataError::InvalidResponse(format!(
                "{} account {} holds {} orders",
                self.side,
                address,
                book.side()
            )));
        }
        Ok(Fetched::new(book, account.slot))
    }
}

/// Loads a venue's event queue.
pub struct EventQueueFeed<L> {
    ledger: Arc<L>,
    registry: Arc<MarketRegistry>,
}

impl<L> EventQueueFeed<L> {
    pub fn new(ledger: Arc<L>, registry: Arc<MarketRegistry>) -> Self { Self { ledger, registry } }
}

impl<L: Ledger> SnapshotLoader<Pubkey, EventQueueSnapshot> for EventQueueFeed<L> {
    async fn load(&self, market: &Pubkey, min_slot: Slot) -> Result<Fetched<EventQueueSnapshot>, DataError> {
        let venue = self.registry.get(market).ok_or(DataError::UnknownVenue(*market))?;
        let account = self.ledger.account(&venue.event_queue(), min_slot).await?;
        let queue = layout::decode_event_queue(&account.data, venue.converter())?;
        Ok(Fetched::new(queue, account.slot))
    }
}
