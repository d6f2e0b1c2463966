//! Trade history derived from an event queue snapshot.
//!
//! # Architecture
//!
//! - [`TradeHistoryProcessor`] - pure pairing of takers with makers, no I/O
//! - [`crate::identity::OwnerResolver`] - async owner lookup feeding the
//!   processor
//!
//! # Pairing
//!
//! The event queue is read newest-first. Each non-maker event is a taker
//! fill and its maker is the event right after it. Maker events are never
//! reported on their own. When the adjacent event is missing or is not a
//! maker fill, the trade is reported without a maker.

use std::collections::HashMap;

use solana_pubkey::Pubkey;
use tracing::debug;

use crate::{
    identity::IdentityDirectory,
    state::FillEvent,
    types::{Counterparty, TradeHistoryEvent},
};

/// Pairs taker and maker fills, attaching owners and display identities.
pub struct TradeHistoryProcessor<'a> {
    owners: &'a HashMap<Pubkey, Option<Pubkey>>,
    directory: &'a dyn IdentityDirectory,
}

impl<'a> TradeHistoryProcessor<'a> {
    pub fn new(owners: &'a HashMap<Pubkey, Option<Pubkey>>, directory: &'a dyn IdentityDirectory) -> Self {
        Self { owners, directory }
    }

    /// Reconciles newest-first `events` into trades, newest first.
    pub fn process(&self, events: &[FillEvent]) -> Vec<TradeHistoryEvent> {
        events
            .iter()
            .enumerate()
            .filter(|(_, event)| !event.flags.maker)
            .map(|(i, taker)| {
                let maker = match events.get(i + 1) {
                    Some(next) if next.flags.maker => Some(self.maker(next)),
                    Some(next) => {
                        debug!(position = taker.position, next = next.position, "adjacent event is not a maker fill");
                        None
                    },
                    None => None,
                };
                TradeHistoryEvent {
                    index: taker.position,
                    price: taker.price,
                    quantity: taker.quantity,
                    taker: self.taker(taker),
                    maker,
                    fill: taker.flags.fill,
                    out: taker.flags.out,
                    bid: taker.flags.bid,
                    maker_flag: taker.flags.maker,
                }
            })
            .collect()
    }

    fn resolved_owner(&self, open_orders: &Pubkey) -> Option<Pubkey> {
        self.owners.get(open_orders).copied().flatten()
    }

    /// Taker identity is looked up on the effective owner, even when it fell
    /// back to the open-orders account.
    fn taker(&self, event: &FillEvent) -> Counterparty {
        let resolved = self.resolved_owner(&event.open_orders);
        let owner = resolved.unwrap_or(event.open_orders);
        Counterparty {
            open_orders: event.open_orders,
            owner,
            owner_resolved: resolved.is_some(),
            entity: self.directory.entity(&owner),
        }
    }

    fn maker(&self, event: &FillEvent) -> Counterparty {
        match self.resolved_owner(&event.open_orders) {
            Some(owner) => Counterparty {
                open_orders: event.open_orders,
                owner,
                owner_resolved: true,
                entity: self.directory.entity(&owner),
            },
            None => Counterparty {
                open_orders: event.open_orders,
                owner: event.open_orders,
                owner_resolved: false,
                entity: None,
            },
        }
    }
}
