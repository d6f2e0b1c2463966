use itertools::Itertools;
use solana_pubkey::Pubkey;

use crate::{identity::Entity, num::Converter, types::Side};

/// Resting order decoded from a slab leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookOrder {
    /// Full 128-bit slab key: price in lots in the upper half, sequence number
    /// in the lower half.
    pub(crate) key: u128,
    pub(crate) price_lots: u64,
    pub(crate) quantity_lots: u64,
    pub(crate) open_orders: Pubkey,
    pub(crate) owner_slot: u8,
    pub(crate) fee_tier: u8,
    pub(crate) client_order_id: u64,
}

impl BookOrder {
    pub fn key(&self) -> u128 { self.key }

    pub fn price_lots(&self) -> u64 { self.price_lots }

    pub fn quantity_lots(&self) -> u64 { self.quantity_lots }

    pub fn open_orders(&self) -> Pubkey { self.open_orders }

    pub fn owner_slot(&self) -> u8 { self.owner_slot }

    pub fn fee_tier(&self) -> u8 { self.fee_tier }

    pub fn client_order_id(&self) -> u64 { self.client_order_id }
}

/// Aggregated orders at a single price.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
    pub num_orders: usize,
}

/// Immutable decoded snapshot of one side of a venue's book.
///
/// Orders are stored best-first: descending price for bids, ascending for
/// asks, time priority within a price.
#[derive(Clone, Debug)]
pub struct OrderBookSnapshot {
    side: Side,
    converter: Converter,
    orders: Vec<BookOrder>,
}

impl OrderBookSnapshot {
    pub(crate) fn new(side: Side, converter: Converter, orders: Vec<BookOrder>) -> Self {
        Self { side, converter, orders }
    }

    pub fn side(&self) -> Side { self.side }

    pub fn converter(&self) -> Converter { self.converter }

    pub fn orders(&self) -> &[BookOrder] { &self.orders }

    pub fn len(&self) -> usize { self.orders.len() }

    pub fn is_empty(&self) -> bool { self.orders.is_empty() }

    pub fn best(&self) -> Option<&BookOrder> { self.orders.first() }

    /// Best price in decimal units.
    pub fn best_price(&self) -> Option<f64> {
        self.best().map(|o| self.converter.price_from_lots(o.price_lots))
    }

    pub fn price(&self, order: &BookOrder) -> f64 { self.converter.price_from_lots(order.price_lots) }

    pub fn quantity(&self, order: &BookOrder) -> f64 {
        self.converter.quantity_from_lots(order.quantity_lots)
    }

    /// Price levels best-first with summed quantities.
    pub fn levels(&self) -> Vec<PriceLevel> {
        self.orders
            .iter()
            .chunk_by(|o| o.price_lots)
            .into_iter()
            .map(|(price_lots, orders)| {
                let (quantity_lots, num_orders) =
                    orders.fold((0u64, 0usize), |(q, n), o| (q.saturating_add(o.quantity_lots), n + 1));
                PriceLevel {
                    price: self.converter.price_from_lots(price_lots),
                    quantity: self.converter.quantity_from_lots(quantity_lots),
                    num_orders,
                }
            })
            .collect()
    }

    /// Total resting quantity in decimal units.
    pub fn total_quantity(&self) -> f64 {
        self.converter
            .quantity_from_lots(self.orders.iter().fold(0u64, |q, o| q.saturating_add(o.quantity_lots)))
    }
}

/// Row of a book listing with cumulative notional share and owner identity.
#[derive(Clone, derive_more::Debug)]
pub struct BookEntry {
    pub side: Side,
    #[debug("{price}")]
    pub price: f64,
    #[debug("{quantity}")]
    pub quantity: f64,
    pub open_orders: Pubkey,
    pub owner: Option<Pubkey>,
    pub entity: Option<Entity>,
    /// Cumulative notional up to and including this order as a fraction of
    /// the side's total notional, in `[0, 1]`.
    #[debug("{percent}")]
    pub percent: f64,
}

impl BookEntry {
    pub fn notional(&self) -> f64 { self.price * self.quantity }
}

/// One side of a venue's book prepared for presentation, best-first.
#[derive(Clone, Debug)]
pub struct BookListing {
    pub side: Side,
    pub slot: crate::types::Slot,
    pub approximate: bool,
    pub levels: Vec<PriceLevel>,
    pub total_quantity: f64,
    pub entries: Vec<BookEntry>,
}

impl BookListing {
    /// Builds entries from a snapshot, attaching cumulative notional shares.
    /// Owners and identities are filled in by the caller.
    pub(crate) fn from_snapshot(snapshot: &OrderBookSnapshot, slot: crate::types::Slot) -> Self {
        let priced = snapshot
            .orders()
            .iter()
            .map(|o| (o, snapshot.price(o), snapshot.quantity(o)))
            .collect::<Vec<_>>();
        let aggregate: f64 = priced.iter().map(|(_, p, q)| p * q).sum();
        let mut running = 0.0;
        let entries = priced
            .into_iter()
            .map(|(order, price, quantity)| {
                running += price * quantity;
                BookEntry {
                    side: snapshot.side(),
                    price,
                    quantity,
                    open_orders: order.open_orders,
                    owner: None,
                    entity: None,
                    percent: if aggregate > 0.0 { running / aggregate } else { 0.0 },
                }
            })
            .collect();
        Self {
            side: snapshot.side(),
            slot,
            approximate: snapshot.converter().is_approximate(),
            levels: snapshot.levels(),
            total_quantity: snapshot.total_quantity(),
            entries,
        }
    }
}

#[cfg(feature = "display")]
impl tabled::Tabled for BookEntry {
    const LENGTH: usize = 6;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        use colored::Colorize;

        let colorize = |s: String| -> std::borrow::Cow<'static, str> {
            match self.side {
                Side::Ask => s.red().to_string().into(),
                Side::Bid => s.green().to_string().into(),
            }
        };
        vec![
            colorize(self.price.to_string()),
            colorize(self.quantity.to_string()),
            format!("{:.2} %", self.percent * 100.0).into(),
            self.open_orders.to_string().into(),
            self.owner.map(|o| o.to_string()).unwrap_or_else(|| "-".to_string()).into(),
            self.entity.as_ref().map(|e| e.name.clone()).unwrap_or_default().into(),
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec![
            "Price".into(),
            "Size".into(),
            "Cum Notional".into(),
            "Open Orders".into(),
            "Owner".into(),
            "Entity".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(price_lots: u64, quantity_lots: u64, seq: u64) -> BookOrder {
        BookOrder {
            key: ((price_lots as u128) << 64) | seq as u128,
            price_lots,
            quantity_lots,
            open_orders: Pubkey::new_from_array([seq as u8; 32]),
            owner_slot: 0,
            fee_tier: 0,
            client_order_id: seq,
        }
    }

    #[test]
    fn levels_aggregate_adjacent_prices() {
        let book = OrderBookSnapshot::new(
            Side::Bid,
            Converter::new(1, 1, 0, 0),
            vec![order(12, 1, 1), order(12, 2, 2), order(10, 5, 3)],
        );
        assert_eq!(
            book.levels(),
            vec![
                PriceLevel { price: 12.0, quantity: 3.0, num_orders: 2 },
                PriceLevel { price: 10.0, quantity: 5.0, num_orders: 1 },
            ]
        );
        assert_eq!(book.best_price(), Some(12.0));
        assert_eq!(book.total_quantity(), 8.0);
    }

    #[test]
    fn level_quantities_saturate() {
        let book = OrderBookSnapshot::new(
            Side::Ask,
            Converter::new(1, 1, 0, 0),
            vec![order(5, u64::MAX, 1), order(5, 1, 2)],
        );
        assert_eq!(book.levels()[0].quantity, u64::MAX as f64);
        assert_eq!(book.levels()[0].num_orders, 2);
        assert_eq!(book.total_quantity(), u64::MAX as f64);
    }

    #[test]
    fn listing_cumulative_percent() {
        let book = OrderBookSnapshot::new(
            Side::Ask,
            Converter::new(1, 1, 0, 0),
            vec![order(10, 1, 1), order(20, 2, 2), order(50, 1, 3)],
        );
        let listing = BookListing::from_snapshot(&book, 7);
        let percents = listing.entries.iter().map(|e| e.percent).collect::<Vec<_>>();
        assert_eq!(percents, vec![0.1, 0.5, 1.0]);
        assert_eq!(listing.slot, 7);
        assert_eq!(listing.levels.len(), 3);
        assert_eq!(listing.total_quantity, 4.0);
    }

    #[test]
    fn listing_of_empty_book() {
        let book = OrderBookSnapshot::new(Side::Bid, Converter::new(1, 1, 0, 0), vec![]);
        assert!(BookListing::from_snapshot(&book, 1).entries.is_empty());
        assert_eq!(book.best_price(), None);
    }
}
