//! Cumulative depth curves for charting.

#[cfg(feature = "display")]
mod view;

#[cfg(feature = "display")]
pub use view::DepthView;

use crate::{state::OrderBookSnapshot, types::Slot};

/// One order on a depth curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthPoint {
    pub price: f64,
    /// Cumulative quantity at this price: everything at or above it for
    /// bids, at or below it for asks.
    pub cumulative: f64,
    pub quantity: f64,
}

/// Depth curves of both sides of a venue, each in ascending price order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarketDepth {
    pub bids: Vec<DepthPoint>,
    pub asks: Vec<DepthPoint>,
    pub midpoint: f64,
    pub bid_slot: Slot,
    pub ask_slot: Slot,
    /// Whether any price was computed with default mint decimals.
    pub approximate: bool,
}

impl MarketDepth {
    /// Builds depth curves from `(price, quantity)` orders of each side, in
    /// any order.
    pub fn build(
        bids: impl IntoIterator<Item = (f64, f64)>,
        asks: impl IntoIterator<Item = (f64, f64)>,
    ) -> Self {
        let mut bids = bids.into_iter().collect::<Vec<_>>();
        let mut asks = asks.into_iter().collect::<Vec<_>>();
        bids.sort_by(|a, b| a.0.total_cmp(&b.0));
        asks.sort_by(|a, b| a.0.total_cmp(&b.0));

        let best_bid = bids.last().map(|b| b.0).unwrap_or(0.0);
        let best_ask = asks.first().map(|a| a.0).unwrap_or(0.0);

        // Bids: remaining total, shrinking as price rises toward the spread
        let mut remaining: f64 = bids.iter().map(|b| b.1).sum();
        let bids = bids
            .into_iter()
            .map(|(price, quantity)| {
                let point = DepthPoint { price, cumulative: remaining, quantity };
                remaining -= quantity;
                point
            })
            .collect();

        let mut running = 0.0;
        let asks = asks
            .into_iter()
            .map(|(price, quantity)| {
                running += quantity;
                DepthPoint { price, cumulative: running, quantity }
            })
            .collect();

        Self { bids, asks, midpoint: (best_bid + best_ask) / 2.0, ..Default::default() }
    }

    /// Builds depth curves from decoded book snapshots.
    pub fn from_books(bids: &OrderBookSnapshot, asks: &OrderBookSnapshot) -> Self {
        let orders = |book: &OrderBookSnapshot| {
            book.orders().iter().map(|o| (book.price(o), book.quantity(o))).collect::<Vec<_>>()
        };
        Self {
            approximate: bids.converter().is_approximate() || asks.converter().is_approximate(),
            ..Self::build(orders(bids), orders(asks))
        }
    }

    pub fn with_slots(self, bid_slot: Slot, ask_slot: Slot) -> Self { Self { bid_slot, ask_slot, ..self } }

    pub fn best_bid(&self) -> Option<f64> { self.bids.last().map(|p| p.price) }

    pub fn best_ask(&self) -> Option<f64> { self.asks.first().map(|p| p.price) }

    pub fn spread(&self) -> Option<f64> { Some(self.best_ask()? - self.best_bid()?) }

    /// Renders the curves as a table, see [`DepthView`].
    #[cfg(feature = "display")]
    pub fn view(&self, levels: Option<usize>) -> DepthView<'_> { DepthView::new(self, levels) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cumulative(points: &[DepthPoint]) -> Vec<f64> { points.iter().map(|p| p.cumulative).collect() }

    #[test]
    fn cumulative_curves_and_midpoint() {
        let depth = MarketDepth::build([(9.0, 1.0), (8.0, 2.0)], [(10.0, 1.0), (11.0, 2.0)]);
        assert_eq!(cumulative(&depth.asks), vec![1.0, 3.0]);
        assert_eq!(depth.midpoint, 9.5);

        // Ascending prices, remaining totals
        assert_eq!(depth.bids.iter().map(|p| p.price).collect::<Vec<_>>(), vec![8.0, 9.0]);
        assert_eq!(cumulative(&depth.bids), vec![3.0, 1.0]);
        assert_eq!(depth.spread(), Some(1.0));
    }

    #[test]
    fn one_sided_book() {
        let none: [(f64, f64); 0] = [];
        let depth = MarketDepth::build(none, [(10.0, 1.0)]);
        assert!(depth.bids.is_empty());
        assert_eq!(depth.midpoint, 5.0);
        assert_eq!(depth.spread(), None);

        let depth = MarketDepth::build(none, none);
        assert_eq!(depth.midpoint, 0.0);
    }
}
