use std::iter;

use colored::Colorize;
use tabled::{
    Table,
    settings::{
        Alignment, Panel, Style, Width,
        object::{Row, Rows},
    },
};

use super::MarketDepth;

/// Table view of a [`MarketDepth`]: asks on top (best ask last), bids below
/// (best bid first), optionally limited to a number of points per side.
pub struct DepthView<'a> {
    depth: &'a MarketDepth,
    levels: Option<usize>,
}

impl<'a> DepthView<'a> {
    pub(crate) fn new(depth: &'a MarketDepth, levels: Option<usize>) -> Self { Self { depth, levels } }
}

impl<'a> std::fmt::Display for DepthView<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let num_asks = self.levels.unwrap_or(self.depth.asks.len()).min(self.depth.asks.len());
        let num_bids = self.levels.unwrap_or(self.depth.bids.len()).min(self.depth.bids.len());

        let asks = self.depth.asks.iter().take(num_asks).rev().map(|p| {
            vec![
                p.price.to_string().red().to_string(),
                p.quantity.to_string().red().to_string(),
                p.cumulative.to_string().red().to_string(),
            ]
        });
        let bids = self.depth.bids.iter().rev().take(num_bids).map(|p| {
            vec![
                p.price.to_string().green().to_string(),
                p.quantity.to_string().green().to_string(),
                p.cumulative.to_string().green().to_string(),
            ]
        });

        let mut table = Table::from_iter(
            iter::once(vec!["Price".to_string(), "Size".to_string(), "Cum Size".to_string()])
                .chain(asks)
                .chain(bids),
        );

        table.with(Panel::header(format!(
            "ASK slot: {} :: BID slot: {}{}",
            self.depth.ask_slot,
            self.depth.bid_slot,
            if self.depth.approximate { " :: APPROXIMATE" } else { "" },
        )));
        table.modify(Rows::first(), Alignment::right());

        if let Some((best_ask, best_bid)) = self.depth.best_ask().zip(self.depth.best_bid()) {
            // +2 for header panel and column names
            table.with(Panel::horizontal(
                num_asks + 2,
                format!(
                    "Best ASK: {} :: Best BID: {} :: Mid: {} :: Spread: {} ({:.2} %)",
                    best_ask,
                    best_bid,
                    self.depth.midpoint,
                    best_ask - best_bid,
                    (best_ask - best_bid) / self.depth.midpoint * 100.0
                ),
            ));
            table.modify(Row::from(num_asks + 2), Alignment::right());
        }

        if let Some(max_width) = f.width() {
            table.with(Width::wrap(max_width));
        }

        table.with(Style::modern());
        writeln!(f, "{}", table)
    }
}
