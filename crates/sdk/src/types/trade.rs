use solana_pubkey::Pubkey;

use crate::identity::Entity;

/// Counterparty of a reconciled trade.
#[derive(Clone, Debug, PartialEq)]
pub struct Counterparty {
    /// Open-orders account that took part in the fill.
    pub open_orders: Pubkey,

    /// Resolved owner wallet, or the open-orders account itself when the
    /// owner could not be resolved.
    pub owner: Pubkey,

    /// Whether [`Counterparty::owner`] came from an actual owner lookup.
    pub owner_resolved: bool,

    /// Display identity of the owner, when one is known.
    pub entity: Option<Entity>,
}

impl Counterparty {
    pub fn display_name(&self) -> Option<&str> { self.entity.as_ref().map(|e| e.name.as_str()) }
}

/// One taker fill from the event queue paired with its adjacent maker.
///
/// Derived on demand from the cached event queue snapshot; never stored.
#[derive(Clone, derive_more::Debug)]
pub struct TradeHistoryEvent {
    /// Position of the taker event in the newest-first event sequence.
    pub index: usize,

    #[debug("{price}")]
    pub price: f64,

    #[debug("{quantity}")]
    pub quantity: f64,

    pub taker: Counterparty,

    /// Maker side of the fill; absent when the adjacent event is missing or
    /// is not a maker fill.
    pub maker: Option<Counterparty>,

    pub fill: bool,
    pub out: bool,
    pub bid: bool,
    pub maker_flag: bool,
}

impl TradeHistoryEvent {
    /// Taker side of the trade.
    pub fn side(&self) -> super::Side { if self.bid { super::Side::Bid } else { super::Side::Ask } }

    pub fn notional(&self) -> f64 { self.price * self.quantity }
}

#[cfg(feature = "display")]
impl tabled::Tabled for TradeHistoryEvent {
    const LENGTH: usize = 6;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        use colored::Colorize;

        let party = |c: &Counterparty| match c.display_name() {
            Some(name) => format!("{} ({})", name, c.owner),
            None => c.owner.to_string(),
        };
        let side = self.side();
        vec![
            self.index.to_string().into(),
            match side {
                super::Side::Ask => format!("{}", side).red().to_string().into(),
                super::Side::Bid => format!("{}", side).green().to_string().into(),
            },
            self.price.to_string().into(),
            self.quantity.to_string().into(),
            party(&self.taker).into(),
            self.maker.as_ref().map(party).unwrap_or_else(|| "-".to_string()).into(),
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec!["#".into(), "Side".into(), "Price".into(), "Size".into(), "Taker".into(), "Maker".into()]
    }
}
