use solana_pubkey::Pubkey;

use super::derive;
use crate::{
    layout::{MARKET_ACCOUNT_SIZE, account_flags, encode::*},
    state::EventFlags,
    types::Side,
};

/// Market account fixture. Related accounts are derived from the address.
#[derive(Clone, Debug)]
pub struct MarketAccount {
    pub address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub base_deposits_total: u64,
    pub base_fees_accrued: u64,
    pub quote_deposits_total: u64,
    pub quote_fees_accrued: u64,
    pub quote_dust_threshold: u64,
    pub fee_rate_bps: u64,
    pub referrer_rebates_accrued: u64,
}

impl MarketAccount {
    pub fn new(address: Pubkey, base_mint: Pubkey, quote_mint: Pubkey) -> Self {
        Self {
            address,
            vault_signer_nonce: 0,
            base_mint,
            quote_mint,
            base_vault: derive(&address, 1),
            quote_vault: derive(&address, 2),
            request_queue: derive(&address, 3),
            event_queue: derive(&address, 4),
            bids: derive(&address, 5),
            asks: derive(&address, 6),
            base_lot_size: 1,
            quote_lot_size: 1,
            base_deposits_total: 0,
            base_fees_accrued: 0,
            quote_deposits_total: 0,
            quote_fees_accrued: 0,
            quote_dust_threshold: 100,
            fee_rate_bps: 22,
            referrer_rebates_accrued: 0,
        }
    }

    pub fn with_lot_sizes(self, base_lot_size: u64, quote_lot_size: u64) -> Self {
        Self { base_lot_size, quote_lot_size, ..self }
    }

    pub fn with_deposits(self, base_deposits_total: u64, quote_deposits_total: u64) -> Self {
        Self { base_deposits_total, quote_deposits_total, ..self }
    }

    pub fn book(&self, side: Side) -> Pubkey {
        match side {
            Side::Bid => self.bids,
            Side::Ask => self.asks,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::account(account_flags::INITIALIZED | account_flags::MARKET);
        w.pubkey(&self.address)
            .u64(self.vault_signer_nonce)
            .pubkey(&self.base_mint)
            .pubkey(&self.quote_mint)
            .pubkey(&self.base_vault)
            .u64(self.base_deposits_total)
            .u64(self.base_fees_accrued)
            .pubkey(&self.quote_vault)
            .u64(self.quote_deposits_total)
            .u64(self.quote_fees_accrued)
            .u64(self.quote_dust_threshold)
            .pubkey(&self.request_queue)
            .pubkey(&self.event_queue)
            .pubkey(&self.bids)
            .pubkey(&self.asks)
            .u64(self.base_lot_size)
            .u64(self.quote_lot_size)
            .u64(self.fee_rate_bps)
            .u64(self.referrer_rebates_accrued);
        let tail = MARKET_ACCOUNT_SIZE - 7;
        if w.len() < tail {
            w.zeros(tail - w.len());
        }
        w.finish()
    }
}

#[derive(Clone, Debug)]
pub struct RestingOrder {
    pub price_lots: u64,
    pub quantity_lots: u64,
    pub open_orders: Pubkey,
    pub client_order_id: u64,
}

/// Bids or asks slab fixture.
///
/// Orders are keyed by price and insertion sequence and laid out as a
/// right-leaning crit-bit chain.
#[derive(Clone, Debug)]
pub struct BookAccount {
    pub side: Side,
    pub orders: Vec<RestingOrder>,
}

impl BookAccount {
    pub fn new(side: Side) -> Self { Self { side, orders: Vec::new() } }

    pub fn order(mut self, price_lots: u64, quantity_lots: u64, open_orders: Pubkey) -> Self {
        let client_order_id = self.orders.len() as u64;
        self.orders.push(RestingOrder { price_lots, quantity_lots, open_orders, client_order_id });
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let flags = account_flags::INITIALIZED
            | match self.side {
                Side::Bid => account_flags::BIDS,
                Side::Ask => account_flags::ASKS,
            };

        let mut leaves: Vec<(u128, &RestingOrder)> = self
            .orders
            .iter()
            .enumerate()
            .map(|(seq, o)| (((o.price_lots as u128) << 64) | seq as u128, o))
            .collect();
        leaves.sort_by_key(|(key, _)| *key);

        let n = leaves.len() as u32;
        let num_nodes = if n == 0 { 0 } else { 2 * n - 1 };
        let root = if n <= 1 { 0 } else { n };

        let mut w = Writer::account(flags);
        w.u32(num_nodes).zeros(4).u32(0).zeros(4).u32(0).u32(root).u32(n).zeros(4);
        debug_assert_eq!(w.len(), SLAB_NODES_OFFSET);

        for (key, order) in &leaves {
            w.u32(LEAF)
                .u8(0)
                .u8(0)
                .zeros(2)
                .u128(*key)
                .pubkey(&order.open_orders)
                .u64(order.quantity_lots)
                .u64(order.client_order_id);
        }
        // Inner node j: left is leaf j, right is the next inner node or the
        // last leaf.
        for j in 0..n.saturating_sub(1) {
            let right = if j + 2 == n { n - 1 } else { n + j + 1 };
            w.u32(INNER).u32(0).u128(leaves[j as usize].0).u32(j).u32(right).zeros(SLAB_NODE - 32);
        }
        // Spare free nodes
        w.zeros(2 * SLAB_NODE);
        w.finish()
    }
}

/// Event queue record fixture.
#[derive(Clone, Debug, Default)]
pub struct EventRecord {
    pub flags: EventFlags,
    pub open_orders_slot: u8,
    pub fee_tier: u8,
    pub native_quantity_released: u64,
    pub native_quantity_paid: u64,
    pub native_fee_or_rebate: u64,
    pub order_id: u128,
    pub open_orders: Pubkey,
    pub client_order_id: u64,
}

impl EventRecord {
    /// Fee-free fill of `base_native` at `quote_native` total, from the point
    /// of view of the `side` order.
    pub fn fill(side: Side, maker: bool, open_orders: Pubkey, quote_native: u64, base_native: u64) -> Self {
        let bid = side == Side::Bid;
        let (released, paid) = if bid { (base_native, quote_native) } else { (quote_native, base_native) };
        Self {
            flags: EventFlags { fill: true, bid, maker, ..Default::default() },
            native_quantity_released: released,
            native_quantity_paid: paid,
            open_orders,
            ..Default::default()
        }
    }

    /// Order removed from the book.
    pub fn out(side: Side, open_orders: Pubkey) -> Self {
        Self {
            flags: EventFlags { out: true, bid: side == Side::Bid, ..Default::default() },
            open_orders,
            ..Default::default()
        }
    }

    pub fn with_fee(self, native_fee_or_rebate: u64) -> Self { Self { native_fee_or_rebate, ..self } }
}

/// Event queue ring fixture.
///
/// `events` are given newest first, as the decoder yields them, and written
/// oldest first starting at `head`.
#[derive(Clone, Debug)]
pub struct EventQueueAccount {
    pub events: Vec<EventRecord>,
    pub capacity: usize,
    pub head: u32,
    pub seq_num: u32,
}

impl EventQueueAccount {
    pub fn new(events: Vec<EventRecord>) -> Self {
        let capacity = events.len().max(1);
        Self { events, capacity, head: 0, seq_num: 0 }
    }

    pub fn with_capacity(self, capacity: usize) -> Self { Self { capacity: capacity.max(self.events.len()), ..self } }

    pub fn with_head(self, head: u32) -> Self { Self { head, ..self } }

    pub fn encode(&self) -> Vec<u8> {
        let count = self.events.len();
        let mut slots: Vec<Option<&EventRecord>> = vec![None; self.capacity];
        for (k, event) in self.events.iter().rev().enumerate() {
            slots[(self.head as usize + k) % self.capacity] = Some(event);
        }

        let mut w = Writer::account(account_flags::INITIALIZED | account_flags::EVENT_QUEUE);
        w.u32(self.head).zeros(4).u32(count as u32).zeros(4).u32(self.seq_num).zeros(4);
        for slot in slots {
            match slot {
                Some(e) => {
                    w.u8(e.flags.bits())
                        .u8(e.open_orders_slot)
                        .u8(e.fee_tier)
                        .zeros(5)
                        .u64(e.native_quantity_released)
                        .u64(e.native_quantity_paid)
                        .u64(e.native_fee_or_rebate)
                        .u128(e.order_id)
                        .pubkey(&e.open_orders)
                        .u64(e.client_order_id);
                },
                None => {
                    w.zeros(EVENT);
                },
            }
        }
        w.finish()
    }
}

/// Open-orders account fixture holding only the market and owner.
pub fn encode_open_orders(market: &Pubkey, owner: &Pubkey) -> Vec<u8> {
    let mut w = Writer::account(account_flags::INITIALIZED | account_flags::OPEN_ORDERS);
    w.pubkey(market).pubkey(owner);
    w.zeros(OPEN_ORDERS_SIZE - 7 - w.len());
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::{decode_event_queue, decode_market, decode_open_orders_owner, decode_order_book},
        num::Converter,
        testing::key,
    };

    #[test]
    fn fixtures_decode() {
        let market = MarketAccount::new(key(1), key(2), key(3)).with_lot_sizes(100, 10);
        let venue = decode_market(&market.encode()).unwrap();
        assert_eq!(venue.address(), key(1));
        assert_eq!(venue.bids(), market.bids);
        assert_eq!(venue.quote_lot_size(), 10);

        let asks = BookAccount::new(Side::Ask).order(12, 1, key(7)).order(10, 2, key(8)).order(11, 3, key(9));
        let book = decode_order_book(&asks.encode(), Converter::new(1, 1, 0, 0)).unwrap();
        let prices: Vec<u64> = book.orders().iter().map(|o| o.price_lots()).collect();
        assert_eq!(prices, vec![10, 11, 12]);

        let bids = BookAccount::new(Side::Bid).order(9, 1, key(7)).order(8, 1, key(7));
        let book = decode_order_book(&bids.encode(), Converter::new(1, 1, 0, 0)).unwrap();
        assert_eq!(book.best_price(), Some(9.0));

        let queue = EventQueueAccount::new(vec![
            EventRecord::fill(Side::Bid, false, key(4), 30, 3),
            EventRecord::out(Side::Ask, key(5)),
        ])
        .with_capacity(4)
        .with_head(3);
        let decoded = decode_event_queue(&queue.encode(), Converter::new(1, 1, 0, 0)).unwrap();
        assert_eq!(decoded.events().len(), 2);
        assert_eq!(decoded.events()[0].open_orders, key(4));
        assert_eq!(decoded.events()[0].price, 10.0);
        assert!(decoded.events()[1].flags.out);

        let data = encode_open_orders(&key(1), &key(6));
        assert_eq!(data.len(), OPEN_ORDERS_SIZE);
        assert_eq!(decode_open_orders_owner(&data).unwrap(), key(6));
    }
}
