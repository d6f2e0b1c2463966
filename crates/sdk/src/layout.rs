//! Binary layouts of order book program accounts.
//!
//! Every account starts with the 5-byte `serum` magic followed by a `u64`
//! account flags word and ends with 7 bytes of `padding` tail. All integers are
//! little-endian.

use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::{
    num::Converter,
    state::{
        BookOrder, EventFlags, EventQueueSnapshot, FillEvent, OrderBookSnapshot, Venue,
        DEFAULT_DECIMALS,
    },
    types::Side,
};

pub const MARKET_ACCOUNT_SIZE: usize = 388;
pub const OPEN_ORDERS_ACCOUNT_SIZE: usize = 3228;

const HEAD_PADDING: &[u8; 5] = b"serum";
const TAIL_PADDING: &[u8; 7] = b"padding";
const ACCOUNT_HEADER_SIZE: usize = HEAD_PADDING.len() + 8;

const SLAB_HEADER_SIZE: usize = 32;
const SLAB_NODE_SIZE: usize = 72;
const SLAB_INNER_NODE: u32 = 1;
const SLAB_LEAF_NODE: u32 = 2;

const EVENT_QUEUE_HEADER_SIZE: usize = ACCOUNT_HEADER_SIZE + 24;
const EVENT_SIZE: usize = 88;

const OPEN_ORDERS_OWNER_OFFSET: usize = ACCOUNT_HEADER_SIZE + 32;

/// Account kind flags stored after the head padding.
pub mod account_flags {
    pub const INITIALIZED: u64 = 1 << 0;
    pub const MARKET: u64 = 1 << 1;
    pub const OPEN_ORDERS: u64 = 1 << 2;
    pub const REQUEST_QUEUE: u64 = 1 << 3;
    pub const EVENT_QUEUE: u64 = 1 << 4;
    pub const BIDS: u64 = 1 << 5;
    pub const ASKS: u64 = 1 << 6;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data too short: {len} bytes, need {need}")]
    TooShort { len: usize, need: usize },

    #[error("missing account head padding")]
    BadHeader,

    #[error("unexpected account flags {flags:#x}, expected {expected:#x}")]
    WrongKind { flags: u64, expected: u64 },

    #[error("slab node {0} out of range")]
    NodeOutOfRange(u32),

    #[error("unknown slab node tag {tag} at {index}")]
    UnknownNodeTag { index: u32, tag: u32 },

    #[error("slab traversal did not terminate")]
    Cycle,

    #[error("slab claims {leaf_count} leaves in {nodes} nodes")]
    LeafCountOutOfRange { leaf_count: u32, nodes: usize },
}

/// Little-endian cursor over account bytes.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn at(data: &'a [u8], offset: usize) -> Self { Self { data, offset } }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or(DecodeError::TooShort { len: self.data.len(), need: end })?;
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn skip(&mut self, n: usize) -> &mut Self {
        self.offset += n;
        self
    }

    fn u8(&mut self) -> Result<u8, DecodeError> { Ok(self.take::<1>()?[0]) }

    fn u32(&mut self) -> Result<u32, DecodeError> { Ok(u32::from_le_bytes(self.take()?)) }

    fn u64(&mut self) -> Result<u64, DecodeError> { Ok(u64::from_le_bytes(self.take()?)) }

    fn u128(&mut self) -> Result<u128, DecodeError> { Ok(u128::from_le_bytes(self.take()?)) }

    fn pubkey(&mut self) -> Result<Pubkey, DecodeError> { Ok(Pubkey::new_from_array(self.take()?)) }
}

/// Validates head padding and returns account flags.
fn account_flags(data: &[u8], expected: u64) -> Result<u64, DecodeError> {
    if data.len() < ACCOUNT_HEADER_SIZE {
        return Err(DecodeError::TooShort { len: data.len(), need: ACCOUNT_HEADER_SIZE });
    }
    if &data[..HEAD_PADDING.len()] != HEAD_PADDING {
        return Err(DecodeError::BadHeader);
    }
    let flags = Reader::at(data, HEAD_PADDING.len()).u64()?;
    if flags & expected != expected {
        return Err(DecodeError::WrongKind { flags, expected });
    }
    Ok(flags)
}

/// Decodes a market account into a [`Venue`] keyed by its own address field.
///
/// Mint decimals are not part of the account; they are set to the default
/// and flagged synthetic until resolved from token metadata.
pub fn decode_market(data: &[u8]) -> Result<Venue, DecodeError> {
    account_flags(data, account_flags::INITIALIZED | account_flags::MARKET)?;
    if data.len() < MARKET_ACCOUNT_SIZE {
        return Err(DecodeError::TooShort { len: data.len(), need: MARKET_ACCOUNT_SIZE });
    }

    let mut r = Reader::at(data, ACCOUNT_HEADER_SIZE);
    let address = r.pubkey()?;
    let vault_signer_nonce = r.u64()?;
    let base_mint = r.pubkey()?;
    let quote_mint = r.pubkey()?;
    let base_vault = r.pubkey()?;
    let base_deposits_total = r.u64()?;
    let base_fees_accrued = r.u64()?;
    let quote_vault = r.pubkey()?;
    let quote_deposits_total = r.u64()?;
    let quote_fees_accrued = r.u64()?;
    let quote_dust_threshold = r.u64()?;
    let request_queue = r.pubkey()?;
    let event_queue = r.pubkey()?;
    let bids = r.pubkey()?;
    let asks = r.pubkey()?;
    let base_lot_size = r.u64()?;
    let quote_lot_size = r.u64()?;
    let fee_rate_bps = r.u64()?;
    let referrer_rebates_accrued = r.u64()?;

    Ok(Venue {
        address,
        vault_signer_nonce,
        base_mint,
        quote_mint,
        base_vault,
        quote_vault,
        request_queue,
        event_queue,
        bids,
        asks,
        base_lot_size,
        quote_lot_size,
        base_deposits_total,
        base_fees_accrued,
        quote_deposits_total,
        quote_fees_accrued,
        quote_dust_threshold,
        fee_rate_bps,
        referrer_rebates_accrued,
        base_decimals: DEFAULT_DECIMALS,
        quote_decimals: DEFAULT_DECIMALS,
        synthetic_decimals: true,
    })
}

/// Decodes a bids or asks slab into orders sorted best-first.
///
/// The slab is a crit-bit tree keyed by `price_lots << 64 | sequence`; an
/// in-order walk yields ascending keys, which is the ask order. Bids are
/// walked in reverse.
pub fn decode_order_book(data: &[u8], converter: Converter) -> Result<OrderBookSnapshot, DecodeError> {
    let flags = account_flags(data, account_flags::INITIALIZED)?;
    let side = if flags & account_flags::BIDS != 0 {
        Side::Bid
    } else if flags & account_flags::ASKS != 0 {
        Side::Ask
    } else {
        return Err(DecodeError::WrongKind { flags, expected: account_flags::BIDS | account_flags::ASKS });
    };

    let mut header = Reader::at(data, ACCOUNT_HEADER_SIZE);
    let bump_index = header.u32()?;
    let _free_list_len = header.skip(4).u32()?;
    let _free_list_head = header.skip(4).u32()?;
    let root = header.u32()?;
    let leaf_count = header.u32()?;

    let nodes_offset = ACCOUNT_HEADER_SIZE + SLAB_HEADER_SIZE;
    let capacity = (data.len().saturating_sub(nodes_offset)) / SLAB_NODE_SIZE;
    let num_nodes = (bump_index as usize).min(capacity);

    if leaf_count as usize > num_nodes {
        return Err(DecodeError::LeafCountOutOfRange { leaf_count, nodes: num_nodes });
    }
    let mut orders = Vec::with_capacity(leaf_count as usize);
    if leaf_count == 0 {
        return Ok(OrderBookSnapshot::new(side, converter, orders));
    }

    // Explicit stack; children pushed so the preferred child is popped first.
    let mut stack = vec![root];
    let mut visited = 0usize;
    while let Some(index) = stack.pop() {
        visited += 1;
        if visited > num_nodes {
            return Err(DecodeError::Cycle);
        }
        if index as usize >= num_nodes {
            return Err(DecodeError::NodeOutOfRange(index));
        }
        let mut node = Reader::at(data, nodes_offset + index as usize * SLAB_NODE_SIZE);
        match node.u32()? {
            SLAB_INNER_NODE => {
                let _prefix_len = node.u32()?;
                let _key = node.u128()?;
                let left = node.u32()?;
                let right = node.u32()?;
                match side {
                    Side::Ask => stack.extend([right, left]),
                    Side::Bid => stack.extend([left, right]),
                }
            },
            SLAB_LEAF_NODE => {
                let owner_slot = node.u8()?;
                let fee_tier = node.u8()?;
                let key = node.skip(2).u128()?;
                let open_orders = node.pubkey()?;
                let quantity_lots = node.u64()?;
                let client_order_id = node.u64()?;
                orders.push(BookOrder {
                    key,
                    price_lots: (key >> 64) as u64,
                    quantity_lots,
                    open_orders,
                    owner_slot,
                    fee_tier,
                    client_order_id,
                });
            },
            tag => return Err(DecodeError::UnknownNodeTag { index, tag }),
        }
    }

    Ok(OrderBookSnapshot::new(side, converter, orders))
}

/// Decodes an event queue ring buffer, newest event first.
pub fn decode_event_queue(data: &[u8], converter: Converter) -> Result<EventQueueSnapshot, DecodeError> {
    account_flags(data, account_flags::INITIALIZED | account_flags::EVENT_QUEUE)?;
    if data.len() < EVENT_QUEUE_HEADER_SIZE {
        return Err(DecodeError::TooShort { len: data.len(), need: EVENT_QUEUE_HEADER_SIZE });
    }

    let mut header = Reader::at(data, ACCOUNT_HEADER_SIZE);
    let head = header.u32()?;
    let count = header.skip(4).u32()?;
    let seq_num = header.skip(4).u32()?;

    let alloc_len = (data.len() - EVENT_QUEUE_HEADER_SIZE) / EVENT_SIZE;
    let mut events = Vec::with_capacity(alloc_len);
    for i in 0..alloc_len {
        let index = (head as usize + count as usize + alloc_len - 1 - i) % alloc_len;
        let mut r = Reader::at(data, EVENT_QUEUE_HEADER_SIZE + index * EVENT_SIZE);
        let flags = r.u8()?;
        let open_orders_slot = r.u8()?;
        let fee_tier = r.u8()?;
        let native_quantity_released = r.skip(5).u64()?;
        let native_quantity_paid = r.u64()?;
        let native_fee_or_rebate = r.u64()?;
        let order_id = r.u128()?;
        let open_orders = r.pubkey()?;
        let client_order_id = r.u64()?;

        // Never-written slot
        if flags == 0 && open_orders == Pubkey::default() {
            continue;
        }

        let flags = EventFlags::from_bits(flags);
        let mut event = FillEvent {
            position: events.len(),
            flags,
            open_orders_slot,
            fee_tier,
            native_quantity_released,
            native_quantity_paid,
            native_fee_or_rebate,
            order_id,
            open_orders,
            client_order_id,
            price_lots: 0,
            quantity_lots: 0,
            price: 0.0,
            quantity: 0.0,
        };
        price_fill(&mut event, converter);
        events.push(event);
    }

    Ok(EventQueueSnapshot::new(head, count, seq_num, events))
}

/// Derives price and quantity of a fill from native amounts.
///
/// Bids pay quote and receive base; asks the opposite. The fee is removed
/// from (maker rebate added to) the quote leg to get the pre-fee price.
fn price_fill(event: &mut FillEvent, converter: Converter) {
    if !event.flags.fill || event.native_quantity_paid == 0 {
        return;
    }
    let fee = event.native_fee_or_rebate;
    let (quote_native, base_native) = if event.flags.bid {
        let paid = event.native_quantity_paid;
        let quote = if event.flags.maker { paid.saturating_add(fee) } else { paid.saturating_sub(fee) };
        (quote, event.native_quantity_released)
    } else {
        let released = event.native_quantity_released;
        let quote =
            if event.flags.maker { released.saturating_sub(fee) } else { released.saturating_add(fee) };
        (quote, event.native_quantity_paid)
    };
    event.price = converter.price_from_natives(quote_native, base_native);
    event.quantity = converter.base_from_native(base_native);
    event.price_lots = converter.price_lots_from_natives(quote_native, base_native);
    event.quantity_lots = converter.quantity_lots_from_native(base_native);
}

/// Reads the owner wallet of an open-orders account.
pub fn decode_open_orders_owner(data: &[u8]) -> Result<Pubkey, DecodeError> {
    account_flags(data, account_flags::INITIALIZED | account_flags::OPEN_ORDERS)?;
    Reader::at(data, OPEN_ORDERS_OWNER_OFFSET).pubkey()
}

/// Writers for the layouts above, used to build fixture accounts.
#[cfg(feature = "testing")]
pub(crate) mod encode {
    use super::*;

    pub(crate) struct Writer {
        data: Vec<u8>,
    }

    impl Writer {
        pub(crate) fn account(flags: u64) -> Self {
            let mut data = Vec::with_capacity(MARKET_ACCOUNT_SIZE);
            data.extend_from_slice(HEAD_PADDING);
            data.extend_from_slice(&flags.to_le_bytes());
            Self { data }
        }

        pub(crate) fn u8(&mut self, v: u8) -> &mut Self {
            self.data.push(v);
            self
        }

        pub(crate) fn u32(&mut self, v: u32) -> &mut Self {
            self.data.extend_from_slice(&v.to_le_bytes());
            self
        }

        pub(crate) fn u64(&mut self, v: u64) -> &mut Self {
            self.data.extend_from_slice(&v.to_le_bytes());
            self
        }

        pub(crate) fn u128(&mut self, v: u128) -> &mut Self {
            self.data.extend_from_slice(&v.to_le_bytes());
            self
        }

        pub(crate) fn pubkey(&mut self, v: &Pubkey) -> &mut Self {
            self.data.extend_from_slice(v.as_ref());
            self
        }

        pub(crate) fn zeros(&mut self, n: usize) -> &mut Self {
            self.data.resize(self.data.len() + n, 0);
            self
        }

        pub(crate) fn len(&self) -> usize { self.data.len() }

        pub(crate) fn finish(mut self) -> Vec<u8> {
            self.data.extend_from_slice(TAIL_PADDING);
            self.data
        }
    }

    pub(crate) const SLAB_NODES_OFFSET: usize = ACCOUNT_HEADER_SIZE + SLAB_HEADER_SIZE;
    pub(crate) const SLAB_NODE: usize = SLAB_NODE_SIZE;
    pub(crate) const INNER: u32 = SLAB_INNER_NODE;
    pub(crate) const LEAF: u32 = SLAB_LEAF_NODE;
    pub(crate) const EVENT: usize = EVENT_SIZE;
    pub(crate) const OPEN_ORDERS_SIZE: usize = OPEN_ORDERS_ACCOUNT_SIZE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_accounts() {
        assert_eq!(
            decode_market(&[0u8; 4]),
            Err(DecodeError::TooShort { len: 4, need: ACCOUNT_HEADER_SIZE })
        );
        assert_eq!(
            decode_market(&[0u8; MARKET_ACCOUNT_SIZE]),
            Err(DecodeError::BadHeader)
        );

        let mut data = vec![0u8; MARKET_ACCOUNT_SIZE];
        data[..5].copy_from_slice(HEAD_PADDING);
        data[5] = (account_flags::INITIALIZED | account_flags::EVENT_QUEUE) as u8;
        assert!(matches!(
            decode_market(&data),
            Err(DecodeError::WrongKind { .. })
        ));
    }

    fn slab_with_header(bump_index: u32, leaf_count: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(HEAD_PADDING);
        data.extend_from_slice(&(account_flags::INITIALIZED | account_flags::BIDS).to_le_bytes());
        let mut slab = [0u8; SLAB_HEADER_SIZE];
        slab[..4].copy_from_slice(&bump_index.to_le_bytes());
        slab[24..28].copy_from_slice(&leaf_count.to_le_bytes());
        data.extend_from_slice(&slab);
        data.extend_from_slice(TAIL_PADDING);
        data
    }

    #[test]
    fn rejects_leaf_count_beyond_nodes() {
        let converter = Converter::new(1, 1, 0, 0);
        assert_eq!(
            decode_order_book(&slab_with_header(0, u32::MAX), converter).err(),
            Some(DecodeError::LeafCountOutOfRange { leaf_count: u32::MAX, nodes: 0 })
        );
        // bump index past the account size is clamped to what the data holds
        assert_eq!(
            decode_order_book(&slab_with_header(1_000, 1), converter).err(),
            Some(DecodeError::LeafCountOutOfRange { leaf_count: 1, nodes: 0 })
        );

        let empty = decode_order_book(&slab_with_header(0, 0), converter).unwrap();
        assert!(empty.orders().is_empty());
    }

    #[test]
    fn ask_fill_price() {
        let mut event = FillEvent {
            position: 0,
            flags: EventFlags { fill: true, maker: true, ..Default::default() },
            open_orders_slot: 0,
            fee_tier: 0,
            // ask maker receives quote, pays base
            native_quantity_released: 20_400,
            native_quantity_paid: 2_000,
            native_fee_or_rebate: 400,
            order_id: 0,
            open_orders: Pubkey::default(),
            client_order_id: 0,
            price_lots: 0,
            quantity_lots: 0,
            price: 0.0,
            quantity: 0.0,
        };
        price_fill(&mut event, Converter::new(10, 10, 3, 3));
        assert_eq!(event.price, 10.0);
        assert_eq!(event.quantity, 2.0);
        assert_eq!(event.price_lots, 10);
        assert_eq!(event.quantity_lots, 200);
    }
}
