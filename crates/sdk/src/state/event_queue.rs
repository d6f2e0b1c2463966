use solana_pubkey::Pubkey;

/// Bit flags carried by each event queue record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventFlags {
    pub fill: bool,
    pub out: bool,
    pub bid: bool,
    pub maker: bool,
    pub release_funds: bool,
}

impl EventFlags {
    const FILL: u8 = 0x01;
    const OUT: u8 = 0x02;
    const BID: u8 = 0x04;
    const MAKER: u8 = 0x08;
    const RELEASE_FUNDS: u8 = 0x10;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            fill: bits & Self::FILL != 0,
            out: bits & Self::OUT != 0,
            bid: bits & Self::BID != 0,
            maker: bits & Self::MAKER != 0,
            release_funds: bits & Self::RELEASE_FUNDS != 0,
        }
    }

    pub fn bits(&self) -> u8 {
        (self.fill as u8 * Self::FILL)
            | (self.out as u8 * Self::OUT)
            | (self.bid as u8 * Self::BID)
            | (self.maker as u8 * Self::MAKER)
            | (self.release_funds as u8 * Self::RELEASE_FUNDS)
    }
}

/// Single decoded event queue record.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct FillEvent {
    /// Position in the newest-first decoded sequence.
    pub position: usize,
    pub flags: EventFlags,
    pub open_orders_slot: u8,
    pub fee_tier: u8,
    pub native_quantity_released: u64,
    pub native_quantity_paid: u64,
    pub native_fee_or_rebate: u64,
    pub order_id: u128,
    pub open_orders: Pubkey,
    pub client_order_id: u64,
    pub price_lots: u64,
    pub quantity_lots: u64,
    /// Fill price in quote units per base unit, 0 for non-fill events.
    #[debug("{price}")]
    pub price: f64,
    /// Fill quantity in base units, 0 for non-fill events.
    #[debug("{quantity}")]
    pub quantity: f64,
}

/// Immutable decoded snapshot of a venue's event queue.
#[derive(Clone, Debug)]
pub struct EventQueueSnapshot {
    head: u32,
    count: u32,
    seq_num: u32,
    events: Vec<FillEvent>,
}

impl EventQueueSnapshot {
    pub(crate) fn new(head: u32, count: u32, seq_num: u32, events: Vec<FillEvent>) -> Self {
        Self { head, count, seq_num, events }
    }

    pub fn head(&self) -> u32 { self.head }

    pub fn count(&self) -> u32 { self.count }

    pub fn seq_num(&self) -> u32 { self.seq_num }

    /// Events newest-first.
    pub fn events(&self) -> &[FillEvent] { &self.events }

    /// Fill events newest-first.
    pub fn fills(&self) -> impl Iterator<Item = &FillEvent> { self.events.iter().filter(|e| e.flags.fill) }
}
