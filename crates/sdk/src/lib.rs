//! Serum market data SDK.
//!
//! # Overview
//!
//! Slot-consistent in-memory cache of on-chain order book state for the v3
//! order book program, plus the analytics derived from it.
//!
//! Use [`market::MarketData`] to load venue descriptors with
//! [`market::MarketData::refresh_registry`], then read cached bid/ask books,
//! depth curves and trade history. Spawn [`market::MarketData::spawn_refreshers`]
//! to keep every touched market warm in the background.
//!
//! Reads never fail once a market has been loaded at least once: a failed
//! refresh keeps serving the last good snapshot and retries from the same
//! slot floor on the next cycle (see [`cache`]).
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * Order book accounts are polled over JSON-RPC; account subscriptions over
//!   WebSocket would cut refresh latency.
//!
//! * Trade pairing relies on the event queue keeping makers adjacent to their
//!   taker (see [`history`]).
//!
//! # Features
//!
//! | Feature | Default | Description |
//! | --- | --- | --- |
//! | `display` | yes | Enables table rendering for books, depth and trades. |
//! | `testing` | yes | Enables [`testing`] module. |
//!
//! # Testing
//!
//! [`testing`] module provides an in-memory ledger and account encoders, so
//! the whole pipeline can run without an RPC node.

pub mod cache;
pub mod correlate;
pub mod depth;
pub mod error;
pub mod feeds;
pub mod history;
pub mod identity;
pub mod layout;
pub mod ledger;
pub mod market;
pub mod num;
pub mod registry;
pub mod state;
#[cfg(feature = "testing")]
pub mod testing;
pub mod tokens;
pub mod types;

use solana_pubkey::Pubkey;

/// Order book program v3 on mainnet.
pub const DEX_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");

/// Aggregator program whose swaps route through the order book.
pub const ROUTER_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("JUP3c2Uh3WA4Ng34tw6kPd2G4C5BB21Xo36Je1s32Ph");

/// Referrer wallets the router attaches to order book swaps (USDC, USDT, wSOL).
pub const ROUTER_REFERRERS: [Pubkey; 3] = [
    Pubkey::from_str_const("H5sizxhR6ssXrX2YNDoYaUv93PU34VzyRaVaUHuo5eFk"),
    Pubkey::from_str_const("FVKG6bkrQ4rksme6GT1FN7PgvZf9cNmupyWfN5kJj8Fx"),
    Pubkey::from_str_const("61CjGbapEVoyCC51x5tPZGZHCYsgtPSSssCatHEEUWeG"),
];

#[derive(Clone, Debug)]
/// Cluster the order book program is deployed on.
pub struct Cluster {
    dex_program: Pubkey,
    market_account_size: usize,
    router_program: Pubkey,
    router_referrers: Vec<Pubkey>,
}

impl Cluster {
    pub fn mainnet() -> Self {
        Self {
            dex_program: DEX_PROGRAM_ID,
            market_account_size: layout::MARKET_ACCOUNT_SIZE,
            router_program: ROUTER_PROGRAM_ID,
            router_referrers: ROUTER_REFERRERS.to_vec(),
        }
    }

    pub fn custom(
        dex_program: Pubkey,
        market_account_size: usize,
        router_program: Pubkey,
        router_referrers: Vec<Pubkey>,
    ) -> Self {
        Self { dex_program, market_account_size, router_program, router_referrers }
    }

    pub fn dex_program(&self) -> Pubkey { self.dex_program }

    pub fn market_account_size(&self) -> usize { self.market_account_size }

    pub fn router_program(&self) -> Pubkey { self.router_program }

    pub fn router_referrers(&self) -> &[Pubkey] { &self.router_referrers }
}
