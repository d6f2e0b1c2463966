mod order;
mod trade;

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use order::Side;
use solana_pubkey::Pubkey;
pub use trade::*;

/// Ledger slot number. Monotonically increasing across the cluster.
pub type Slot = u64;

/// Base58 transaction signature as returned by the ledger.
pub type Signature = String;

/// Well-known quote mints.
pub mod mints {
    use solana_pubkey::Pubkey;

    pub const USDC: Pubkey = Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

    pub const USDT: Pubkey = Pubkey::from_str_const("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");

    pub const WRAPPED_SOL: Pubkey =
        Pubkey::from_str_const("So11111111111111111111111111111111111111112");
}

/// Point in ledger history a snapshot is consistent with.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct SlotInstant {
    slot: Slot,
    observed_at: DateTime<Utc>,
}

impl SlotInstant {
    pub fn new(slot: Slot, observed_at: DateTime<Utc>) -> Self { Self { slot, observed_at } }

    pub fn slot(&self) -> Slot { self.slot }

    pub fn observed_at(&self) -> DateTime<Utc> { self.observed_at }
}

impl Display for SlotInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} @ {}", self.slot, self.observed_at.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Parses base58 address supplied by a caller.
pub fn parse_pubkey(s: &str) -> Result<Pubkey, crate::error::DataError> {
    Pubkey::from_str(s.trim()).map_err(|err| {
        crate::error::DataError::InvalidArgument(format!("invalid address {}: {}", s, err))
    })
}
