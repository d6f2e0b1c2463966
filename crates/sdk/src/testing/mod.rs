//! In-memory ledger and account encoders for driving the SDK without an RPC
//! node.

mod accounts;
mod ledger;

pub use accounts::*;
pub use ledger::MockLedger;
use solana_pubkey::Pubkey;

/// Deterministic test address.
pub fn key(n: u64) -> Pubkey {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_le_bytes());
    bytes[31] = 0x5e;
    Pubkey::new_from_array(bytes)
}

/// Address derived from `base`, distinct for each `tag`.
pub(crate) fn derive(base: &Pubkey, tag: u8) -> Pubkey {
    let mut bytes = base.to_bytes();
    bytes[30] ^= tag;
    bytes[31] = bytes[31].wrapping_add(tag);
    Pubkey::new_from_array(bytes)
}

/// Mainnet token list entry.
pub fn token(mint: &Pubkey, symbol: &str, decimals: u8) -> crate::tokens::Token {
    crate::tokens::Token {
        chain_id: crate::tokens::MAINNET_CHAIN_ID,
        address: mint.to_string(),
        name: format!("{} token", symbol),
        symbol: symbol.to_string(),
        decimals,
        logo_uri: None,
    }
}
