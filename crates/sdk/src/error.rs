use alloy::transports::TransportError;
use solana_pubkey::Pubkey;
use thiserror::Error;

use crate::{layout::DecodeError, types::Slot};

#[derive(Debug, Error)]
pub enum DataError {
    /// Network, timeout or JSON-RPC fault talking to the ledger.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Ledger could not serve the request right now, e.g. the node is behind
    /// the requested minimum slot.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    #[error("decode failure: {0}")]
    Decode(#[from] DecodeError),

    /// Node answered with data older than what was already observed.
    #[error("slot regression: observed {observed} below floor {floor}")]
    SlotRegression { floor: Slot, observed: Slot },

    #[error("unknown venue {0}")]
    UnknownVenue(Pubkey),

    #[error("registry load failure: {0}")]
    RegistryLoad(String),

    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),

    #[error("http failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot load panicked")]
    LoadPanicked,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
