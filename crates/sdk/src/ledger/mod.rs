//! Read access to the ledger.
//!
//! [`Ledger`] is the seam between the cache and the network: production code
//! talks JSON-RPC through [`RpcLedger`], tests use
//! [`crate::testing::MockLedger`].

mod rpc;

use std::future::Future;

pub use rpc::RpcLedger;
use solana_pubkey::Pubkey;

use crate::{
    error::DataError,
    types::{Signature, Slot},
};

/// JSON-RPC method names.
pub mod method {
    pub const GET_ACCOUNT_INFO: &str = "getAccountInfo";
    pub const GET_PROGRAM_ACCOUNTS: &str = "getProgramAccounts";
    pub const GET_MULTIPLE_ACCOUNTS: &str = "getMultipleAccounts";
    pub const GET_SIGNATURES_FOR_ADDRESS: &str = "getSignaturesForAddress";
    pub const GET_TRANSACTION: &str = "getTransaction";
}

/// Raw account bytes together with the slot they were read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountData {
    pub data: Vec<u8>,
    pub slot: Slot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub slot: Slot,
    pub block_time: Option<i64>,
    pub failed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: usize,
    pub accounts: Vec<usize>,
}

/// Confirmed transaction with its account table resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInfo {
    pub signature: Signature,
    pub slot: Slot,
    /// Static account keys followed by addresses loaded from lookup tables
    /// (writable, then read-only).
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<CompiledInstruction>,
}

impl TransactionInfo {
    /// Top-level instructions as `(program, accounts)`, skipping any that
    /// reference indices outside the account table.
    pub fn resolved_instructions(&self) -> impl Iterator<Item = (Pubkey, Vec<Pubkey>)> + '_ {
        self.instructions.iter().filter_map(|ix| {
            let program = *self.account_keys.get(ix.program_id_index)?;
            let accounts = ix
                .accounts
                .iter()
                .map(|i| self.account_keys.get(*i).copied())
                .collect::<Option<Vec<_>>>()?;
            Some((program, accounts))
        })
    }
}

/// Ledger read operations used by the cache, registry and correlator.
pub trait Ledger: Send + Sync + 'static {
    /// Reads an account no older than `min_slot`.
    fn account(
        &self,
        address: &Pubkey,
        min_slot: Slot,
    ) -> impl Future<Output = Result<AccountData, DataError>> + Send;

    /// Scans all accounts of `program` with data length `data_size`.
    fn program_accounts(
        &self,
        program: &Pubkey,
        data_size: usize,
    ) -> impl Future<Output = Result<Vec<ProgramAccount>, DataError>> + Send;

    /// Reads several accounts at once, `None` for missing ones, in request
    /// order.
    fn multiple_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>, DataError>> + Send;

    /// Most recent signatures involving `address`, newest first.
    fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SignatureInfo>, DataError>> + Send;

    /// Confirmed transaction by signature, `None` when the node has no record.
    fn transaction(
        &self,
        signature: &str,
    ) -> impl Future<Output = Result<Option<TransactionInfo>, DataError>> + Send;
}
