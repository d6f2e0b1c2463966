use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use solana_pubkey::Pubkey;

use super::{BookAccount, EventQueueAccount, MarketAccount};
use crate::{
    DEX_PROGRAM_ID,
    error::DataError,
    ledger::{AccountData, Ledger, ProgramAccount, SignatureInfo, TransactionInfo, method},
    types::{Side, Slot},
};

#[derive(Clone, Debug)]
struct MockAccount {
    program: Pubkey,
    data: Vec<u8>,
    slot: Slot,
}

/// In-memory [`Ledger`] with call counting, failure injection and latency.
///
/// Like a real node, account reads below the requested minimum slot fail,
/// unless [`MockLedger::set_honor_min_slot`] is turned off to mimic a
/// replica that ignores it.
pub struct MockLedger {
    accounts: DashMap<Pubkey, MockAccount>,
    signatures: DashMap<Pubkey, Vec<SignatureInfo>>,
    transactions: DashMap<String, TransactionInfo>,
    calls: DashMap<&'static str, usize>,
    failures: DashMap<&'static str, usize>,
    latency_ms: AtomicU64,
    honor_min_slot: AtomicBool,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            accounts: DashMap::new(),
            signatures: DashMap::new(),
            transactions: DashMap::new(),
            calls: DashMap::new(),
            failures: DashMap::new(),
            latency_ms: AtomicU64::new(0),
            honor_min_slot: AtomicBool::new(true),
        }
    }
}

impl MockLedger {
    pub fn new() -> Self { Self::default() }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_honor_min_slot(&self, honor: bool) { self.honor_min_slot.store(honor, Ordering::SeqCst); }

    /// Stores an account owned by the order book program.
    pub fn set_account(&self, address: Pubkey, data: Vec<u8>, slot: Slot) {
        self.set_program_account(DEX_PROGRAM_ID, address, data, slot);
    }

    pub fn set_program_account(&self, program: Pubkey, address: Pubkey, data: Vec<u8>, slot: Slot) {
        self.accounts.insert(address, MockAccount { program, data, slot });
    }

    /// Stores a market account along with empty books and event queue.
    pub fn install_market(&self, market: &MarketAccount, slot: Slot) {
        self.set_account(market.address, market.encode(), slot);
        self.set_account(market.bids, BookAccount::new(Side::Bid).encode(), slot);
        self.set_account(market.asks, BookAccount::new(Side::Ask).encode(), slot);
        self.set_account(market.event_queue, EventQueueAccount::new(Vec::new()).encode(), slot);
    }

    /// Changes the slot an account is served at, keeping its data.
    pub fn set_slot(&self, address: &Pubkey, slot: Slot) {
        if let Some(mut account) = self.accounts.get_mut(address) {
            account.slot = slot;
        }
    }

    pub fn remove_account(&self, address: &Pubkey) { self.accounts.remove(address); }

    /// Records a transaction of `owner`; the latest added is listed first.
    pub fn add_transaction(&self, owner: Pubkey, tx: TransactionInfo) {
        self.signatures.entry(owner).or_default().insert(
            0,
            SignatureInfo { signature: tx.signature.clone(), slot: tx.slot, block_time: None, failed: false },
        );
        self.transactions.insert(tx.signature.clone(), tx);
    }

    /// Lists a signature for `owner` the node has no transaction for.
    pub fn add_missing_transaction(&self, owner: Pubkey, signature: &str, slot: Slot) {
        self.signatures.entry(owner).or_default().insert(
            0,
            SignatureInfo { signature: signature.to_string(), slot, block_time: None, failed: false },
        );
    }

    /// Makes the next `times` calls of `method` fail.
    pub fn fail_next(&self, method: &'static str, times: usize) { self.failures.insert(method, times); }

    /// Number of calls of `method` so far.
    pub fn calls(&self, method: &'static str) -> usize { self.calls.get(method).map(|c| *c).unwrap_or(0) }

    async fn enter(&self, method: &'static str) -> Result<(), DataError> {
        *self.calls.entry(method).or_default() += 1;
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if let Some(mut remaining) = self.failures.get_mut(method)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(DataError::Unavailable(format!("injected {} failure", method)));
        }
        Ok(())
    }
}

impl Ledger for MockLedger {
    async fn account(&self, address: &Pubkey, min_slot: Slot) -> Result<AccountData, DataError> {
        self.enter(method::GET_ACCOUNT_INFO).await?;
        let account = self.accounts.get(address).map(|a| a.clone()).ok_or(DataError::AccountNotFound(*address))?;
        if account.slot < min_slot && self.honor_min_slot.load(Ordering::SeqCst) {
            return Err(DataError::Unavailable(format!(
                "minimum context slot {} not reached, node at {}",
                min_slot, account.slot
            )));
        }
        Ok(AccountData { data: account.data, slot: account.slot })
    }

    async fn program_accounts(&self, program: &Pubkey, data_size: usize) -> Result<Vec<ProgramAccount>, DataError> {
        self.enter(method::GET_PROGRAM_ACCOUNTS).await?;
        Ok(self
            .accounts
            .iter()
            .filter(|a| a.program == *program && a.data.len() == data_size)
            .map(|a| ProgramAccount { address: *a.key(), data: a.data.clone() })
            .collect())
    }

    async fn multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        self.enter(method::GET_MULTIPLE_ACCOUNTS).await?;
        Ok(addresses.iter().map(|a| self.accounts.get(a).map(|a| a.data.clone())).collect())
    }

    async fn signatures_for_address(&self, address: &Pubkey, limit: usize) -> Result<Vec<SignatureInfo>, DataError> {
        self.enter(method::GET_SIGNATURES_FOR_ADDRESS).await?;
        Ok(self
            .signatures
            .get(address)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<TransactionInfo>, DataError> {
        self.enter(method::GET_TRANSACTION).await?;
        Ok(self.transactions.get(signature).map(|t| t.clone()))
    }
}
