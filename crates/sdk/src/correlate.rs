//! Attribution of order book fills to aggregator swap transactions.
//!
//! A fill is attributed to a swap when one of the owner's recent transactions
//! carries a router instruction touching the order book program, the fill's
//! open-orders account, one of the router's referrer wallets and the market.
//! Lookups never block: the first one for a fill schedules a background scan
//! and returns [`Correlation::Pending`]; later lookups return the memoized
//! result.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use solana_pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{Cluster, error::DataError, ledger::Ledger, types::Signature};

/// Default number of recent owner transactions scanned per fill.
pub const DEFAULT_SCAN_WINDOW: usize = 10;

/// Identity of a fill. Price and quantity are compared bitwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub market: Pubkey,
    pub open_orders: Pubkey,
    pub owner: Pubkey,
    price_bits: u64,
    quantity_bits: u64,
}

impl CorrelationKey {
    pub fn new(market: Pubkey, open_orders: Pubkey, owner: Pubkey, price: f64, quantity: f64) -> Self {
        Self { market, open_orders, owner, price_bits: price.to_bits(), quantity_bits: quantity.to_bits() }
    }

    pub fn price(&self) -> f64 { f64::from_bits(self.price_bits) }

    pub fn quantity(&self) -> f64 { f64::from_bits(self.quantity_bits) }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Correlation {
    /// Scan scheduled or running.
    Pending,
    Found(Signature),
    NotFound,
}

struct Inner<L> {
    ledger: Arc<L>,
    dex_program: Pubkey,
    router_program: Pubkey,
    referrers: Vec<Pubkey>,
    window: usize,
    memo: DashMap<CorrelationKey, Option<Signature>>,
    in_flight: DashSet<CorrelationKey>,
}

/// Memoizing fill-to-swap correlator. Cloning is cheap and clones share the
/// memo table.
pub struct Correlator<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for Correlator<L> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<L: Ledger> Correlator<L> {
    pub fn new(cluster: &Cluster, ledger: Arc<L>, window: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                dex_program: cluster.dex_program(),
                router_program: cluster.router_program(),
                referrers: cluster.router_referrers().to_vec(),
                window,
                memo: DashMap::new(),
                in_flight: DashSet::new(),
            }),
        }
    }

    /// Memoized result for `key`, if its scan completed.
    pub fn memoized(&self, key: &CorrelationKey) -> Option<Option<Signature>> {
        self.inner.memo.get(key).map(|r| r.clone())
    }

    /// Returns the memoized correlation of a fill, scheduling a scan on first
    /// sight. At most one scan per key runs at a time; a scan that fails is
    /// not memoized and is retried by the next lookup.
    ///
    /// Must be called within a Tokio runtime.
    pub fn lookup(&self, key: CorrelationKey) -> Correlation {
        if let Some(result) = self.memoized(&key) {
            return Self::resolved(result);
        }
        if !self.inner.in_flight.insert(key) {
            return Correlation::Pending;
        }
        // Scan may have finished between the memo check and the claim
        if let Some(result) = self.memoized(&key) {
            self.inner.in_flight.remove(&key);
            return Self::resolved(result);
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.scan(&key).await {
                Ok(result) => {
                    debug!(market = %key.market, owner = %key.owner, found = result.is_some(), "fill correlated");
                    inner.memo.insert(key, result);
                },
                Err(err) => {
                    warn!(market = %key.market, owner = %key.owner, %err, "fill correlation failed, will retry");
                },
            }
            inner.in_flight.remove(&key);
        });
        Correlation::Pending
    }

    fn resolved(result: Option<Signature>) -> Correlation {
        match result {
            Some(signature) => Correlation::Found(signature),
            None => Correlation::NotFound,
        }
    }

    pub fn memo_len(&self) -> usize { self.inner.memo.len() }
}

impl<L: Ledger> Inner<L> {
    /// Scans the owner's recent transactions, newest first, stopping at the
    /// first one the node has no record of.
    async fn scan(&self, key: &CorrelationKey) -> Result<Option<Signature>, DataError> {
        let signatures = self.ledger.signatures_for_address(&key.owner, self.window).await?;
        for info in signatures {
            let Some(tx) = self.ledger.transaction(&info.signature).await? else {
                break;
            };
            if tx.resolved_instructions().any(|(program, accounts)| self.is_swap_of(key, &program, &accounts)) {
                return Ok(Some(info.signature));
            }
        }
        Ok(None)
    }

    fn is_swap_of(&self, key: &CorrelationKey, program: &Pubkey, accounts: &[Pubkey]) -> bool {
        *program == self.router_program
            && accounts.contains(&self.dex_program)
            && accounts.contains(&key.open_orders)
            && accounts.iter().any(|a| self.referrers.contains(a))
            && accounts.contains(&key.market)
    }
}
