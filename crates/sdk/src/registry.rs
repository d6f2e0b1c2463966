//! Index of all venues of the order book program.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use solana_pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::{
    Cluster,
    error::DataError,
    layout,
    ledger::Ledger,
    state::{Venue, VenueSummary},
    tokens::{TokenMetadata, TokenRegistry},
    types::mints,
};

#[derive(Clone, Default)]
struct VenueIndex {
    by_address: HashMap<Pubkey, Arc<Venue>>,
    /// Venues per base mint, in first-seen order.
    by_base: HashMap<Pubkey, Vec<Arc<Venue>>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl VenueIndex {
    /// Inserts or replaces a venue, keeping its position in the per-asset
    /// list when it is already indexed.
    fn upsert(&mut self, venue: Arc<Venue>) {
        if let Some(previous) = self.by_address.insert(venue.address(), Arc::clone(&venue))
            && previous.base_mint() != venue.base_mint()
            && let Some(list) = self.by_base.get_mut(&previous.base_mint())
        {
            list.retain(|v| v.address() != venue.address());
        }
        let list = self.by_base.entry(venue.base_mint()).or_default();
        match list.iter_mut().find(|v| v.address() == venue.address()) {
            Some(existing) => *existing = venue,
            None => list.push(venue),
        }
    }
}

/// Registry of venue descriptors, rebuilt from a full program account scan.
///
/// Readers always see a complete index: a refresh builds the next index off
/// to the side and publishes it in one swap. A failed scan leaves the current
/// index in place.
pub struct MarketRegistry {
    cluster: Cluster,
    index: ArcSwap<VenueIndex>,
}

impl MarketRegistry {
    pub fn new(cluster: Cluster) -> Self {
        Self { cluster, index: ArcSwap::from_pointee(VenueIndex::default()) }
    }

    pub fn cluster(&self) -> &Cluster { &self.cluster }

    /// Scans all market accounts and upserts them into the index.
    ///
    /// Accounts that do not decode, or carry the null address, are skipped.
    /// Returns the number of venues indexed by this scan.
    pub async fn refresh<L: Ledger>(&self, ledger: &L, tokens: &dyn TokenMetadata) -> Result<usize, DataError> {
        info!(program = %self.cluster.dex_program(), "loading markets");
        let accounts = ledger
            .program_accounts(&self.cluster.dex_program(), self.cluster.market_account_size())
            .await
            .map_err(|err| DataError::RegistryLoad(err.to_string()))?;

        let mut next = VenueIndex::clone(&self.index.load());
        let mut indexed = 0;
        let mut synthetic = 0;
        for account in accounts {
            let venue = match layout::decode_market(&account.data) {
                Ok(venue) => venue,
                Err(err) => {
                    debug!(address = %account.address, %err, "skipping undecodable market account");
                    continue;
                },
            };
            if venue.address() == Pubkey::default() {
                continue;
            }
            let venue = venue.with_decimals(tokens);
            if venue.has_synthetic_decimals() {
                synthetic += 1;
            }
            next.upsert(Arc::new(venue));
            indexed += 1;
        }
        next.loaded_at = Some(Utc::now());
        let total = next.by_address.len();
        self.index.store(Arc::new(next));

        if synthetic > 0 {
            warn!(venues = synthetic, "venues with unknown mint decimals, defaulted");
        }
        info!(indexed, total, "markets loaded");
        Ok(indexed)
    }

    pub fn get(&self, address: &Pubkey) -> Option<Arc<Venue>> { self.index.load().by_address.get(address).cloned() }

    /// Venues listing `asset` as base mint.
    pub fn list_by_asset(&self, asset: &Pubkey) -> Vec<Arc<Venue>> {
        self.index.load().by_base.get(asset).cloned().unwrap_or_default()
    }

    pub fn venues(&self) -> Vec<Arc<Venue>> { self.index.load().by_address.values().cloned().collect() }

    pub fn len(&self) -> usize { self.index.load().by_address.len() }

    pub fn is_empty(&self) -> bool { self.index.load().by_address.is_empty() }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> { self.index.load().loaded_at }

    /// Summaries of venues listing `asset`, each with its share of the
    /// asset's total deposits across those venues.
    pub fn summaries_by_asset(&self, asset: &Pubkey, tokens: &dyn TokenMetadata) -> Vec<VenueSummary> {
        let venues = self.list_by_asset(asset);
        let total: u64 = venues.iter().map(|v| v.deposits_of(asset)).sum();
        venues
            .iter()
            .map(|v| {
                let share = if total > 0 { v.deposits_of(asset) as f64 / total as f64 } else { 0.0 };
                VenueSummary::new(v, tokens).with_share(share)
            })
            .collect()
    }

    /// Venue with the most base deposits for `base`. A USDC-quoted venue is
    /// preferred when it is the runner-up to a non-USDC one.
    pub fn most_active(&self, base: &Pubkey) -> Option<Arc<Venue>> {
        let mut venues = self.list_by_asset(base);
        venues.sort_by(|a, b| b.base_deposits_total().cmp(&a.base_deposits_total()));
        if venues.len() > 1 && venues[0].quote_mint() != mints::USDC && venues[1].quote_mint() == mints::USDC
        {
            venues.swap(0, 1);
        }
        venues.into_iter().next()
    }

    /// Venue with the most base deposits for the `base`/`quote` pair.
    pub fn most_active_pair(&self, base: &Pubkey, quote: &Pubkey) -> Option<Arc<Venue>> {
        self.list_by_asset(base)
            .into_iter()
            .filter(|v| v.quote_mint() == *quote)
            .max_by_key(|v| v.base_deposits_total())
    }

    /// Base mint of the most active venue among tokens sharing `symbol`,
    /// ranked by quote fees accrued.
    pub fn most_active_by_symbol(&self, symbol: &str, tokens: &TokenRegistry) -> Option<Pubkey> {
        match symbol.to_ascii_uppercase().as_str() {
            "SOL" => return Some(mints::WRAPPED_SOL),
            "USDC" => return Some(mints::USDC),
            "USDT" => return Some(mints::USDT),
            _ => {},
        }
        tokens
            .by_symbol(symbol)
            .iter()
            .filter_map(|t| t.address.parse::<Pubkey>().ok())
            .filter_map(|mint| self.most_active(&mint))
            .max_by_key(|v| v.quote_fees_accrued())
            .map(|v| v.base_mint())
    }
}
