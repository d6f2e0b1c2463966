//! Owner resolution and display identities of known wallets.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use dashmap::DashMap;
use itertools::Itertools;
use serde::Deserialize;
use solana_pubkey::Pubkey;
use tracing::{debug, warn};

use crate::{error::DataError, layout, ledger::Ledger};

/// Display identity of a known wallet (market makers, protocols).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub icon: String,
}

/// Lookup of display identities by owner wallet.
pub trait IdentityDirectory: Send + Sync {
    fn entity(&self, owner: &Pubkey) -> Option<Entity>;

    fn has_display_identity(&self, owner: &Pubkey) -> bool { self.entity(owner).is_some() }

    fn display_name_of(&self, owner: &Pubkey) -> Option<String> { self.entity(owner).map(|e| e.name) }

    fn icon_of(&self, owner: &Pubkey) -> Option<String> { self.entity(owner).map(|e| e.icon) }
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    owner: String,
    name: String,
    #[serde(default)]
    icon: String,
}

/// Static directory of known entities.
#[derive(Clone, Debug, Default)]
pub struct KnownEntities {
    entities: HashMap<Pubkey, Entity>,
}

impl KnownEntities {
    pub fn new() -> Self { Self::default() }

    /// Parses `[{"owner": "<base58>", "name": "...", "icon": "..."}]`.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let records: Vec<EntityRecord> = serde_json::from_str(json)?;
        let entities = records
            .into_iter()
            .map(|r| {
                let owner = Pubkey::from_str(&r.owner).map_err(|err| {
                    DataError::InvalidArgument(format!("invalid entity owner {}: {}", r.owner, err))
                })?;
                Ok((owner, Entity { name: r.name, icon: r.icon }))
            })
            .collect::<Result<HashMap<_, _>, DataError>>()?;
        Ok(Self { entities })
    }

    pub fn with(mut self, owner: Pubkey, name: impl Into<String>, icon: impl Into<String>) -> Self {
        self.entities.insert(owner, Entity { name: name.into(), icon: icon.into() });
        self
    }

    pub fn len(&self) -> usize { self.entities.len() }

    pub fn is_empty(&self) -> bool { self.entities.is_empty() }
}

impl IdentityDirectory for KnownEntities {
    fn entity(&self, owner: &Pubkey) -> Option<Entity> { self.entities.get(owner).cloned() }
}

/// Resolves open-orders accounts to their owner wallets.
///
/// Owners never change for an open-orders account, so resolved owners are
/// memoized forever. Accounts that fail to resolve are retried on the next
/// call.
pub struct OwnerResolver<L> {
    ledger: Arc<L>,
    owners: DashMap<Pubkey, Pubkey>,
}

impl<L: Ledger> OwnerResolver<L> {
    pub fn new(ledger: Arc<L>) -> Self { Self { ledger, owners: DashMap::new() } }

    pub fn cached(&self, open_orders: &Pubkey) -> Option<Pubkey> { self.owners.get(open_orders).map(|o| *o) }

    /// Resolves owners of all distinct `accounts`, fetching unknown ones in a
    /// single batch. Unresolvable accounts map to `None`; a failed batch is
    /// logged and leaves every unknown account unresolved.
    pub async fn resolve(&self, accounts: &[Pubkey]) -> HashMap<Pubkey, Option<Pubkey>> {
        let mut resolved = HashMap::with_capacity(accounts.len());
        let mut unknown = Vec::new();
        for account in accounts.iter().unique() {
            match self.cached(account) {
                Some(owner) => {
                    resolved.insert(*account, Some(owner));
                },
                None => unknown.push(*account),
            }
        }
        if unknown.is_empty() {
            return resolved;
        }

        match self.ledger.multiple_accounts(&unknown).await {
            Ok(data) => {
                for (account, data) in unknown.iter().zip(data.into_iter().chain(std::iter::repeat(None))) {
                    let owner = data.and_then(|d| match layout::decode_open_orders_owner(&d) {
                        Ok(owner) => Some(owner),
                        Err(err) => {
                            debug!(%account, %err, "not an open-orders account");
                            None
                        },
                    });
                    if let Some(owner) = owner {
                        self.owners.insert(*account, owner);
                    }
                    resolved.insert(*account, owner);
                }
            },
            Err(err) => {
                warn!(accounts = unknown.len(), %err, "owner lookup failed");
                resolved.extend(unknown.into_iter().map(|a| (a, None)));
            },
        }
        resolved
    }
}
