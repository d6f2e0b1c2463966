//! Token metadata (names, symbols, decimals, logos) keyed by mint.

use std::{collections::HashMap, str::FromStr, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use serde::Deserialize;
use solana_pubkey::Pubkey;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::DataError,
    state::{DEFAULT_DECIMALS, Venue},
    types::mints,
};

/// Public token list the registry is loaded from by default.
pub const DEFAULT_TOKEN_LIST_URL: &str =
    "https://raw.githubusercontent.com/solana-labs/token-list/main/src/tokens/solana.tokenlist.json";

/// Chain ID of mainnet-beta in the token list.
pub const MAINNET_CHAIN_ID: u32 = 101;

/// Default interval between token list reloads.
pub const DEFAULT_TOKEN_LIST_REFRESH: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: u32,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenList {
    tokens: Vec<Token>,
}

/// Read access to token metadata.
///
/// Unknown mints resolve to empty strings and [`DEFAULT_DECIMALS`].
pub trait TokenMetadata: Send + Sync {
    fn token(&self, mint: &Pubkey) -> Option<Token>;

    fn decimals(&self, mint: &Pubkey) -> Option<u8> { self.token(mint).map(|t| t.decimals) }

    fn decimals_of(&self, mint: &Pubkey) -> u8 { self.decimals(mint).unwrap_or(DEFAULT_DECIMALS) }

    fn name_of(&self, mint: &Pubkey) -> String { self.token(mint).map(|t| t.name).unwrap_or_default() }

    fn symbol_of(&self, mint: &Pubkey) -> String {
        self.token(mint).map(|t| t.symbol).unwrap_or_default()
    }

    fn logo_of(&self, mint: &Pubkey) -> String {
        self.token(mint).and_then(|t| t.logo_uri).unwrap_or_default()
    }

    /// `BASE - QUOTE` symbols of a venue.
    fn market_name(&self, venue: &Venue) -> String {
        format!("{} - {}", self.symbol_of(&venue.base_mint()), self.symbol_of(&venue.quote_mint()))
    }
}

/// Token metadata loaded from a token list JSON document.
///
/// Reloads replace the whole map atomically; readers never see a partial
/// list.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: ArcSwap<HashMap<Pubkey, Token>>,
}

impl TokenRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let registry = Self::new();
        registry.replace(tokens);
        registry
    }

    /// Parses a token list document (`{"tokens": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let list: TokenList = serde_json::from_str(json)?;
        Ok(Self::from_tokens(list.tokens))
    }

    /// Replaces the registry content with mainnet tokens from `tokens`.
    /// Returns the number of tokens kept.
    pub fn replace(&self, tokens: impl IntoIterator<Item = Token>) -> usize {
        let map = tokens
            .into_iter()
            .filter(|t| t.chain_id == MAINNET_CHAIN_ID)
            .filter_map(|t| match Pubkey::from_str(&t.address) {
                Ok(mint) => Some((mint, t)),
                Err(err) => {
                    warn!(address = %t.address, %err, "skipping token with invalid mint");
                    None
                },
            })
            .collect::<HashMap<_, _>>();
        let len = map.len();
        self.tokens.store(Arc::new(map));
        len
    }

    /// Downloads the token list from `url` and replaces the registry content.
    /// On failure the previous content stays in place.
    pub async fn fetch(&self, client: &reqwest::Client, url: &str) -> Result<usize, DataError> {
        let list: TokenList = client.get(url).send().await?.error_for_status()?.json().await?;
        let len = self.replace(list.tokens);
        info!(url, tokens = len, "token list loaded");
        Ok(len)
    }

    /// Spawns a task reloading the token list every `interval` until cancelled.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        client: reqwest::Client,
        url: String,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Caller loads once before spawning
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = registry.fetch(&client, &url).await {
                            warn!(url = %url, %err, "token list reload failed, keeping previous list");
                        }
                    },
                }
            }
        })
    }

    pub fn len(&self) -> usize { self.tokens.load().len() }

    pub fn is_empty(&self) -> bool { self.tokens.load().is_empty() }

    /// Tokens matching `symbol` case-insensitively. USDC, USDT and SOL resolve
    /// to their canonical mints only.
    pub fn by_symbol(&self, symbol: &str) -> Vec<Token> {
        let canonical = match symbol.to_ascii_uppercase().as_str() {
            "USDC" => Some(mints::USDC),
            "USDT" => Some(mints::USDT),
            "SOL" => Some(mints::WRAPPED_SOL),
            _ => None,
        };
        if let Some(mint) = canonical {
            return self.token(&mint).into_iter().collect();
        }
        self.tokens
            .load()
            .values()
            .filter(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect()
    }
}

impl TokenMetadata for TokenRegistry {
    fn token(&self, mint: &Pubkey) -> Option<Token> { self.tokens.load().get(mint).cloned() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = r#"{
        "name": "Solana Token List",
        "tokens": [
            {
                "chainId": 101,
                "address": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                "symbol": "USDC",
                "name": "USD Coin",
                "decimals": 6,
                "logoURI": "https://example.org/usdc.png",
                "tags": ["stablecoin"]
            },
            {
                "chainId": 101,
                "address": "SRMuApVNdxXokk5GT7XD5cUUgXMBCoAz2LHeuAoKWRt",
                "symbol": "SRM",
                "name": "Serum",
                "decimals": 6
            },
            {
                "chainId": 103,
                "address": "So11111111111111111111111111111111111111112",
                "symbol": "SOL",
                "name": "Wrapped SOL (devnet)",
                "decimals": 9
            }
        ]
    }"#;

    #[test]
    fn loads_mainnet_tokens_only() {
        let registry = TokenRegistry::from_json(LIST).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.decimals(&mints::USDC), Some(6));
        assert_eq!(registry.symbol_of(&mints::USDC), "USDC");
        assert_eq!(registry.logo_of(&mints::USDC), "https://example.org/usdc.png");
        assert_eq!(registry.decimals(&mints::WRAPPED_SOL), None);
        assert_eq!(registry.decimals_of(&mints::WRAPPED_SOL), DEFAULT_DECIMALS);
        assert_eq!(registry.name_of(&mints::WRAPPED_SOL), "");
    }

    #[test]
    fn symbol_lookup() {
        let registry = TokenRegistry::from_json(LIST).unwrap();
        assert_eq!(registry.by_symbol("srm").len(), 1);
        assert_eq!(registry.by_symbol("usdc")[0].name, "USD Coin");
        // Canonical mint missing from the list
        assert!(registry.by_symbol("SOL").is_empty());
        assert!(registry.by_symbol("NOPE").is_empty());
    }

    #[test]
    fn replace_is_wholesale() {
        let registry = TokenRegistry::from_json(LIST).unwrap();
        registry.replace(Vec::new());
        assert!(registry.is_empty());
    }
}
