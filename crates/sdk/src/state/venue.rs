use solana_pubkey::Pubkey;

use crate::{num::Converter, tokens::TokenMetadata};

/// Decimals assumed for a mint missing from token metadata.
pub const DEFAULT_DECIMALS: u8 = 9;

/// Static descriptor of an order book venue (a market account).
///
/// Decoded once from the market account during registry load and shared as
/// `Arc<Venue>`. Mint decimals are resolved from token metadata at the same
/// time; a mint with no metadata gets [`DEFAULT_DECIMALS`] and the venue is
/// flagged by [`Venue::has_synthetic_decimals`].
#[derive(Clone, Debug, PartialEq)]
pub struct Venue {
    pub(crate) address: Pubkey,
    pub(crate) vault_signer_nonce: u64,
    pub(crate) base_mint: Pubkey,
    pub(crate) quote_mint: Pubkey,
    pub(crate) base_vault: Pubkey,
    pub(crate) quote_vault: Pubkey,
    pub(crate) request_queue: Pubkey,
    pub(crate) event_queue: Pubkey,
    pub(crate) bids: Pubkey,
    pub(crate) asks: Pubkey,
    pub(crate) base_lot_size: u64,
    pub(crate) quote_lot_size: u64,
    pub(crate) base_deposits_total: u64,
    pub(crate) base_fees_accrued: u64,
    pub(crate) quote_deposits_total: u64,
    pub(crate) quote_fees_accrued: u64,
    pub(crate) quote_dust_threshold: u64,
    pub(crate) fee_rate_bps: u64,
    pub(crate) referrer_rebates_accrued: u64,
    pub(crate) base_decimals: u8,
    pub(crate) quote_decimals: u8,
    pub(crate) synthetic_decimals: bool,
}

impl Venue {
    /// Resolves mint decimals from token metadata.
    pub(crate) fn with_decimals(self, tokens: &dyn TokenMetadata) -> Self {
        let base = tokens.decimals(&self.base_mint);
        let quote = tokens.decimals(&self.quote_mint);
        Self {
            base_decimals: base.unwrap_or(DEFAULT_DECIMALS),
            quote_decimals: quote.unwrap_or(DEFAULT_DECIMALS),
            synthetic_decimals: base.is_none() || quote.is_none(),
            ..self
        }
    }

    pub fn address(&self) -> Pubkey { self.address }

    pub fn vault_signer_nonce(&self) -> u64 { self.vault_signer_nonce }

    pub fn base_mint(&self) -> Pubkey { self.base_mint }

    pub fn quote_mint(&self) -> Pubkey { self.quote_mint }

    pub fn base_vault(&self) -> Pubkey { self.base_vault }

    pub fn quote_vault(&self) -> Pubkey { self.quote_vault }

    pub fn request_queue(&self) -> Pubkey { self.request_queue }

    pub fn event_queue(&self) -> Pubkey { self.event_queue }

    pub fn bids(&self) -> Pubkey { self.bids }

    pub fn asks(&self) -> Pubkey { self.asks }

    pub fn base_lot_size(&self) -> u64 { self.base_lot_size }

    pub fn quote_lot_size(&self) -> u64 { self.quote_lot_size }

    pub fn base_deposits_total(&self) -> u64 { self.base_deposits_total }

    pub fn base_fees_accrued(&self) -> u64 { self.base_fees_accrued }

    pub fn quote_deposits_total(&self) -> u64 { self.quote_deposits_total }

    pub fn quote_fees_accrued(&self) -> u64 { self.quote_fees_accrued }

    pub fn quote_dust_threshold(&self) -> u64 { self.quote_dust_threshold }

    pub fn fee_rate_bps(&self) -> u64 { self.fee_rate_bps }

    pub fn referrer_rebates_accrued(&self) -> u64 { self.referrer_rebates_accrued }

    pub fn base_decimals(&self) -> u8 { self.base_decimals }

    pub fn quote_decimals(&self) -> u8 { self.quote_decimals }

    /// Whether any of the mint decimals is the default rather than metadata.
    pub fn has_synthetic_decimals(&self) -> bool { self.synthetic_decimals }

    /// Lot/decimal converter for this venue's prices and quantities.
    pub fn converter(&self) -> Converter {
        Converter::new(
            self.base_lot_size,
            self.quote_lot_size,
            self.base_decimals,
            self.quote_decimals,
        )
        .with_approximate(self.synthetic_decimals)
    }

    /// Deposits held in `asset`: base deposits if it is the base mint,
    /// quote deposits otherwise.
    pub fn deposits_of(&self, asset: &Pubkey) -> u64 {
        if self.base_mint == *asset { self.base_deposits_total } else { self.quote_deposits_total }
    }
}

/// Venue descriptor joined with token metadata, as presented to callers.
#[derive(Clone, derive_more::Debug)]
pub struct VenueSummary {
    pub address: Pubkey,
    pub name: String,
    pub base_mint: Pubkey,
    pub base_name: String,
    pub base_symbol: String,
    pub base_logo: String,
    pub quote_mint: Pubkey,
    pub quote_name: String,
    pub quote_symbol: String,
    pub quote_logo: String,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub synthetic_decimals: bool,
    pub base_deposits_total: u64,
    pub quote_deposits_total: u64,
    #[debug("{base_deposits}")]
    pub base_deposits: f64,
    #[debug("{quote_deposits}")]
    pub quote_deposits: f64,
    pub quote_fees_accrued: u64,
    #[debug("{quote_fees}")]
    pub quote_fees: f64,
    pub referrer_rebates_accrued: u64,
    #[debug("{referrer_rebates}")]
    pub referrer_rebates: f64,
    pub quote_dust_threshold: u64,
    pub fee_rate_bps: u64,
    /// Share of the asset's deposits across all venues listing it, in `[0, 1]`.
    /// Only set for per-asset listings.
    pub share: Option<f64>,
}

impl VenueSummary {
    pub fn new(venue: &Venue, tokens: &dyn TokenMetadata) -> Self {
        let converter = venue.converter();
        let base_symbol = tokens.symbol_of(&venue.base_mint);
        let quote_symbol = tokens.symbol_of(&venue.quote_mint);
        Self {
            address: venue.address,
            name: tokens.market_name(venue),
            base_mint: venue.base_mint,
            base_name: tokens.name_of(&venue.base_mint),
            base_symbol,
            base_logo: tokens.logo_of(&venue.base_mint),
            quote_mint: venue.quote_mint,
            quote_name: tokens.name_of(&venue.quote_mint),
            quote_symbol,
            quote_logo: tokens.logo_of(&venue.quote_mint),
            bids: venue.bids,
            asks: venue.asks,
            event_queue: venue.event_queue,
            base_vault: venue.base_vault,
            quote_vault: venue.quote_vault,
            base_lot_size: venue.base_lot_size,
            quote_lot_size: venue.quote_lot_size,
            base_decimals: venue.base_decimals,
            quote_decimals: venue.quote_decimals,
            synthetic_decimals: venue.synthetic_decimals,
            base_deposits_total: venue.base_deposits_total,
            quote_deposits_total: venue.quote_deposits_total,
            base_deposits: converter.base_from_native(venue.base_deposits_total),
            quote_deposits: converter.quote_from_native(venue.quote_deposits_total),
            quote_fees_accrued: venue.quote_fees_accrued,
            quote_fees: converter.quote_from_native(venue.quote_fees_accrued),
            referrer_rebates_accrued: venue.referrer_rebates_accrued,
            referrer_rebates: converter.quote_from_native(venue.referrer_rebates_accrued),
            quote_dust_threshold: venue.quote_dust_threshold,
            fee_rate_bps: venue.fee_rate_bps,
            share: None,
        }
    }

    pub(crate) fn with_share(self, share: f64) -> Self { Self { share: Some(share), ..self } }
}

#[cfg(feature = "display")]
impl std::fmt::Display for VenueSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use colored::Colorize;
        use tabled::{Table, settings::Style};

        writeln!(
            f,
            "{} ({}){}",
            self.name.blue(),
            self.address,
            if self.synthetic_decimals { " APPROXIMATE DECIMALS".yellow() } else { Default::default() },
        )?;

        let rows = vec![
            [
                "Base".to_string(),
                format!("{} {} ({})", self.base_symbol, self.base_mint, self.base_name),
            ],
            [
                "Quote".to_string(),
                format!("{} {} ({})", self.quote_symbol, self.quote_mint, self.quote_name),
            ],
            ["Bids".to_string(), self.bids.to_string()],
            ["Asks".to_string(), self.asks.to_string()],
            ["Event queue".to_string(), self.event_queue.to_string()],
            ["Base vault".to_string(), self.base_vault.to_string()],
            ["Quote vault".to_string(), self.quote_vault.to_string()],
            ["Lot sizes".to_string(), format!("{} / {}", self.base_lot_size, self.quote_lot_size)],
            ["Decimals".to_string(), format!("{} / {}", self.base_decimals, self.quote_decimals)],
            ["Base deposits".to_string(), self.base_deposits.to_string()],
            ["Quote deposits".to_string(), self.quote_deposits.to_string()],
            ["Quote fees".to_string(), self.quote_fees.to_string()],
            ["Referrer rebates".to_string(), self.referrer_rebates.to_string()],
            ["Dust threshold".to_string(), self.quote_dust_threshold.to_string()],
            ["Fee rate (bps)".to_string(), self.fee_rate_bps.to_string()],
        ];
        let mut table = Table::from_iter(rows);
        table.with(Style::sharp());
        writeln!(f, "{}", table)
    }
}

#[cfg(feature = "display")]
impl tabled::Tabled for VenueSummary {
    const LENGTH: usize = 6;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        use colored::Colorize;

        vec![
            if self.synthetic_decimals {
                self.name.yellow().to_string().into()
            } else {
                self.name.clone().into()
            },
            self.address.to_string().into(),
            self.base_deposits.to_string().into(),
            self.quote_deposits.to_string().into(),
            match self.share {
                Some(share) => format!("{:.2} %", share * 100.0).into(),
                None => "-".into(),
            },
            self.fee_rate_bps.to_string().into(),
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec![
            "Market".into(),
            "Address".into(),
            "Base Deposits".into(),
            "Quote Deposits".into(),
            "Share".into(),
            "Fee (bps)".into(),
        ]
    }
}
