use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serum_data::{market::CacheConfig, tokens, types::Side};
use solana_pubkey::Pubkey;

pub(crate) const DEFAULT_RPC_PROVIDER: &str = "https://api.mainnet-beta.solana.com";
pub(crate) const DEFAULT_RPC_THROTTLING: u32 = 10;

#[derive(Parser, Debug)]
#[command(name = "serum-data", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// RPC endpoint to connect to
    #[arg(long, global = true, env = "SERUM_DATA_RPC", default_value_t = DEFAULT_RPC_PROVIDER.to_string())]
    pub rpc: String,

    /// RPC throttling (req/sec) [default: 10 for default RPC provider and
    /// none for custom]
    #[arg(long, global = true, env = "SERUM_DATA_RPC_THROTTLE")]
    pub rpc_throttle: Option<u32>,

    /// Token list to resolve mint names and decimals from
    #[arg(long, global = true, env = "SERUM_DATA_TOKEN_LIST", default_value_t = tokens::DEFAULT_TOKEN_LIST_URL.to_string())]
    pub token_list: String,

    /// JSON file of known entities: `[{"owner": .., "name": .., "icon": ..}]`
    #[arg(long, global = true, env = "SERUM_DATA_ENTITIES")]
    pub entities: Option<PathBuf>,

    /// Order book refresh interval in milliseconds
    #[arg(long, global = true, default_value_t = 1_000)]
    pub book_refresh_ms: u64,

    /// Event queue refresh interval in milliseconds
    #[arg(long, global = true, default_value_t = 2_500)]
    pub event_refresh_ms: u64,

    /// Market registry refresh interval in seconds
    #[arg(long, global = true, default_value_t = 300)]
    pub registry_refresh_secs: u64,

    /// Recent owner transactions scanned when correlating fills
    #[arg(long, global = true, default_value_t = serum_data::correlate::DEFAULT_SCAN_WINDOW)]
    pub correlation_window: usize,
}

impl Cli {
    pub(crate) fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            book_refresh: std::time::Duration::from_millis(self.book_refresh_ms),
            event_queue_refresh: std::time::Duration::from_millis(self.event_refresh_ms),
            registry_refresh: std::time::Duration::from_secs(self.registry_refresh_secs),
            correlation_window: self.correlation_window,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List markets, optionally only those of one base asset with their
    /// share of its deposits
    Markets {
        /// Base asset mint or symbol
        asset: Option<String>,
    },
    /// Show market details
    Market { market: Pubkey },
    /// Show the most active market of an asset
    MostActive {
        /// Base asset mint or symbol
        asset: String,

        /// Quote asset mint or symbol
        #[arg(long)]
        quote: Option<String>,
    },
    /// Show resting orders with owners
    Book {
        market: Pubkey,

        /// Only show one side [default: both]
        #[arg(long)]
        side: Option<Side>,

        /// Number of orders to display per side (0 = all)
        #[arg(short, long, default_value_t = 20)]
        depth: usize,
    },
    /// Show cumulative depth
    Depth {
        market: Pubkey,

        /// Number of points to display per side (0 = all)
        #[arg(short, long, default_value_t = 20)]
        levels: usize,
    },
    /// Show recent trades from the event queue
    Trades {
        market: Pubkey,

        /// Number of most recent trades to show (0 = all)
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Look up the aggregator swap each trade was routed through
        #[arg(long, default_value_t = false)]
        correlate: bool,
    },
    /// Live depth and trades of a market
    Watch {
        market: Pubkey,

        /// Number of depth points to display per side (0 = all)
        #[arg(short, long, default_value_t = 10)]
        levels: usize,

        /// Number of most recent trades to show (0 = don't show trades)
        #[arg(long, default_value_t = 10)]
        num_trades: usize,

        /// Number of refreshes to render [default: unlimited, until
        /// terminated by (Ctrl+C)]
        #[arg(long)]
        iterations: Option<u64>,
    },
}
