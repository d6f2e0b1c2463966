pub mod args;
mod book;
mod depth;
mod markets;
mod trades;
mod watch;

use std::{str::FromStr, sync::Arc};

use alloy::{
    rpc::client::RpcClient,
    transports::layers::{RetryBackoffLayer, ThrottleLayer},
};
use anyhow::Context;
use args::{Cli, Commands};
use serum_data::{
    Cluster,
    identity::KnownEntities,
    ledger::RpcLedger,
    market::MarketData,
    tokens::TokenRegistry,
};
use solana_pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = if cli.rpc == args::DEFAULT_RPC_PROVIDER || cli.rpc_throttle.is_some() {
        // Apply throttling with default RPC
        RpcClient::builder()
            .layer(ThrottleLayer::new(cli.rpc_throttle.unwrap_or(args::DEFAULT_RPC_THROTTLING)))
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    } else {
        RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .connect(&cli.rpc)
            .await
            .context("connecting to RPC")?
    };
    let ledger = Arc::new(RpcLedger::new(client));

    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenRegistry::new());
    if let Err(err) = tokens.fetch(&http, &cli.token_list).await {
        warn!(url = %cli.token_list, %err, "token list unavailable, using default decimals");
    }

    let entities = match &cli.entities {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading entities from {}", path.display()))?;
            KnownEntities::from_json(&json).context("parsing entities")?
        },
        None => KnownEntities::new(),
    };

    let data = MarketData::new(
        Cluster::mainnet(),
        cli.cache_config(),
        ledger,
        tokens.clone(),
        Arc::new(entities),
    );
    data.refresh_registry().await.context("loading markets")?;

    let cancellation_signal = CancellationToken::new();
    let cancellation_token = cancellation_signal.child_token();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to install CTRL+C signal handler");
            return;
        }
        cancellation_signal.cancel();
    });

    match cli.command {
        Commands::Markets { asset } => {
            let asset = asset.map(|a| resolve_asset(&data, &tokens, &a)).transpose()?;
            markets::render_list(&data, asset.as_ref())
        },
        Commands::Market { market } => markets::render_market(&data, &market)?,
        Commands::MostActive { asset, quote } => {
            let base = resolve_asset(&data, &tokens, &asset)?;
            let quote = quote.map(|q| resolve_asset(&data, &tokens, &q)).transpose()?;
            let venue = data
                .most_active(&base, quote.as_ref())
                .with_context(|| format!("no market for {}", asset))?;
            markets::render_market(&data, &venue.address())?
        },
        Commands::Book { market, side, depth } => book::render(&data, &market, side, depth).await?,
        Commands::Depth { market, levels } => depth::render(&data, &market, levels).await?,
        Commands::Trades { market, limit, correlate } => {
            trades::render(&data, &market, limit, correlate, cancellation_token).await?
        },
        Commands::Watch { market, levels, num_trades, iterations } => {
            let _token_refresher = tokens.spawn_refresher(
                http,
                cli.token_list.clone(),
                serum_data::tokens::DEFAULT_TOKEN_LIST_REFRESH,
                cancellation_token.clone(),
            );
            watch::render(&data, &market, levels, num_trades, iterations, cancellation_token).await?
        },
    }

    Ok(())
}

/// Mint address, or the base mint of the most active market among tokens
/// with that symbol.
fn resolve_asset(data: &MarketData<RpcLedger>, tokens: &TokenRegistry, asset: &str) -> anyhow::Result<Pubkey> {
    if let Ok(mint) = Pubkey::from_str(asset) {
        return Ok(mint);
    }
    data.registry()
        .most_active_by_symbol(asset, tokens)
        .with_context(|| format!("unknown asset: {}", asset))
}

/// Errors out on a market missing from the registry.
fn require_market(data: &MarketData<RpcLedger>, market: &Pubkey) -> anyhow::Result<()> {
    data.venue(market).map(|_| ()).with_context(|| format!("unknown market: {}", market))
}
