use std::time::Duration;

use colored::Colorize;
use serum_data::{correlate::Correlation, ledger::RpcLedger, market::MarketData};
use solana_pubkey::Pubkey;
use tabled::{Table, settings::Style};
use tokio_util::sync::CancellationToken;

const CORRELATION_TIMEOUT: Duration = Duration::from_secs(30);
const CORRELATION_POLL: Duration = Duration::from_millis(250);

pub(crate) async fn render(
    data: &MarketData<RpcLedger>,
    market: &Pubkey,
    limit: usize,
    correlate: bool,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    crate::require_market(data, market)?;
    let slot = data.event_queue(market).await.map(|q| q.slot());
    let mut trades = data.trade_history(market).await;
    if limit > 0 {
        trades.truncate(limit);
    }
    if trades.is_empty() {
        println!("no trades in event queue");
        return Ok(());
    }

    println!(
        "{}",
        format!("Event queue @ slot {} - {} trade(s):", slot.unwrap_or_default(), trades.len()).bold().purple()
    );
    let mut table = Table::new(&trades);
    table.with(Style::modern());
    println!("{}", table);

    if !correlate {
        return Ok(());
    }

    // Lookups schedule scans in the background; poll until all settle
    let deadline = tokio::time::Instant::now() + CORRELATION_TIMEOUT;
    let correlations = loop {
        let correlations = trades.iter().map(|t| data.correlate_trade(market, t)).collect::<Vec<_>>();
        if !correlations.contains(&Correlation::Pending) || tokio::time::Instant::now() >= deadline {
            break correlations;
        }
        tokio::select! {
            _ = cancellation_token.cancelled() => break correlations,
            _ = tokio::time::sleep(CORRELATION_POLL) => {},
        }
    };

    println!("\n{}", "Aggregator swaps:".bold().purple());
    for (trade, correlation) in trades.iter().zip(correlations) {
        let result = match correlation {
            Correlation::Found(signature) => signature.green(),
            Correlation::NotFound => "-".normal(),
            Correlation::Pending => "timed out".yellow(),
        };
        println!("  #{} {} {} @ {}: {}", trade.index, trade.side(), trade.quantity, trade.price, result);
    }

    Ok(())
}
