use std::io::Write;

use anyhow::Context;
use colored::Colorize;
use crossterm::{
    QueueableCommand,
    cursor::MoveTo,
    execute,
    style::Print,
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::future::join_all;
use serum_data::{ledger::RpcLedger, market::MarketData};
use solana_pubkey::Pubkey;
use tabled::{Table, settings::Style};
use tokio_util::sync::CancellationToken;

pub(crate) async fn render(
    data: &MarketData<RpcLedger>,
    market: &Pubkey,
    levels: usize,
    num_trades: usize,
    iterations: Option<u64>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let summary = data.venue_summary(market).with_context(|| format!("unknown market: {}", market))?;

    let refreshers = cancellation_token.child_token();
    let screen = Screen::enter(refreshers.clone())?;
    let handles = data.spawn_refreshers(refreshers);

    let result = draw(data, market, &summary.name, levels, num_trades, iterations, cancellation_token).await;
    drop(screen);
    join_all(handles).await;

    result
}

/// Alternate screen of the render loop; dropping it restores the terminal
/// and stops the refreshers.
struct Screen {
    refreshers: CancellationToken,
}

impl Screen {
    fn enter(refreshers: CancellationToken) -> anyhow::Result<Self> {
        execute!(std::io::stdout(), EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(Self { refreshers })
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
        self.refreshers.cancel();
    }
}

async fn draw(
    data: &MarketData<RpcLedger>,
    market: &Pubkey,
    name: &str,
    levels: usize,
    num_trades: usize,
    iterations: Option<u64>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(data.config().book_refresh);
    let mut iterations_left = iterations;

    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {},
        }
        if iterations_left.is_some_and(|count| count == 0) {
            break;
        }

        let (depth, trades) = tokio::join!(data.depth(market), data.trade_history(market));
        let slots = data.slots(market);

        stdout.queue(Clear(ClearType::All))?;
        stdout.queue(MoveTo(0, 0))?;

        // Market summary
        stdout.queue(Print(format!(
            "{} ({})  bids: {}  asks: {}  events: {}\n",
            name.blue(),
            market,
            slots.bids,
            slots.asks,
            slots.event_queue,
        )))?;

        // Depth
        match depth {
            Some(depth) => {
                stdout.queue(Print(format!("{}", depth.view(if levels > 0 { Some(levels) } else { None }))))?
            },
            None => stdout.queue(Print("waiting for order book...\n"))?,
        };

        // Trades
        if num_trades > 0 && !trades.is_empty() {
            let mut table = Table::new(trades.iter().take(num_trades));
            table.with(Style::modern());
            stdout.queue(Print(format!("{}\n", table)))?;
        }

        stdout.flush()?;

        if let Some(ref mut count) = iterations_left {
            *count -= 1;
        }
    }

    Ok(())
}
