use colored::Colorize;
use serum_data::{ledger::RpcLedger, market::MarketData, types::Side};
use solana_pubkey::Pubkey;
use tabled::{Table, settings::Style};

pub(crate) async fn render(
    data: &MarketData<RpcLedger>,
    market: &Pubkey,
    side: Option<Side>,
    depth: usize,
) -> anyhow::Result<()> {
    crate::require_market(data, market)?;
    let sides = match side {
        Some(side) => vec![side],
        None => vec![Side::Ask, Side::Bid],
    };

    for side in sides {
        let Some(listing) = data.book_listing(market, side).await else {
            println!("{} book unavailable", side);
            continue;
        };
        println!(
            "\n{}{}",
            format!(
                "{} @ slot {} - {} order(s) in {} level(s), size {}",
                side,
                listing.slot,
                listing.entries.len(),
                listing.levels.len(),
                listing.total_quantity,
            )
            .bold()
            .purple(),
            if listing.approximate { " APPROXIMATE".yellow() } else { Default::default() },
        );
        let take = if depth > 0 { depth } else { listing.entries.len() };
        let mut table = Table::new(listing.entries.into_iter().take(take));
        table.with(Style::modern());
        println!("{}", table);
    }

    Ok(())
}
