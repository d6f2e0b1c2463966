use serum_data::{ledger::RpcLedger, market::MarketData};
use solana_pubkey::Pubkey;
use tabled::{Table, settings::Style};

pub(crate) fn render_list(data: &MarketData<RpcLedger>, asset: Option<&Pubkey>) {
    let mut summaries = match asset {
        Some(asset) => data.venue_summaries_by_asset(asset),
        None => data
            .registry()
            .venues()
            .iter()
            .filter_map(|v| data.venue_summary(&v.address()))
            .collect(),
    };
    if summaries.is_empty() {
        println!("no markets");
        return;
    }
    summaries.sort_by(|a, b| a.name.cmp(&b.name).then(b.base_deposits.total_cmp(&a.base_deposits)));
    let count = summaries.len();
    let mut table = Table::new(summaries);
    table.with(Style::modern());
    println!("{}", table);
    println!("{} market(s)", count);
}

pub(crate) fn render_market(data: &MarketData<RpcLedger>, market: &Pubkey) -> anyhow::Result<()> {
    crate::require_market(data, market)?;
    if let Some(summary) = data.venue_summary(market) {
        print!("{}", summary);
    }
    Ok(())
}
