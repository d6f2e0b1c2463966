use serum_data::{ledger::RpcLedger, market::MarketData};
use solana_pubkey::Pubkey;

pub(crate) async fn render(data: &MarketData<RpcLedger>, market: &Pubkey, levels: usize) -> anyhow::Result<()> {
    crate::require_market(data, market)?;
    let depth = data
        .depth(market)
        .await
        .ok_or_else(|| anyhow::anyhow!("order book of {} unavailable", market))?;
    print!("{}", depth.view(if levels > 0 { Some(levels) } else { None }));
    Ok(())
}
