use chrono::{Duration, Utc};
use dotenv::dotenv;
use log::info;
use pb_dashboard::services::yahoo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let ticker = std::env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());
    info!("Testing Yahoo Finance fetchers for {}...", ticker);

    let balance = yahoo::fetch_balance_sheet(&ticker).await?;
    info!("SUCCESS: {} balance-sheet rows", balance.len());
    for row in &balance {
        info!("  {:?}", row);
    }

    let earnings = yahoo::fetch_earnings_dates(&ticker).await?;
    info!("SUCCESS: {} earnings timestamps", earnings.len());
    for ts in &earnings {
        info!("  {}", ts);
    }

    let start = (Utc::now() - Duration::days(365)).date_naive();
    let prices = yahoo::fetch_price_history(&ticker, start).await?;
    info!("SUCCESS: {} price rows since {}", prices.len(), start);
    if let Some(last) = prices.last() {
        info!("  latest close: {} @ {}", last.close, last.date);
    }

    Ok(())
}
