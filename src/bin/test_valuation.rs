use dotenv::dotenv;
use log::info;
use pb_dashboard::services::valuation::build_valuation_series;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let ticker = std::env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());
    info!("Running full valuation pipeline for {}...", ticker);

    let series = build_valuation_series(&ticker).await?;
    info!(
        "SUCCESS: {} aligned records, {} quarters dropped by the join",
        series.records.len(),
        series.dropped_quarters
    );

    for rec in series.records.iter().rev().take(5) {
        info!(
            "  {} close={:.2} p/b={:?} mean={:?}",
            rec.date, rec.close, rec.price_to_book, rec.rolling_mean
        );
    }

    match series.summary {
        Some(summary) => println!("{}", summary.text),
        None => println!("no summary available for {}", ticker),
    }

    Ok(())
}
