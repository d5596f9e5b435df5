// src/handlers/valuation.rs
use log::{error, info};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::config::AppConfig;
use crate::services::valuation::build_valuation_series;

pub async fn get_valuation(ticker: String, cfg: Arc<AppConfig>) -> Result<Json, Rejection> {
    let ticker = ticker.to_uppercase();
    info!("Handling valuation request for {}", ticker);

    if !cfg.knows_ticker(&ticker) {
        return Err(warp::reject::custom(ApiError::unknown_ticker(&ticker)));
    }

    match build_valuation_series(&ticker).await {
        Ok(series) => {
            info!(
                "Successfully built valuation series for {} ({} records)",
                ticker,
                series.records.len()
            );
            Ok(warp::reply::json(&series))
        }
        Err(e) => {
            error!("Failed to build valuation series for {}: {}", ticker, e);
            Err(warp::reject::custom(ApiError::from_data_error(e)))
        }
    }
}
