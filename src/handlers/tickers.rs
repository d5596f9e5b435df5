// src/handlers/tickers.rs
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::config::AppConfig;

/// The fixed selection list the frontend's picker is populated from.
pub async fn get_tickers(cfg: Arc<AppConfig>) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "tickers": cfg.tickers,
    })))
}
