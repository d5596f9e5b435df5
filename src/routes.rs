// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::config::AppConfig;
use crate::handlers::error::{ApiError, ApiErrorKind};
use crate::handlers::{tickers::get_tickers, valuation::get_valuation};

// Recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = match api_error.kind {
            ApiErrorKind::UnknownTicker => warp::http::StatusCode::NOT_FOUND,
            ApiErrorKind::SourceUnavailable => warp::http::StatusCode::BAD_GATEWAY,
            ApiErrorKind::IncompleteData => warp::http::StatusCode::UNPROCESSABLE_ENTITY,
            ApiErrorKind::SchemaMismatch => warp::http::StatusCode::BAD_GATEWAY,
        };
        message = api_error.message.clone();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    cfg: Arc<AppConfig>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let cfg_filter = warp::any().map(move || cfg.clone());

    let tickers_route = warp::path!("api" / "v1" / "tickers")
        .and(warp::get())
        .and(cfg_filter.clone())
        .and_then(get_tickers);

    let valuation_route = warp::path!("api" / "v1" / "valuation" / String)
        .and(warp::get())
        .and(cfg_filter.clone())
        .and_then(get_valuation);

    info!("All routes configured successfully.");

    tickers_route.or(valuation_route).recover(handle_rejection)
}
