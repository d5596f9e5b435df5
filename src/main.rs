use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

mod config;
mod handlers;
mod models;
mod routes;
mod services;

use config::AppConfig;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let cfg = Arc::new(AppConfig::from_env());
    info!(
        "Serving {} tickers on PORT {}",
        cfg.tickers.len(),
        cfg.port
    );

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS for the dashboard frontend
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET"]);

    // Set up routes
    let api = routes::routes(cfg).with(cors);
    info!("Routes configured successfully with CORS.");

    // Start the server
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
}
