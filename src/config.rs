// src/config.rs
use log::warn;
use std::env;

/// Ticker universe offered by the deployment this backend was built for.
/// Overridable per deployment via the TICKERS environment variable.
pub const DEFAULT_TICKERS: &[&str] = &[
    "GOOGL", "AMZN", "NVDA", "VIST", "AAPL", "NIO", "TSLA", "GLOB", "BBD",
    "MELI", "GPRK", "NU", "KO", "PBR", "VALE", "BRK-B", "MSFT", "PEP", "SATL",
    "AMD", "UNH", "PAGS", "BABA", "INTC", "NKE", "WMT", "AVGO", "PFE", "META",
    "COIN", "MSTR", "RIOT", "LLY", "DIS", "BIOX", "LAC", "CVX", "AAL", "ADBE",
    "PLTR", "V", "JMIA", "JNJ", "HMY", "SHOP", "PAAS", "XOM", "PG", "JD",
    "TSM", "MCD", "PYPL", "JMP", "QCOM", "MRNA", "RIO", "STLA", "BA", "DOCU",
    "BAC", "CRM", "MU", "MRK", "IBM", "ABNB", "MRVL", "VZ", "SBUX", "OXY",
    "MO", "F", "LAR", "NFLX", "ITUB", "CAT", "LRCX", "GE", "SPOT",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub tickers: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port_str = env::var("PORT").unwrap_or_else(|_| {
            warn!("$PORT not set, defaulting to 3030");
            "3030".to_string()
        });
        let port: u16 = port_str.parse().expect("PORT must be a number");

        let tickers: Vec<String> = match env::var("TICKERS") {
            Ok(raw) => raw
                .split(',')
                .map(|t| t.trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        };

        let tickers = if tickers.is_empty() {
            DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect()
        } else {
            tickers
        };

        AppConfig { port, tickers }
    }

    pub fn knows_ticker(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }
}
