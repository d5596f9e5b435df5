// src/services/yahoo.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::US::Eastern;
use csv::Reader;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{BalanceSheetRow, PriceObservation};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const ASSETS: &str = "quarterlyTotalAssets";
const LIABILITIES: &str = "quarterlyTotalLiabilitiesNetMinorityInterest";
const SHARES: &str = "quarterlyOrdinarySharesNumber";

/// Errors from the upstream data boundary. Every stage of the pipeline is
/// terminal on the first of these it hits; there are no retries.
#[derive(Debug)]
pub enum DataError {
    /// Network failure, rate limit, unknown ticker, or an empty result set.
    Unavailable(String),
    /// The balance-sheet response lacks one of the required series; carries
    /// the series actually present for diagnosis.
    Incomplete { found: Vec<String> },
    /// An expected column or field is absent or misnamed.
    Schema(String),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataError::Unavailable(msg) => write!(f, "data source unavailable: {}", msg),
            DataError::Incomplete { found } => {
                write!(f, "balance sheet incomplete, fields present: {:?}", found)
            }
            DataError::Schema(msg) => write!(f, "unexpected upstream schema: {}", msg),
        }
    }
}

impl std::error::Error for DataError {}

fn client() -> Result<Client, DataError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| DataError::Unavailable(e.to_string()))
}

async fn fetch_text(url: &str) -> Result<String, DataError> {
    client()?
        .get(url)
        .send()
        .await
        .map_err(|e| DataError::Unavailable(e.to_string()))?
        .text()
        .await
        .map_err(|e| DataError::Unavailable(e.to_string()))
}

/// Fetch the trailing five years of quarterly balance-sheet series and merge
/// them into one normalized row per period-end date.
pub async fn fetch_balance_sheet(ticker: &str) -> Result<Vec<BalanceSheetRow>, DataError> {
    let period2 = Utc::now().timestamp();
    let period1 = period2 - Duration::days(5 * 366).num_seconds();
    let url = format!(
        "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries/{ticker}\
?symbol={ticker}&type={ASSETS},{LIABILITIES},{SHARES}&period1={period1}&period2={period2}"
    );
    info!("Fetching balance sheet from URL: {}", url);

    let body = fetch_text(&url).await?;
    parse_balance_sheet(&body)
}

pub fn parse_balance_sheet(body: &str) -> Result<Vec<BalanceSheetRow>, DataError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| DataError::Schema(format!("balance sheet is not valid JSON: {}", e)))?;

    if let Some(err) = root["timeseries"]["error"].as_object() {
        let description = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("upstream error");
        return Err(DataError::Unavailable(description.to_string()));
    }

    let results = root["timeseries"]["result"]
        .as_array()
        .ok_or_else(|| DataError::Schema("no timeseries result in balance sheet response".into()))?;

    let mut found = Vec::new();
    let mut rows: BTreeMap<NaiveDate, BalanceSheetRow> = BTreeMap::new();

    for entry in results {
        let kind = match entry["meta"]["type"][0].as_str() {
            Some(kind) => kind.to_string(),
            None => continue,
        };
        // A requested series the ticker has no data for comes back without a
        // data array; it does not count as present.
        let points = match entry[kind.as_str()].as_array() {
            Some(points) => points,
            None => continue,
        };
        found.push(kind.clone());

        for point in points {
            let date = point["asOfDate"]
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let value = point["reportedValue"]["raw"].as_f64();
            if let (Some(date), Some(value)) = (date, value) {
                let row = rows.entry(date).or_insert_with(|| BalanceSheetRow {
                    period_end: date,
                    total_assets: None,
                    total_liabilities: None,
                    shares_outstanding: None,
                });
                match kind.as_str() {
                    ASSETS => row.total_assets = Some(value),
                    LIABILITIES => row.total_liabilities = Some(value),
                    SHARES => row.shares_outstanding = Some(value),
                    _ => {}
                }
            }
        }
    }

    for required in [ASSETS, LIABILITIES, SHARES] {
        if !found.iter().any(|k| k == required) {
            return Err(DataError::Incomplete { found });
        }
    }

    Ok(rows.into_values().collect())
}

/// Fetch recent earnings announcement timestamps, most recent first,
/// normalized to exchange (US/Eastern) wall-clock time.
pub async fn fetch_earnings_dates(ticker: &str) -> Result<Vec<NaiveDateTime>, DataError> {
    let url = format!("https://finance.yahoo.com/calendar/earnings?symbol={}", ticker);
    info!("Fetching earnings dates from URL: {}", url);

    let body = fetch_text(&url).await?;
    let stamps = extract_earnings_timestamps(&body)?;
    if stamps.is_empty() {
        return Err(DataError::Unavailable(format!(
            "no earnings dates returned for {}",
            ticker
        )));
    }
    Ok(stamps)
}

/// Pull announcement timestamps out of the JSON embedded in the calendar
/// page. When the expected field is missing, fall back to reinterpreting any
/// ISO-8601 timestamp in the document as the date field.
pub fn extract_earnings_timestamps(body: &str) -> Result<Vec<NaiveDateTime>, DataError> {
    let re = Regex::new(r#""startdatetime":"([^"]+)""#)
        .map_err(|e| DataError::Schema(e.to_string()))?;

    let mut out = Vec::new();
    for caps in re.captures_iter(body) {
        if let Some(m) = caps.get(1) {
            match parse_announcement(m.as_str()) {
                Some(ts) => out.push(ts),
                None => debug!("skipping unparseable earnings date: {}", m.as_str()),
            }
        }
    }

    if out.is_empty() {
        warn!("no startdatetime field in earnings response, scanning for raw timestamps");
        let fallback = Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}")
            .map_err(|e| DataError::Schema(e.to_string()))?;
        for m in fallback.find_iter(body) {
            if let Some(ts) = parse_announcement(m.as_str()) {
                out.push(ts);
            }
        }
    }

    Ok(out)
}

fn parse_announcement(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Eastern).naive_local());
    }
    // Already a bare wall-clock timestamp.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Fetch daily closes from `start` to now via the CSV download endpoint.
pub async fn fetch_price_history(
    ticker: &str,
    start: NaiveDate,
) -> Result<Vec<PriceObservation>, DataError> {
    let period1 = start.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp();
    let period2 = Utc::now().timestamp();
    let url = format!(
        "https://query1.finance.yahoo.com/v7/finance/download/{ticker}\
?period1={period1}&period2={period2}&interval=1d&events=history"
    );
    info!("Fetching price history from URL: {}", url);

    let csv_text = fetch_text(&url).await?;
    parse_price_csv(&csv_text)
}

pub fn parse_price_csv(text: &str) -> Result<Vec<PriceObservation>, DataError> {
    let mut rdr = Reader::from_reader(text.as_bytes());

    // Locate the close column; it may be namespaced per ticker.
    let headers = rdr
        .headers()
        .map_err(|e| DataError::Schema(e.to_string()))?
        .clone();
    let idx_close = headers
        .iter()
        .position(|h| {
            let h = h.trim();
            h == "Close" || h.ends_with("_Close")
        })
        .ok_or_else(|| DataError::Schema("no close column in price history".into()))?;

    let idx_date = match headers.iter().position(|h| h.trim() == "Date") {
        Some(idx) => idx,
        None => {
            warn!("no Date column in price history, reinterpreting first column as the date");
            0
        }
    };

    let mut out = Vec::new();
    for record in rdr.records() {
        let row = record.map_err(|e| DataError::Schema(e.to_string()))?;
        let date = row
            .get(idx_date)
            .and_then(|c| NaiveDate::parse_from_str(c.trim(), "%Y-%m-%d").ok());
        let close = row.get(idx_close).and_then(|c| c.trim().parse::<f64>().ok());
        match (date, close) {
            (Some(date), Some(close)) => out.push(PriceObservation { date, close }),
            // Yahoo emits "null" cells for non-trading anomalies; skip them.
            _ => debug!("skipping unparseable price row: {:?}", row),
        }
    }

    Ok(out)
}
