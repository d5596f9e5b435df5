// src/models.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One quarterly balance-sheet row after the upstream adapter has normalized
/// its schema. A field is `None` when the source reported no value for that
/// quarter; a series missing entirely is rejected at the adapter instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSheetRow {
    pub period_end: NaiveDate,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookValueObservation {
    pub period_end: NaiveDate,
    /// Calendar quarter of `period_end`, e.g. "2023Q1".
    pub quarter: String,
    pub book_value_per_share: f64,
    pub shares_outstanding: f64,
}

/// An earnings announcement with its market-visibility dates derived.
#[derive(Debug, Clone, Serialize)]
pub struct EarningsEvent {
    /// Announcement timestamp in exchange wall-clock time.
    pub announced: NaiveDateTime,
    /// Announcement date, rolled to the next business day when the
    /// announcement came after the 16:00 close.
    pub effective: NaiveDate,
    /// `effective` shifted back 30 business days; decides which fiscal
    /// quarter's book value the market knew at that point.
    pub attribution: NaiveDate,
    pub quarter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
}

/// One row of the book-value/earnings quarter join.
#[derive(Debug, Clone, Serialize)]
pub struct QuarterlyMark {
    pub quarter: String,
    pub period_end: NaiveDate,
    pub effective: NaiveDate,
    pub book_value_per_share: f64,
}

/// One output row per trading day. `None` marks an undefined value: a day
/// before the first attribution date, a zero or non-finite denominator, or a
/// statistic below its minimum window.
#[derive(Debug, Clone, Serialize)]
pub struct AlignedRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub book_value_per_share: Option<f64>,
    pub price_to_book: Option<f64>,
    pub rolling_mean: Option<f64>,
    pub rolling_std_dev: Option<f64>,
    pub upper_1: Option<f64>,
    pub lower_1: Option<f64>,
    pub upper_2: Option<f64>,
    pub lower_2: Option<f64>,
}

/// Latest values for the dashboard's summary box, de-normalized back into
/// absolute price terms by the latest book value per share.
#[derive(Debug, Clone, Serialize)]
pub struct ValuationSummary {
    pub close: f64,
    pub moving_average: f64,
    pub upper_1: f64,
    pub upper_2: f64,
    pub lower_1: f64,
    pub lower_2: f64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ValuationSeries {
    pub ticker: String,
    pub records: Vec<AlignedRecord>,
    pub summary: Option<ValuationSummary>,
    /// Quarters present on only one side of the book-value/earnings join.
    pub dropped_quarters: usize,
}
