// src/services/valuation.rs
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};

use super::dates;
use super::yahoo::{self, DataError};
use crate::models::{
    AlignedRecord, BalanceSheetRow, BookValueObservation, EarningsEvent, PriceObservation,
    QuarterlyMark, ValuationSeries, ValuationSummary,
};

/// Trailing window length, in rows, for the rolling statistics.
pub const ROLLING_WINDOW: usize = 365;
/// How many recent earnings announcements feed the quarter join.
pub const EARNINGS_LOOKBACK: usize = 9;

/// Book value per share for every quarter with all three inputs reported.
/// Rows with a gap are dropped; `shares_outstanding > 0` is assumed, a
/// non-finite ratio propagates and falls out at ratio time.
pub fn build_book_values(rows: &[BalanceSheetRow]) -> Vec<BookValueObservation> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let (assets, liabilities, shares) = match (
            row.total_assets,
            row.total_liabilities,
            row.shares_outstanding,
        ) {
            (Some(a), Some(l), Some(s)) => (a, l, s),
            _ => {
                debug!("dropping balance row {} with missing fields", row.period_end);
                continue;
            }
        };
        out.push(BookValueObservation {
            period_end: row.period_end,
            quarter: dates::quarter_label(row.period_end),
            book_value_per_share: (assets - liabilities) / shares,
            shares_outstanding: shares,
        });
    }
    out
}

/// Derive visibility dates for up to `lookback` most recent announcements.
pub fn build_earnings_events(announced: &[NaiveDateTime], lookback: usize) -> Vec<EarningsEvent> {
    announced
        .iter()
        .take(lookback)
        .map(|&ts| {
            let effective = dates::effective_date(ts);
            let attribution = dates::attribution_date(effective);
            EarningsEvent {
                announced: ts,
                effective,
                attribution,
                quarter: dates::quarter_label(attribution),
            }
        })
        .collect()
}

/// Inner join of book values to earnings events on quarter. A quarter present
/// on only one side is dropped, not an error; the count is returned for
/// diagnostics. When a quarter carries several announcements the most recent
/// one wins. Output ascending by effective date.
pub fn join_quarterly_to_events(
    book: &[BookValueObservation],
    events: &[EarningsEvent],
) -> (Vec<QuarterlyMark>, usize) {
    let mut event_by_quarter: HashMap<String, &EarningsEvent> = HashMap::new();
    for event in events {
        // Events arrive most recent first.
        event_by_quarter.entry(event.quarter.clone()).or_insert(event);
    }
    let book_quarters: HashSet<&str> = book.iter().map(|o| o.quarter.as_str()).collect();

    let mut marks = Vec::new();
    for obs in book {
        if let Some(event) = event_by_quarter.get(&obs.quarter) {
            marks.push(QuarterlyMark {
                quarter: obs.quarter.clone(),
                period_end: obs.period_end,
                effective: event.effective,
                book_value_per_share: obs.book_value_per_share,
            });
        }
    }

    let dropped_book = book
        .iter()
        .filter(|o| !event_by_quarter.contains_key(&o.quarter))
        .count();
    let dropped_events = event_by_quarter
        .keys()
        .filter(|q| !book_quarters.contains(q.as_str()))
        .count();
    let dropped = dropped_book + dropped_events;
    if dropped > 0 {
        warn!("{} quarters dropped by the book-value/earnings join", dropped);
    }

    marks.sort_by_key(|m| m.effective);
    (marks, dropped)
}

/// Trailing window over the ratio series. Undefined rows occupy slots but
/// never contribute to a statistic, so the window is a fixed row count, not a
/// count of defined observations.
#[derive(Debug)]
struct RatioWindow {
    slots: VecDeque<Option<f64>>,
    capacity: usize,
}

impl RatioWindow {
    fn new(capacity: usize) -> Self {
        RatioWindow {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: Option<f64>) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(value);
    }

    /// Mean of the defined in-window observations; `None` below one.
    fn mean(&self) -> Option<f64> {
        let mut n = 0usize;
        let mut sum = 0.0;
        for v in self.slots.iter().flatten() {
            n += 1;
            sum += *v;
        }
        if n == 0 {
            None
        } else {
            Some(sum / n as f64)
        }
    }

    /// Sample standard deviation (n − 1) of the defined in-window
    /// observations; `None` below two.
    fn std_dev(&self) -> Option<f64> {
        let values: Vec<f64> = self.slots.iter().flatten().copied().collect();
        if values.len() < 2 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        Some((sum_sq / (values.len() - 1) as f64).sqrt())
    }
}

/// Backward as-of join of daily prices to quarterly marks, plus the rolling
/// statistics. Each price row takes the book value from the mark with the
/// greatest effective date at or before it — never ahead. Rows before the
/// first mark keep an undefined book value and ratio. Output ascending by
/// date, one row per input price row; empty input yields an empty output.
pub fn align_prices_as_of(
    prices: &[PriceObservation],
    marks: &[QuarterlyMark],
) -> Vec<AlignedRecord> {
    let mut prices: Vec<PriceObservation> = prices.to_vec();
    prices.sort_by_key(|p| p.date);
    let mut marks: Vec<QuarterlyMark> = marks.to_vec();
    marks.sort_by_key(|m| m.effective);

    let mut records = Vec::with_capacity(prices.len());
    let mut window = RatioWindow::new(ROLLING_WINDOW);
    let mut next_mark = 0;
    let mut current_bv: Option<f64> = None;

    for price in &prices {
        while next_mark < marks.len() && marks[next_mark].effective <= price.date {
            current_bv = Some(marks[next_mark].book_value_per_share);
            next_mark += 1;
        }

        let price_to_book = match current_bv {
            Some(bv) if bv != 0.0 => {
                let ratio = price.close / bv;
                if ratio.is_finite() {
                    Some(ratio)
                } else {
                    None
                }
            }
            _ => None,
        };

        window.push(price_to_book);
        let rolling_mean = window.mean();
        let rolling_std_dev = window.std_dev();
        let band = |k: f64| match (rolling_mean, rolling_std_dev) {
            (Some(mean), Some(std)) => Some(mean + k * std),
            _ => None,
        };

        records.push(AlignedRecord {
            date: price.date,
            close: price.close,
            book_value_per_share: current_bv.filter(|bv| bv.is_finite()),
            price_to_book,
            rolling_mean,
            rolling_std_dev,
            upper_1: band(1.0),
            lower_1: band(-1.0),
            upper_2: band(2.0),
            lower_2: band(-2.0),
        });
    }

    records
}

/// Latest values for the summary box, de-normalized by the latest book value
/// per share. `None` until the series has a defined book value and bands.
pub fn summarize(ticker: &str, records: &[AlignedRecord]) -> Option<ValuationSummary> {
    let last = records.last()?;
    let bv = last.book_value_per_share?;
    let moving_average = last.rolling_mean? * bv;
    let upper_1 = last.upper_1? * bv;
    let upper_2 = last.upper_2? * bv;
    let lower_1 = last.lower_1? * bv;
    let lower_2 = last.lower_2? * bv;

    let text = format!(
        "{}\nClose: {:.2}\nMA 365d: {:.2}\nUpper 1σ: {:.2}\nUpper 2σ: {:.2}\nLower 1σ: {:.2}\nLower 2σ: {:.2}",
        ticker, last.close, moving_average, upper_1, upper_2, lower_1, lower_2
    );

    Some(ValuationSummary {
        close: last.close,
        moving_average,
        upper_1,
        upper_2,
        lower_1,
        lower_2,
        text,
    })
}

/// Full per-ticker pipeline: balance sheet → book values → earnings events →
/// quarter join → price history (bounded below by the earliest joined
/// period end) → as-of alignment → summary. Terminal on the first upstream
/// error; an empty join short-circuits to an empty, non-error series.
pub async fn build_valuation_series(ticker: &str) -> Result<ValuationSeries, DataError> {
    let balance = yahoo::fetch_balance_sheet(ticker).await?;
    let book_values = build_book_values(&balance);
    info!("{}: {} usable book-value quarters", ticker, book_values.len());

    let announced = yahoo::fetch_earnings_dates(ticker).await?;
    let events = build_earnings_events(&announced, EARNINGS_LOOKBACK);

    let (marks, dropped_quarters) = join_quarterly_to_events(&book_values, &events);

    let start = match marks.iter().map(|m| m.period_end).min() {
        Some(start) => start,
        None => {
            warn!("{}: book-value/earnings join is empty, returning empty series", ticker);
            return Ok(ValuationSeries {
                ticker: ticker.to_string(),
                records: Vec::new(),
                summary: None,
                dropped_quarters,
            });
        }
    };

    let prices = yahoo::fetch_price_history(ticker, start).await?;
    let records = align_prices_as_of(&prices, &marks);
    let summary = summarize(ticker, &records);
    info!("{}: built {} aligned records", ticker, records.len());

    Ok(ValuationSeries {
        ticker: ticker.to_string(),
        records,
        summary,
        dropped_quarters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(
        period_end: NaiveDate,
        assets: Option<f64>,
        liabilities: Option<f64>,
        shares: Option<f64>,
    ) -> BalanceSheetRow {
        BalanceSheetRow {
            period_end,
            total_assets: assets,
            total_liabilities: liabilities,
            shares_outstanding: shares,
        }
    }

    fn mark(quarter: &str, period_end: NaiveDate, effective: NaiveDate, bv: f64) -> QuarterlyMark {
        QuarterlyMark {
            quarter: quarter.to_string(),
            period_end,
            effective,
            book_value_per_share: bv,
        }
    }

    fn price(date: NaiveDate, close: f64) -> PriceObservation {
        PriceObservation { date, close }
    }

    fn sample_marks() -> Vec<QuarterlyMark> {
        vec![
            mark("2023Q1", d(2022, 12, 31), d(2023, 1, 15), 10.0),
            mark("2023Q2", d(2023, 3, 31), d(2023, 4, 15), 11.0),
        ]
    }

    fn sample_prices() -> Vec<PriceObservation> {
        vec![
            price(d(2023, 1, 10), 20.0),
            price(d(2023, 1, 20), 22.0),
            price(d(2023, 4, 20), 33.0),
        ]
    }

    #[test]
    fn book_values_computed_and_gaps_dropped() {
        let rows = vec![
            row(d(2023, 3, 31), Some(1000.0), Some(400.0), Some(60.0)),
            row(d(2023, 6, 30), Some(1100.0), Some(440.0), None),
        ];
        let out = build_book_values(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quarter, "2023Q1");
        assert_eq!(out[0].book_value_per_share, 10.0);
    }

    #[test]
    fn earnings_events_respect_lookback_and_roll_rule() {
        let announced = vec![
            d(2023, 2, 1).and_hms_opt(16, 30, 0).unwrap(),
            d(2022, 11, 1).and_hms_opt(9, 0, 0).unwrap(),
        ];
        let events = build_earnings_events(&announced, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].effective, d(2023, 2, 2));
        // 30 business days before 2023-02-02 (a Thursday) is 2022-12-22
        assert_eq!(events[0].attribution, d(2022, 12, 22));
        assert_eq!(events[0].quarter, "2022Q4");
    }

    #[test]
    fn quarter_join_drops_unmatched_quarters() {
        let book = vec![
            BookValueObservation {
                period_end: d(2022, 12, 31),
                quarter: "2022Q4".to_string(),
                book_value_per_share: 10.0,
                shares_outstanding: 60.0,
            },
            BookValueObservation {
                period_end: d(2023, 3, 31),
                quarter: "2023Q1".to_string(),
                book_value_per_share: 11.0,
                shares_outstanding: 60.0,
            },
        ];
        // attribution of 2023-02-01 is 30 business days back, 2022-12-21
        let events = build_earnings_events(
            &[d(2023, 2, 1).and_hms_opt(9, 0, 0).unwrap()],
            EARNINGS_LOOKBACK,
        );
        assert_eq!(events[0].quarter, "2022Q4");

        let (marks, dropped) = join_quarterly_to_events(&book, &events);
        // 2023Q1 has no announcement: dropped, not errored
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].quarter, "2022Q4");
        assert_eq!(marks[0].effective, events[0].effective);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn as_of_join_never_looks_ahead() {
        let records = align_prices_as_of(&sample_prices(), &sample_marks());
        assert_eq!(records.len(), 3);
        // before the first effective date: undefined
        assert_eq!(records[0].price_to_book, None);
        assert_eq!(records[0].book_value_per_share, None);
        assert_eq!(records[1].price_to_book, Some(2.2));
        assert_eq!(records[2].price_to_book, Some(3.0));
        assert_eq!(records[2].book_value_per_share, Some(11.0));
    }

    #[test]
    fn rolling_std_is_bessel_corrected() {
        let records = align_prices_as_of(&sample_prices(), &sample_marks());
        let last = &records[2];
        // window holds [undefined, 2.2, 3.0]
        assert_eq!(last.rolling_mean, Some(2.6));
        let std = last.rolling_std_dev.unwrap();
        assert!((std - 0.32f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn band_width_identities_hold() {
        let records = align_prices_as_of(&sample_prices(), &sample_marks());
        for rec in &records {
            if let Some(std) = rec.rolling_std_dev {
                let w1 = rec.upper_1.unwrap() - rec.lower_1.unwrap();
                let w2 = rec.upper_2.unwrap() - rec.lower_2.unwrap();
                assert!((w1 - 2.0 * std).abs() < 1e-12);
                assert!((w2 - 4.0 * std).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn statistics_below_minimum_window_are_undefined() {
        let records = align_prices_as_of(&sample_prices(), &sample_marks());
        // one defined observation: mean yes, std and bands no
        assert_eq!(records[1].rolling_mean, Some(2.2));
        assert_eq!(records[1].rolling_std_dev, None);
        assert_eq!(records[1].upper_1, None);
        // zero defined observations: nothing
        assert_eq!(records[0].rolling_mean, None);
    }

    #[test]
    fn trailing_window_is_causal() {
        let prices = sample_prices();
        let full = align_prices_as_of(&prices, &sample_marks());
        let prefix = align_prices_as_of(&prices[..2], &sample_marks());
        for (a, b) in prefix.iter().zip(full.iter()) {
            assert_eq!(a.price_to_book, b.price_to_book);
            assert_eq!(a.rolling_mean, b.rolling_mean);
            assert_eq!(a.rolling_std_dev, b.rolling_std_dev);
        }
    }

    #[test]
    fn window_truncates_at_365_rows() {
        let start = d(2020, 1, 1);
        let prices: Vec<PriceObservation> = (0..400)
            .map(|i| {
                let close = if i < 35 { 100.0 } else { 50.0 };
                price(start + Duration::days(i), close)
            })
            .collect();
        let marks = vec![mark("2019Q4", d(2019, 12, 31), d(2019, 12, 31), 1.0)];

        let records = align_prices_as_of(&prices, &marks);
        let last = records.last().unwrap();
        // the 365-row window covers only the 50.0 closes
        assert_eq!(last.rolling_mean, Some(50.0));
        assert_eq!(last.rolling_std_dev, Some(0.0));
    }

    #[test]
    fn zero_book_value_gives_undefined_ratio() {
        let marks = vec![mark("2023Q1", d(2022, 12, 31), d(2023, 1, 15), 0.0)];
        let records = align_prices_as_of(&[price(d(2023, 1, 20), 22.0)], &marks);
        assert_eq!(records[0].price_to_book, None);
    }

    #[test]
    fn empty_inputs_are_degenerate_not_errors() {
        assert!(align_prices_as_of(&[], &sample_marks()).is_empty());

        let records = align_prices_as_of(&sample_prices(), &[]);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.price_to_book.is_none()));
        assert!(records.iter().all(|r| r.rolling_mean.is_none()));
    }

    #[test]
    fn summary_denormalizes_by_latest_book_value() {
        let records = align_prices_as_of(&sample_prices(), &sample_marks());
        let summary = summarize("TEST", &records).unwrap();
        assert_eq!(summary.close, 33.0);
        assert!((summary.moving_average - 2.6 * 11.0).abs() < 1e-9);

        let lines: Vec<&str> = summary.text.lines().collect();
        assert_eq!(lines[0], "TEST");
        assert_eq!(lines[1], "Close: 33.00");
        assert_eq!(lines[2], "MA 365d: 28.60");
        assert!(lines[3].starts_with("Upper 1σ: "));
        assert!(lines[6].starts_with("Lower 2σ: "));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn summary_is_none_until_bands_exist() {
        let records = align_prices_as_of(&sample_prices()[..2], &sample_marks());
        assert!(summarize("TEST", &records).is_none());
        assert!(summarize("TEST", &[]).is_none());
    }
}
