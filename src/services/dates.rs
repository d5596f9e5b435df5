// src/services/dates.rs
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Regular session close on US exchanges. Announcements time-stamped after
/// this are not tradeable until the next session.
fn market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap()
}

/// Weekday check only. No holiday calendar; matches the conventional
/// business-day offset semantics the attribution shift was defined with.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn add_business_days(mut date: NaiveDate, days: u32) -> NaiveDate {
    for _ in 0..days {
        date += Duration::days(1);
        while !is_business_day(date) {
            date += Duration::days(1);
        }
    }
    date
}

pub fn sub_business_days(mut date: NaiveDate, days: u32) -> NaiveDate {
    for _ in 0..days {
        date -= Duration::days(1);
        while !is_business_day(date) {
            date -= Duration::days(1);
        }
    }
    date
}

/// Date on which an announcement becomes visible to the market: the
/// announcement date itself, or the next business day when the timestamp is
/// strictly after the close.
pub fn effective_date(announced: NaiveDateTime) -> NaiveDate {
    let date = announced.date();
    if announced.time() > market_close() {
        add_business_days(date, 1)
    } else {
        date
    }
}

/// The fiscal quarter an announcement reports on trails the announcement
/// itself; shifting back 30 business days lands inside that quarter.
pub fn attribution_date(effective: NaiveDate) -> NaiveDate {
    sub_business_days(effective, 30)
}

/// Calendar-quarter label, e.g. "2023Q1".
pub fn quarter_label(date: NaiveDate) -> String {
    format!("{}Q{}", date.year(), date.month0() / 3 + 1)
}
