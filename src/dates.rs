// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Lenient parsing of sequencing dates.
//!
//! Sample sheets and hand-written defaults carry dates in whatever form the
//! facility or the user preferred. Everything `mka` stores is normalised to
//! ISO-8601 calendar dates. Ambiguous inputs (two-digit years, missing years)
//! resolve to the most recent matching date that is not in the future.

use chrono::{DateTime, Datelike, Local, Months, NaiveDate, NaiveDateTime};

const FULL_YEAR_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const SHORT_YEAR_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%d %b %y", "%b %d, %y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Formats without a year. The year is supplied from `today`.
const NO_YEAR_FORMATS: &[&str] = &["%B %d", "%b %d", "%d %B", "%d %b", "%m/%d"];

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parse `value` leniently, preferring dates that are not after `today`.
pub fn parse_date(value: &str, today: NaiveDate) -> Option<NaiveDate> {
    let value = value.trim().trim_end_matches(',').trim();
    if value.is_empty() {
        return None;
    }

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        let year = value[0..4].parse().ok()?;
        let month = value[4..6].parse().ok()?;
        let day = value[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    for fmt in SHORT_YEAR_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(prefer_past(date, today, 100));
        }
    }

    for fmt in FULL_YEAR_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for fmt in NO_YEAR_FORMATS {
        let with_year = format!("{} {}", value, today.year());
        let fmt_with_year = format!("{fmt} %Y");
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, &fmt_with_year) {
            return Some(prefer_past(date, today, 1));
        }
    }

    None
}

/// Parse `value` and render it as `YYYY-MM-DD`.
pub fn normalize_date(value: &str, today: NaiveDate) -> Option<String> {
    parse_date(value, today).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Step `date` back by `years` if it lies after `today`.
fn prefer_past(date: NaiveDate, today: NaiveDate, years: u32) -> NaiveDate {
    if date > today {
        date.checked_sub_months(Months::new(12 * years))
            .unwrap_or(date)
    } else {
        date
    }
}
