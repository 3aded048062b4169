//! Date normalisation between spreadsheet serials, locale-formatted strings
//! and native date/time values.
//!
//! Every representation collapses into a [`CanonicalInstant`], a wall-clock
//! date/time with no attached offset. Keeping the wall clock rather than an
//! absolute timestamp is what makes the displayed calendar day independent of
//! the timezone the conversion runs in: a serial that shows `10/7/25` in the
//! host spreadsheet stays `10/7/25` everywhere.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::model::CellValue;

/// Serial of 1970-01-01. Numbers at or below this are not treated as dates.
pub const UNIX_EPOCH_SERIAL: f64 = 25_569.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

const DATE_TIME_FORMATS: &[&str] = &[
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%dT%H:%M:%S",
    "%Y/%m/%dT%H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%a %b %d %Y",
];

/// Timezone-independent wall-clock instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalInstant(NaiveDateTime);

impl CanonicalInstant {
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Midnight at the start of `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN))
    }

    /// Captures the wall clock a zoned value shows in its own timezone.
    pub fn from_zoned<Tz: TimeZone>(value: &DateTime<Tz>) -> Self {
        Self(value.naive_local())
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// Shifts the instant by whole days.
    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Formats the calendar day as `M/D/YY`, the token form used in notes.
    pub fn short_date(&self) -> String {
        format_short_date(self.date())
    }
}

/// Formats a date as `M/D/YY` without zero padding on month or day.
pub fn format_short_date(date: NaiveDate) -> String {
    format!(
        "{}/{}/{:02}",
        date.month(),
        date.day(),
        date.year().rem_euclid(100)
    )
}

/// Converts a cell into a canonical instant.
///
/// Native date/time values pass through. Numbers are read as day-count
/// serials (epoch 1899-12-30) only when they land after 1970-01-01. Strings
/// have `-` replaced with `/` before being matched against the accepted
/// layouts. Anything else yields `None`.
pub fn parse_to_instant(value: &CellValue) -> Option<CanonicalInstant> {
    match value {
        CellValue::DateTime(value) => Some(CanonicalInstant(*value)),
        CellValue::Number(serial) => from_serial(*serial),
        CellValue::Text(text) => parse_text(text),
        CellValue::Empty | CellValue::Boolean(_) => None,
    }
}

/// Reads a day-count serial as a wall-clock instant.
pub fn from_serial(serial: f64) -> Option<CanonicalInstant> {
    if serial <= UNIX_EPOCH_SERIAL {
        return None;
    }
    serial_to_datetime(serial).map(CanonicalInstant)
}

/// Converts any serial to its wall-clock date/time, rounded to the second.
/// Used for cells the workbook itself marks as dates.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    serial_epoch().checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Inverse of [`from_serial`], built from the instant's calendar fields so
/// that storing and re-reading a value shows the same day.
pub fn to_serial(instant: CanonicalInstant) -> f64 {
    let elapsed = instant.0 - serial_epoch();
    elapsed.num_seconds() as f64 / SECONDS_PER_DAY
}

/// Whole calendar days from `from` to `to`. Negative when `to` precedes
/// `from`.
pub fn days_between_utc(from: CanonicalInstant, to: CanonicalInstant) -> i64 {
    (to.date() - from.date()).num_days()
}

/// Days elapsed since `since`, clamped at zero for future or equal instants.
pub fn elapsed_days(since: CanonicalInstant, now: CanonicalInstant) -> i64 {
    days_between_utc(since, now).max(0)
}

fn parse_text(text: &str) -> Option<CanonicalInstant> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(zoned) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(CanonicalInstant::from_zoned(&zoned));
    }

    let normalized = trimmed.replace('-', "/");

    for format in DATE_TIME_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(CanonicalInstant(value));
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
        .map(CanonicalInstant::from_date)
}

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}
