//! Calendar-aware date parsing and formatting.
//!
//! Dates are written with a small token pattern (`YYYY-MM-DD HH24:MI:SS`)
//! in either the Gregorian or the Persian (Solar Hijri) calendar. Both
//! calendars convert through the canonical `DateTime<Utc>` instant.
//!
//! # Example
//! ```
//! use anofox_anomaly::calendar::{self, Calendar};
//!
//! let instant = calendar::parse("1404-04-20", "yyyy-mm-dd", Calendar::Persian).unwrap();
//! assert_eq!(instant.to_string(), "2025-07-11 00:00:00 UTC");
//! ```

pub mod jalali;
pub mod pattern;

use crate::error::{AnomalyError, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use pattern::Fields;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported calendar systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calendar {
    #[default]
    Gregorian,
    Persian,
}

impl Calendar {
    /// Parse `text` written in this calendar.
    pub fn parse(self, text: &str, pattern: &str) -> Result<DateTime<Utc>> {
        parse(text, pattern, self)
    }

    /// Format `instant` in this calendar.
    pub fn format(self, instant: DateTime<Utc>, pattern: &str) -> Result<String> {
        format(instant, pattern, self)
    }

    fn expand_short_year(self, yy: u32) -> i32 {
        let yy = yy as i32;
        match self {
            Calendar::Gregorian if yy >= 69 => 1900 + yy,
            Calendar::Gregorian => 2000 + yy,
            Calendar::Persian if yy >= 50 => 1300 + yy,
            Calendar::Persian => 1400 + yy,
        }
    }

    fn to_date(self, year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        match self {
            Calendar::Gregorian => NaiveDate::from_ymd_opt(year, month, day),
            Calendar::Persian => jalali::to_gregorian(year, month, day),
        }
    }

    fn from_date(self, date: NaiveDate) -> Option<(i32, u32, u32)> {
        match self {
            Calendar::Gregorian => Some((date.year(), date.month(), date.day())),
            Calendar::Persian => jalali::from_gregorian(date),
        }
    }
}

impl FromStr for Calendar {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gregorian" | "miladi" => Ok(Calendar::Gregorian),
            "persian" | "jalali" | "shamsi" => Ok(Calendar::Persian),
            _ => Err(AnomalyError::UnsupportedCalendar(s.to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Gregorian => write!(f, "gregorian"),
            Calendar::Persian => write!(f, "persian"),
        }
    }
}

/// Parse `text` against a token pattern in the given calendar.
pub fn parse(text: &str, pattern: &str, calendar: Calendar) -> Result<DateTime<Utc>> {
    let fail = |reason: String| AnomalyError::DateFormat {
        input: text.to_string(),
        pattern: pattern.to_string(),
        reason,
    };

    let tokens = pattern::compile(pattern);
    let fields = pattern::read_fields(text, &tokens).map_err(fail)?;

    let year = match (fields.year, fields.short_year) {
        (Some(year), _) => year,
        (None, Some(yy)) => calendar.expand_short_year(yy),
        (None, None) => return Err(fail("pattern has no year field".to_string())),
    };

    let date = calendar
        .to_date(year, fields.month, fields.day)
        .ok_or_else(|| {
            fail(format!(
                "{}-{:02}-{:02} is not a valid {} date",
                year, fields.month, fields.day, calendar
            ))
        })?;
    let time = NaiveTime::from_hms_opt(fields.hour, fields.minute, fields.second).ok_or_else(
        || {
            fail(format!(
                "{:02}:{:02}:{:02} is not a valid time",
                fields.hour, fields.minute, fields.second
            ))
        },
    )?;

    Ok(NaiveDateTime::new(date, time).and_utc())
}

/// Render `instant` with a token pattern in the given calendar.
pub fn format(instant: DateTime<Utc>, pattern: &str, calendar: Calendar) -> Result<String> {
    let (year, month, day) = calendar.from_date(instant.date_naive()).ok_or_else(|| {
        AnomalyError::InvalidParameter(format!(
            "{} is outside the {} calendar range",
            instant, calendar
        ))
    })?;

    let fields = Fields {
        year: Some(year),
        short_year: None,
        month,
        day,
        hour: instant.hour(),
        minute: instant.minute(),
        second: instant.second(),
    };
    Ok(pattern::write_fields(&fields, &pattern::compile(pattern)))
}

// (month, day) pairs of fixed-date public holidays in the Persian calendar.
const PERSIAN_FIXED_HOLIDAYS: [(u32, u32); 10] = [
    (1, 1),
    (1, 2),
    (1, 3),
    (1, 4),
    (1, 12),
    (1, 13),
    (3, 14),
    (3, 15),
    (11, 22),
    (12, 29),
];

/// Gregorian dates in `[start, end]` that are fixed Persian public holidays.
pub fn persian_fixed_holidays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut holidays = Vec::new();
    if start > end {
        return holidays;
    }
    let (Some((first_year, _, _)), Some((last_year, _, _))) =
        (jalali::from_gregorian(start), jalali::from_gregorian(end))
    else {
        return holidays;
    };

    for jy in first_year..=last_year {
        for &(jm, jd) in &PERSIAN_FIXED_HOLIDAYS {
            if let Some(date) = jalali::to_gregorian(jy, jm, jd) {
                if date >= start && date <= end {
                    holidays.push(date);
                }
            }
        }
    }
    holidays.sort();
    holidays
}

/// Whether `date` is a fixed Persian public holiday.
pub fn is_persian_holiday(date: NaiveDate) -> bool {
    !persian_fixed_holidays(date, date).is_empty()
}
