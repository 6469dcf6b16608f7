//! Persian (Solar Hijri / Jalali) calendar arithmetic.
//!
//! Uses the 2820-year break table of Borkowski; valid for Persian years
//! -61..3177. Gregorian dates are handled by chrono and Farvardin 1 is
//! located as a day of March in the corresponding Gregorian year.

use chrono::{Datelike, Duration, NaiveDate};

const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Leap-cycle information for one Persian year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct YearInfo {
    /// Years since the last leap year (0 means this year is leap).
    leap: i32,
    /// Gregorian year in which the Persian year begins.
    gregorian_year: i32,
    /// Day of March on which Farvardin 1 falls.
    march_day: i32,
}

fn year_info(jy: i32) -> Option<YearInfo> {
    if jy < BREAKS[0] || jy >= BREAKS[BREAKS.len() - 1] {
        return None;
    }

    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;

    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + ((n % 33) + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march_day = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = (((n + 1) % 33) - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    Some(YearInfo {
        leap,
        gregorian_year: gy,
        march_day,
    })
}

/// Whether the Persian year has 366 days.
pub fn is_leap_year(jy: i32) -> bool {
    year_info(jy).is_some_and(|info| info.leap == 0)
}

/// Number of days in a Persian month, or `None` for an invalid month/year.
pub fn days_in_month(jy: i32, jm: u32) -> Option<u32> {
    match jm {
        1..=6 => Some(31),
        7..=11 => Some(30),
        12 => year_info(jy).map(|info| if info.leap == 0 { 30 } else { 29 }),
        _ => None,
    }
}

fn farvardin_first(info: YearInfo) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(info.gregorian_year, 3, info.march_day as u32)
}

/// Convert a Persian date to its Gregorian equivalent.
pub fn to_gregorian(jy: i32, jm: u32, jd: u32) -> Option<NaiveDate> {
    let max_day = days_in_month(jy, jm)?;
    if jd == 0 || jd > max_day {
        return None;
    }
    let start = farvardin_first(year_info(jy)?)?;
    let jm = jm as i64;
    let offset = (jm - 1) * 31 - (jm / 7) * (jm - 7) + jd as i64 - 1;
    Some(start + Duration::days(offset))
}

/// Convert a Gregorian date to `(year, month, day)` in the Persian calendar.
pub fn from_gregorian(date: NaiveDate) -> Option<(i32, u32, u32)> {
    let gy = date.year();
    let mut jy = gy - 621;
    let info = year_info(jy)?;
    let mut k = (date - farvardin_first(info)?).num_days();

    if k >= 0 {
        if k <= 185 {
            return Some((jy, (1 + k / 31) as u32, (k % 31 + 1) as u32));
        }
        k -= 186;
    } else {
        jy -= 1;
        k += 179;
        if info.leap == 1 {
            k += 1;
        }
    }
    Some((jy, (7 + k / 30) as u32, (k % 30 + 1) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn nowruz_dates_match_known_values() {
        assert_eq!(to_gregorian(1403, 1, 1), Some(ymd(2024, 3, 20)));
        assert_eq!(to_gregorian(1404, 1, 1), Some(ymd(2025, 3, 21)));
        assert_eq!(to_gregorian(1399, 1, 1), Some(ymd(2020, 3, 20)));
    }

    #[test]
    fn mid_year_conversions() {
        assert_eq!(to_gregorian(1404, 4, 20), Some(ymd(2025, 7, 11)));
        assert_eq!(to_gregorian(1403, 5, 23), Some(ymd(2024, 8, 13)));
        assert_eq!(from_gregorian(ymd(2025, 7, 11)), Some((1404, 4, 20)));
        assert_eq!(from_gregorian(ymd(2024, 1, 1)), Some((1402, 10, 11)));
    }

    #[test]
    fn leap_years_follow_the_33_year_cycle() {
        assert!(is_leap_year(1403));
        assert!(!is_leap_year(1404));
        assert!(is_leap_year(1399));
        assert_eq!(days_in_month(1403, 12), Some(30));
        assert_eq!(days_in_month(1404, 12), Some(29));
        assert_eq!(days_in_month(1404, 13), None);
    }

    #[test]
    fn invalid_days_are_rejected() {
        assert_eq!(to_gregorian(1404, 12, 30), None);
        assert_eq!(to_gregorian(1404, 7, 31), None);
        assert_eq!(to_gregorian(1404, 1, 0), None);
    }

    #[test]
    fn every_day_round_trips_over_several_years() {
        let mut date = ymd(2019, 1, 1);
        let end = ymd(2027, 1, 1);
        while date < end {
            let (jy, jm, jd) = from_gregorian(date).unwrap();
            assert_eq!(to_gregorian(jy, jm, jd), Some(date), "round trip of {}", date);
            date += Duration::days(1);
        }
    }
}
