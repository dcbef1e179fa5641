//! Calendar arithmetic for monthly observation files.
//!
//! Record indices are derived purely from dates, so everything here works at
//! minute resolution and ignores seconds.

use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Result, WeaError};

/// Suffix shared by every monthly data file
pub const FILE_SUFFIX: &str = ".wea";

/// Minutes in one day
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A calendar month of a specific year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Create a new YearMonth, rejecting months outside 1-12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(WeaError::InvalidMonth { month, year });
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`
    pub fn of(date: &NaiveDateTime) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month, rolling December into January
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Number of days in this month
    pub fn days(&self) -> Result<u32> {
        days_in_month(self.month, self.year)
    }

    /// Total minutes covered by this month
    pub fn minutes(&self) -> Result<u32> {
        Ok(self.days()? * MINUTES_PER_DAY)
    }

    /// Midnight on the first day of this month
    pub fn anchor(&self) -> Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(WeaError::InvalidMonth {
                month: self.month,
                year: self.year,
            })
    }
}

/// Gregorian leap-year rule
pub fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` of `year`
pub fn days_in_month(month: u32, year: i32) -> Result<u32> {
    match month {
        2 if is_leap(year) => Ok(29),
        2 => Ok(28),
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Ok(31),
        4 | 6 | 9 | 11 => Ok(30),
        _ => Err(WeaError::InvalidMonth { month, year }),
    }
}

/// Signed number of whole minutes from `a` to `b`
pub fn minutes_between(a: &NaiveDateTime, b: &NaiveDateTime) -> i64 {
    b.signed_duration_since(*a).num_minutes()
}

/// Midnight on the first day of the month after `date`
pub fn next_month_start(date: &NaiveDateTime) -> Result<NaiveDateTime> {
    YearMonth::of(date).next().anchor()
}

/// Snap `date` onto a grid of `granularity` minutes within its hour.
///
/// Rounding up always advances one step, even from a date already on the
/// grid.
pub fn round_date(date: &NaiveDateTime, granularity: u32, round_up: bool) -> NaiveDateTime {
    let granularity = granularity.max(1);
    let hour_start = date.date().and_time(Default::default()) + Duration::hours(date.hour() as i64);
    let minute = date.minute();
    let mut offset = minute - minute % granularity;
    if round_up {
        offset += granularity;
    }
    hour_start + Duration::minutes(offset as i64)
}

/// Expand a two-digit filename year into 1940-2039
pub fn year_from_two_digits(yy: u32) -> i32 {
    if yy >= 40 {
        1900 + yy as i32
    } else {
        2000 + yy as i32
    }
}

/// Normalize a station id to its lowercase directory name.
///
/// Ids come straight from requests and are joined onto the data root, so only
/// ASCII letters, digits and underscores are accepted.
pub fn station_id(station: &str) -> Result<String> {
    let valid = !station.is_empty()
        && station
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(WeaError::InvalidParameter {
            param: "stn".to_string(),
            message: format!("invalid station id {:?}", station),
        });
    }
    Ok(station.to_ascii_lowercase())
}

/// Build the data filename for a station month, e.g. `nnsc1211.wea`
pub fn filename_from_year_month(ym: YearMonth, station: &str) -> String {
    format!(
        "{}{:02}{:02}{}",
        station.to_lowercase(),
        ym.month,
        ym.year.rem_euclid(100),
        FILE_SUFFIX
    )
}

/// Recover the (year, month) a data file covers from its name
pub fn year_month_from_filename(path: &Path) -> Result<YearMonth> {
    let malformed = |message: &str| WeaError::MalformedFile {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| malformed("file name is not valid UTF-8"))?;
    let stem = name
        .strip_suffix(FILE_SUFFIX)
        .ok_or_else(|| malformed("missing .wea suffix"))?;
    if stem.len() < 4 || !stem.is_char_boundary(stem.len() - 4) {
        return Err(malformed("file name too short for MMYY"));
    }
    let digits = &stem[stem.len() - 4..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("expected MMYY before the suffix"));
    }

    let month: u32 = digits[..2]
        .parse()
        .map_err(|_| malformed("unparseable month"))?;
    let yy: u32 = digits[2..]
        .parse()
        .map_err(|_| malformed("unparseable year"))?;
    YearMonth::new(year_from_two_digits(yy), month)
}

/// Whether `name` is a data filename belonging to `station`
pub fn is_valid_filename(name: &str, station: &str) -> bool {
    let station = station.to_lowercase();
    let Some(rest) = name.strip_prefix(station.as_str()) else {
        return false;
    };
    let Some(digits) = rest.strip_suffix(FILE_SUFFIX) else {
        return false;
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    matches!(digits[..2].parse::<u32>(), Ok(1..=12))
}

/// Rebuild a timestamp from the day-of-year and `HHMM` time-of-day columns
pub fn datetime_from_day_time(day_of_year: u32, hhmm: u32, year: i32) -> Result<NaiveDateTime> {
    let invalid = || WeaError::InvalidParameter {
        param: "DAY/TIM".to_string(),
        message: format!("day {} time {:04} is not a valid time in {}", day_of_year, hhmm, year),
    };
    NaiveDate::from_yo_opt(year, day_of_year)
        .and_then(|d| d.and_hms_opt(hhmm / 100, hhmm % 100, 0))
        .ok_or_else(invalid)
}
