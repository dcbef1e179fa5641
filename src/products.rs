//! Listing products built on top of station series.
//!
//! These are the shapes handed to the HTTP layer: a multi-element listing
//! over a date range, a single-day variant, the most recent complete record
//! and the list of months a station has data for.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::calendar::{datetime_from_day_time, filename_from_year_month, YearMonth};
use crate::catalog::{ElementCatalog, UnitSystem};
use crate::error::{Result, WeaError};
use crate::logging::{log_operation_end, log_operation_start};
use crate::meta::StationMeta;
use crate::series::{SeriesOptions, StationSeries};
use crate::wea_file::{is_missing, WeaFile};

/// `(year, month, day, hour, minute)` as sent to clients
pub type DateTuple = (i32, u32, u32, u32, u32);

fn date_tuple(date: &NaiveDateTime) -> DateTuple {
    (
        date.year(),
        date.month(),
        date.day(),
        date.hour(),
        date.minute(),
    )
}

/// Every requested element over a date range at the native interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataListing {
    pub stn: String,
    pub oi: u32,
    pub rgt: i16,
    pub fac1: u32,
    pub fac2: u32,
    #[serde(rename = "sD")]
    pub start: DateTuple,
    #[serde(rename = "eD")]
    pub end: DateTuple,
    pub data: BTreeMap<String, Vec<f32>>,
    pub units: BTreeMap<String, Option<String>>,
}

/// The newest record with no missing observations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRecord {
    pub stn: String,
    pub timestamp: NaiveDateTime,
    pub data: BTreeMap<String, f32>,
    pub units: BTreeMap<String, Option<String>>,
}

/// Months a station has data for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationDates {
    pub stn: String,
    pub dates: Vec<(i32, u32)>,
}

/// Everything needed to answer product requests
#[derive(Debug, Clone, Copy)]
pub struct ProductContext<'a> {
    pub data_dir: &'a Path,
    pub catalog: &'a ElementCatalog,
    pub options: &'a SeriesOptions,
}

/// Listing of `codes` (or every code in the newest file) over `[start, end]`
pub fn get_data(
    ctx: &ProductContext<'_>,
    stn: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    codes: Option<&[String]>,
    unit_system: UnitSystem,
) -> Result<DataListing> {
    let started = Instant::now();
    log_operation_start("get_data", Some(stn));

    let series = StationSeries::open(ctx.data_dir, stn, start, end, unit_system, ctx.options)?;
    let per_element = series.get_vars(codes, ctx.catalog)?;
    let header = series.last_header();

    let mut data = BTreeMap::new();
    let mut units = BTreeMap::new();
    for (code, element) in per_element {
        units.insert(code.clone(), element.units);
        data.insert(code, element.samples);
    }

    let listing = DataListing {
        stn: stn.to_string(),
        oi: header.oi,
        rgt: header.rgt,
        fac1: header.fac1,
        fac2: header.fac2,
        start: date_tuple(&start),
        end: date_tuple(&end),
        data,
        units,
    };

    log_operation_end("get_data", started, true);
    Ok(listing)
}

/// Listing covering 00:00 to 23:59 of `day`
pub fn get_data_single_day(
    ctx: &ProductContext<'_>,
    stn: &str,
    day: NaiveDate,
    codes: Option<&[String]>,
    unit_system: UnitSystem,
) -> Result<DataListing> {
    let start = day.and_time(Default::default());
    let end = start + Duration::minutes(23 * 60 + 59);
    get_data(ctx, stn, start, end, codes, unit_system)
}

/// Most recent complete record, searching back through older months when
/// the newest one holds nothing usable
pub fn get_most_recent_data(
    ctx: &ProductContext<'_>,
    stn: &str,
    unit_system: &UnitSystem,
) -> Result<RecentRecord> {
    let started = Instant::now();
    log_operation_start("get_most_recent_data", Some(stn));

    let meta = StationMeta::new(ctx.data_dir, stn)?;
    let months = meta.date_list()?;
    if months.is_empty() {
        return Err(WeaError::file_unavailable(
            meta.data_dir(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "station has no data files"),
        ));
    }

    let mut last_error = None;
    for ym in months.iter().rev() {
        let path = meta
            .data_dir()
            .join(filename_from_year_month(*ym, meta.station()));
        let file = WeaFile::open(&path)?;
        match file.latest_valid_record(ctx.options.missing_sentinel) {
            Ok(record) => {
                let timestamp = record_timestamp(&file, *ym, record.row, &record.values)?;
                let mut data = BTreeMap::new();
                let mut units = BTreeMap::new();
                for (code, value) in record.values {
                    let (native, conversion) = ctx.catalog.conversion_for(&code, unit_system);
                    let value = match conversion {
                        Some(c) if !is_missing(value, ctx.options.missing_sentinel) => {
                            c.apply(value as f64) as f32
                        }
                        _ => value,
                    };
                    let unit = conversion
                        .map(|c| c.units.clone())
                        .or_else(|| native.map(str::to_string));
                    units.insert(code.clone(), unit);
                    data.insert(code, value);
                }

                log_operation_end("get_most_recent_data", started, true);
                return Ok(RecentRecord {
                    stn: stn.to_string(),
                    timestamp,
                    data,
                    units,
                });
            }
            Err(err @ WeaError::NoValidRecord { .. }) => last_error = Some(err),
            Err(err) => return Err(err),
        }
    }

    log_operation_end("get_most_recent_data", started, false);
    Err(last_error.unwrap_or_else(|| WeaError::NoValidRecord {
        path: meta.data_dir().to_path_buf(),
    }))
}

/// Timestamp of a record, from its DAY/TIM columns when the file has them.
///
/// An impossible day/time pair means the file itself is bad.
fn record_timestamp(
    file: &WeaFile,
    ym: YearMonth,
    row: usize,
    values: &BTreeMap<String, f32>,
) -> Result<NaiveDateTime> {
    if let (Some(day), Some(tim)) = (values.get("DAY"), values.get("TIM")) {
        if *day >= 1.0 && *tim >= 0.0 {
            return datetime_from_day_time(*day as u32, *tim as u32, ym.year).map_err(|e| {
                WeaError::MalformedFile {
                    path: file.path().to_path_buf(),
                    message: format!("row {}: {}", row, e),
                }
            });
        }
    }
    Ok(ym.anchor()? + Duration::minutes(row as i64 * file.header().oi as i64))
}

/// Every month `stn` has a file for
pub fn get_station_dates(data_dir: &Path, stn: &str) -> Result<StationDates> {
    let dates = StationMeta::new(data_dir, stn)?
        .date_list()?
        .into_iter()
        .map(|ym| (ym.year, ym.month))
        .collect();
    Ok(StationDates {
        stn: stn.to_string(),
        dates,
    })
}
