//! Test data generation utilities.
//!
//! Writes `.wea` files with known contents: the `DAY` and `TIM` columns hold
//! the real day-of-year and `HHMM` of each record, so stitched output can be
//! checked against the calendar directly.

use std::fs::{self, File};
use std::io::{BufWriter, Result, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

/// Element layout used by the standard test station
pub const STATION_PCODES: [&str; 4] = ["DAY", "TIM", "AVA", "RAN"];

/// Months (year, month) written for the standard test station
pub const STATION_MONTHS: [(i32, u32); 5] =
    [(2011, 11), (2011, 12), (2012, 1), (2012, 2), (2012, 3)];

/// Value used for missing observations in generated files
pub const MISSING: f32 = 1.0e7;

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
        .day()
}

/// Stored value of the day/time columns, if `code` is one of them
pub fn day_time_value(ts: NaiveDateTime, code: &str) -> Option<f32> {
    match code {
        "DAY" => Some(ts.ordinal() as f32),
        "TIM" => Some((ts.hour() * 100 + ts.minute()) as f32),
        _ => None,
    }
}

/// Write one month of records for `station` into `dir`.
///
/// # Arguments
///
/// * `dir` - The station directory
/// * `oi` - Observation interval in minutes
/// * `pcodes` - Element codes in column order
/// * `value` - Produces each stored value from its timestamp and code
pub fn write_station_month<F>(
    dir: &Path,
    station: &str,
    (year, month): (i32, u32),
    oi: i16,
    pcodes: &[&str],
    value: F,
) -> Result<PathBuf>
where
    F: Fn(NaiveDateTime, &str) -> f32,
{
    let path = dir.join(format!("{}{:02}{:02}.wea", station, month, year % 100));
    let minutes = days_in_month(year, month) * 24 * 60;
    let rows = minutes / oi as u32;
    let anchor = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let mut out = BufWriter::new(File::create(&path)?);
    out.write_i16::<LittleEndian>(1)?;
    // Stale total-minutes field, as found in real files
    out.write_f32::<LittleEndian>(44640.0)?;
    out.write_i16::<LittleEndian>(oi)?;
    out.write_i16::<LittleEndian>(pcodes.len() as i16)?;
    out.write_i16::<LittleEndian>(1)?;
    out.write_i16::<LittleEndian>(3)?;
    for _ in 0..8 {
        out.write_i16::<LittleEndian>(0)?;
    }
    for code in pcodes {
        out.write_all(code.as_bytes())?;
    }
    for row in 0..rows {
        let ts = anchor + Duration::minutes(row as i64 * oi as i64);
        for code in pcodes {
            out.write_f32::<LittleEndian>(value(ts, code))?;
        }
    }
    out.flush()?;
    Ok(path)
}

/// Create station `nnsc` under `root` with 10-minute data for
/// November 2011 through March 2012.
///
/// `AVA` holds 20.0 except for the final six hours of March 2012, which are
/// missing; `RAN` is 0.2 everywhere.
pub fn create_test_station(root: &Path) -> Result<PathBuf> {
    let dir = root.join("nnsc");
    fs::create_dir_all(&dir)?;
    for month in STATION_MONTHS {
        write_station_month(&dir, "nnsc", month, 10, &STATION_PCODES, |ts, code| {
            if let Some(v) = day_time_value(ts, code) {
                return v;
            }
            match code {
                "AVA" if ts.month() == 3 && ts.day() == 31 && ts.hour() >= 18 => MISSING,
                "AVA" => 20.0,
                _ => 0.2,
            }
        })?;
    }
    Ok(dir)
}

/// Write the three catalog tables into `dir`, returning
/// (elements, wea_elements, conversions)
pub fn write_catalog_tables(dir: &Path) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let elements = dir.join("elements.dat");
    fs::write(
        &elements,
        "pcode,name,max,min,unused,fmt\n\
         AVA, \"Average Air Temperature\", 40, -20, 0, 3\n\
         RAN, \"Rainfall\", 10, 0, 0, 1\n\
         DAY, \"Day of year\", 366, 1, 0, 2\n\
         TIM, \"Time of day\", 2359, 0, 0, 2\n",
    )?;

    let wea_elements = dir.join("wea_elements.dat");
    fs::write(
        &wea_elements,
        "pcode,units,desc1,desc2,desc\n\
         AVA, Deg C, Temp, Avg,Average air temperature\n\
         RAN, mm, Rain, Tot,Total rainfall\n",
    )?;

    let conversions = dir.join("wea_elements2.dat");
    fs::write(
        &conversions,
        "system,from,to,multiplier,offset\n\
         E, Deg C, Deg F, 1.8, 32\n\
         M, Deg C, Deg C, 1, 0\n\
         E, mm, in, 0.0393701, 0\n\
         M, mm, mm, 1, 0\n",
    )?;

    Ok((elements, wea_elements, conversions))
}
