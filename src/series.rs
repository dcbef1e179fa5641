//! Stitching monthly files into one chronological series.
//!
//! A query names a station and an inclusive datetime range. Every month the
//! range touches is opened, the start and end are snapped onto the shared
//! observation grid, and the requested column is sliced out of each file and
//! concatenated in calendar order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::{filename_from_year_month, minutes_between, round_date, station_id, YearMonth};
use crate::catalog::{ElementCatalog, UnitSystem};
use crate::error::{Result, WeaError};
use crate::wea_file::{is_missing, Header, WeaFile, DEFAULT_MISSING_SENTINEL};

/// Default cap on the number of monthly files one query may open
pub const DEFAULT_MAX_MONTHS: usize = 1200;

/// Tunables shared by every query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesOptions {
    /// Values at or above this are missing observations
    pub missing_sentinel: f32,
    /// Upper bound on months spanned by one query
    pub max_months: usize,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            missing_sentinel: DEFAULT_MISSING_SENTINEL,
            max_months: DEFAULT_MAX_MONTHS,
        }
    }
}

/// One element's samples over the queried range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSeries {
    pub samples: Vec<f32>,
    /// Unit the samples are expressed in, when the catalog knows it
    pub units: Option<String>,
}

/// Result of a multi-element query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub per_element: BTreeMap<String, ElementSeries>,
}

/// Path of every monthly file spanned by `[start, end]`, oldest first
pub fn month_filenames(
    data_dir: &Path,
    station: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    max_months: usize,
) -> Result<Vec<PathBuf>> {
    let station = station_id(station)?;
    if start > end {
        return Err(WeaError::InvalidRange {
            start: *start,
            end: *end,
        });
    }

    let first = YearMonth::of(start);
    let last = YearMonth::of(end);
    let months = ((last.year - first.year) as i64 * 12 + last.month as i64 - first.month as i64
        + 1) as usize;
    if months > max_months {
        return Err(WeaError::RangeTooLarge {
            months,
            limit: max_months,
        });
    }

    let station_dir = data_dir.join(&station);
    let mut filenames = Vec::with_capacity(months);
    let mut month = first;
    while month <= last {
        filenames.push(station_dir.join(filename_from_year_month(month, &station)));
        month = month.next();
    }
    Ok(filenames)
}

/// The opened files behind one query
#[derive(Debug)]
pub struct StationSeries {
    station: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    unit_system: UnitSystem,
    missing_sentinel: f32,
    oi: u32,
    files: Vec<WeaFile>,
}

impl StationSeries {
    /// Open every month of `[start, end]` for `station` under `data_dir`.
    ///
    /// All files must share one observation interval.
    pub fn open(
        data_dir: &Path,
        station: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        unit_system: UnitSystem,
        options: &SeriesOptions,
    ) -> Result<Self> {
        let filenames = month_filenames(data_dir, station, &start, &end, options.max_months)?;

        let mut files = Vec::with_capacity(filenames.len());
        for path in &filenames {
            files.push(WeaFile::open(path)?);
        }

        // month_filenames never returns an empty list for a valid range
        let oi = files[0].header().oi;
        for file in &files[1..] {
            if file.header().oi != oi {
                return Err(WeaError::InconsistentSamplingInterval {
                    path: file.path().to_path_buf(),
                    expected: oi,
                    found: file.header().oi,
                });
            }
        }

        debug!(
            station = station,
            files = files.len(),
            oi = oi,
            "Opened station series"
        );

        Ok(Self {
            station: station_id(station)?,
            start,
            end,
            unit_system,
            missing_sentinel: options.missing_sentinel,
            oi,
            files,
        })
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn files(&self) -> &[WeaFile] {
        &self.files
    }

    /// Shared observation interval in minutes
    pub fn oi(&self) -> u32 {
        self.oi
    }

    /// Header of the newest file in the range
    pub fn last_header(&self) -> &Header {
        // files is never empty once opened
        self.files[self.files.len() - 1].header()
    }

    pub fn unit_system(&self) -> &UnitSystem {
        &self.unit_system
    }

    pub fn set_unit_system(&mut self, unit_system: UnitSystem) {
        self.unit_system = unit_system;
    }

    /// Row index of `date` after snapping it onto the grid, counted from the
    /// start of `file`'s month. Dates rounded past either end of the month
    /// fall outside `0..rows` and are clipped when slicing.
    fn record_index(&self, file: &WeaFile, date: &NaiveDateTime, round_up: bool) -> Result<i64> {
        let rounded = round_date(date, self.oi, round_up);
        let anchor = file.year_month().anchor()?;
        let index = minutes_between(&anchor, &rounded).div_euclid(self.oi as i64);
        debug!(
            date = %date,
            rounded = %rounded,
            anchor = %anchor,
            index = index,
            "Computed record index"
        );
        Ok(index)
    }

    /// Samples for `code` over the range with both ends rounded down
    pub fn get_var(&self, code: &str, catalog: &ElementCatalog) -> Result<ElementSeries> {
        self.get_var_rounded(code, false, false, catalog)
    }

    /// Samples for `code`, choosing how each end of the range is rounded
    pub fn get_var_rounded(
        &self,
        code: &str,
        round_start_up: bool,
        round_end_up: bool,
        catalog: &ElementCatalog,
    ) -> Result<ElementSeries> {
        let code = code.to_uppercase();
        let first = &self.files[0];
        let last = &self.files[self.files.len() - 1];
        let start_index = self.record_index(first, &self.start, round_start_up)?;
        let end_index = self.record_index(last, &self.end, round_end_up)?;

        if self.files.len() == 1 && end_index < start_index {
            return Ok(ElementSeries {
                samples: Vec::new(),
                units: catalog.unit_for(&code, &self.unit_system),
            });
        }

        let start_row = start_index.max(0) as usize;
        let count = self.files.len();
        let mut samples = Vec::new();
        for (i, file) in self.files.iter().enumerate() {
            // Element layout may drift between months
            let col = file.column_index(&code)?;
            let last_row = file.rows().saturating_sub(1);
            let is_last = i == count - 1;
            if is_last && end_index < 0 {
                continue;
            }
            let end_row = if is_last { end_index as usize } else { last_row };
            let begin = if i == 0 { start_row } else { 0 };
            samples.extend(file.column_slice(col, begin..=end_row).iter().copied());
        }

        let (native_units, conversion) = catalog.conversion_for(&code, &self.unit_system);
        if conversion.is_none() && !self.unit_system.is_native() {
            debug!(
                code = %code,
                unit_system = self.unit_system.label(),
                "No conversion available, returning native units"
            );
        }
        let units = match conversion {
            Some(conversion) => {
                for value in samples.iter_mut() {
                    if !is_missing(*value, self.missing_sentinel) {
                        *value = conversion.apply(*value as f64) as f32;
                    }
                }
                Some(conversion.units.clone())
            }
            None => native_units.map(str::to_string),
        };

        Ok(ElementSeries { samples, units })
    }

    /// Samples for several codes, defaulting to every code in the newest file
    pub fn get_vars(
        &self,
        codes: Option<&[String]>,
        catalog: &ElementCatalog,
    ) -> Result<BTreeMap<String, ElementSeries>> {
        let codes = match codes {
            Some(codes) => codes.to_vec(),
            None => self.last_header().pcodes.clone(),
        };
        let mut per_element = BTreeMap::new();
        for code in codes {
            let series = self.get_var(&code, catalog)?;
            per_element.insert(code, series);
        }
        Ok(per_element)
    }
}

/// Run one query end to end
pub fn query(
    data_dir: &Path,
    station: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    codes: Option<&[String]>,
    unit_system: UnitSystem,
    catalog: &ElementCatalog,
    options: &SeriesOptions,
) -> Result<QueryResult> {
    let started = Instant::now();
    let series = StationSeries::open(data_dir, station, start, end, unit_system, options)?;
    let per_element = series.get_vars(codes, catalog)?;

    info!(
        operation = "query",
        station = station,
        start = %start,
        end = %end,
        files = series.files().len(),
        elements = per_element.len(),
        duration_us = started.elapsed().as_micros() as u64,
        "Query completed"
    );

    Ok(QueryResult { per_element })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConversionEntry, ElementMetadata};
    use crate::wea_file::{test_day_time, write_test_file};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    const PCODES: [&str; 3] = ["DAY", "TIM", "AVA"];

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    /// Station "nnsc" with 10-minute files from Nov 2011 to Mar 2012
    fn station_dir() -> TempDir {
        let dir = tempdir().unwrap();
        let station = dir.path().join("nnsc");
        std::fs::create_dir(&station).unwrap();
        for name in ["nnsc1111.wea", "nnsc1211.wea", "nnsc0112.wea", "nnsc0212.wea", "nnsc0312.wea"] {
            write_test_file(&station.join(name), 10, &PCODES, |ts, code| {
                test_day_time(ts, code).unwrap_or(-10.0)
            })
            .unwrap();
        }
        dir
    }

    fn times(series: &ElementSeries) -> Vec<String> {
        series
            .samples
            .iter()
            .map(|v| format!("{:04}", *v as i32))
            .collect()
    }

    fn open(dir: &Path, start: NaiveDateTime, end: NaiveDateTime) -> StationSeries {
        StationSeries::open(dir, "NNSC", start, end, UnitSystem::Native, &SeriesOptions::default())
            .unwrap()
    }

    #[test]
    fn test_month_filenames() {
        let root = Path::new("/data");
        let names = month_filenames(root, "NNSC", &dt(2011, 1, 15, 0, 0), &dt(2011, 12, 31, 0, 0), 1200)
            .unwrap();
        assert_eq!(names.len(), 12);
        assert_eq!(names[0], Path::new("/data/nnsc/nnsc0111.wea"));
        assert_eq!(names[11], Path::new("/data/nnsc/nnsc1211.wea"));

        let names = month_filenames(root, "nnsc", &dt(2011, 6, 30, 0, 0), &dt(2011, 7, 31, 0, 0), 1200)
            .unwrap();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_station_must_stay_under_root() {
        for station in ["/etc/secret", "..", "../nnsc", "nn/sc", ""] {
            let result = month_filenames(
                Path::new("/data"),
                station,
                &dt(2011, 12, 1, 0, 0),
                &dt(2011, 12, 1, 0, 0),
                1200,
            );
            assert!(
                matches!(result, Err(WeaError::InvalidParameter { .. })),
                "{:?} should be rejected",
                station
            );
        }
    }

    #[test]
    fn test_invalid_range_rejected() {
        let result = month_filenames(
            Path::new("/data"),
            "nnsc",
            &dt(2012, 1, 2, 0, 0),
            &dt(2012, 1, 1, 0, 0),
            1200,
        );
        assert!(matches!(result, Err(WeaError::InvalidRange { .. })));
    }

    #[test]
    fn test_range_guard() {
        let result = month_filenames(
            Path::new("/data"),
            "nnsc",
            &dt(2000, 1, 1, 0, 0),
            &dt(2002, 1, 1, 0, 0),
            24,
        );
        assert!(matches!(
            result,
            Err(WeaError::RangeTooLarge { months: 25, limit: 24 })
        ));
    }

    #[test]
    fn test_single_file_hour() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2011, 12, 7, 15, 0), dt(2011, 12, 7, 16, 0));
        assert_eq!(series.oi(), 10);
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        assert_eq!(
            times(&tim),
            vec!["1500", "1510", "1520", "1530", "1540", "1550", "1600"]
        );
    }

    #[test]
    fn test_year_boundary() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2011, 12, 31, 23, 40), dt(2012, 1, 1, 0, 10));
        assert_eq!(series.files().len(), 2);
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        assert_eq!(times(&tim), vec!["2340", "2350", "0000", "0010"]);
    }

    #[test]
    fn test_leap_day_boundary() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2012, 2, 29, 23, 50), dt(2012, 3, 1, 0, 10));
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        assert_eq!(times(&tim), vec!["2350", "0000", "0010"]);
    }

    #[test]
    fn test_full_months_in_between() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2011, 11, 1, 0, 0), dt(2012, 1, 31, 23, 50));
        let expected: usize = series.files().iter().map(|f| f.rows()).sum();
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        assert_eq!(tim.samples.len(), expected);
        assert_eq!(expected, (30 + 31 + 31) * 144);
    }

    #[test]
    fn test_whole_day() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2012, 1, 1, 0, 0), dt(2012, 1, 1, 23, 50));
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        let expected: Vec<String> = (0..24)
            .flat_map(|h| (0..60).step_by(10).map(move |m| format!("{:02}{:02}", h, m)))
            .collect();
        assert_eq!(times(&tim), expected);
    }

    #[test]
    fn test_rounding_choices() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2011, 12, 7, 15, 4), dt(2011, 12, 7, 15, 36));
        let catalog = ElementCatalog::new();

        let down = series.get_var_rounded("TIM", false, false, &catalog).unwrap();
        assert_eq!(times(&down), vec!["1500", "1510", "1520", "1530"]);

        let up = series.get_var_rounded("TIM", true, true, &catalog).unwrap();
        assert_eq!(times(&up), vec!["1510", "1520", "1530", "1540"]);
    }

    #[test]
    fn test_end_rounded_past_month() {
        let dir = station_dir();
        let series = open(dir.path(), dt(2011, 12, 31, 23, 30), dt(2011, 12, 31, 23, 55));
        let tim = series
            .get_var_rounded("TIM", false, true, &ElementCatalog::new())
            .unwrap();
        assert_eq!(times(&tim), vec!["2330", "2340", "2350"]);
    }

    #[test]
    fn test_missing_month_fails_whole_query() {
        let dir = station_dir();
        let result = StationSeries::open(
            dir.path(),
            "nnsc",
            dt(2012, 3, 30, 0, 0),
            dt(2012, 4, 1, 0, 0),
            UnitSystem::Native,
            &SeriesOptions::default(),
        );
        assert!(matches!(result, Err(WeaError::FileUnavailable { .. })));
    }

    #[test]
    fn test_inconsistent_interval() {
        let dir = station_dir();
        let station = dir.path().join("nnsc");
        write_test_file(&station.join("nnsc0412.wea"), 60, &PCODES, |_, _| 0.0).unwrap();

        let result = StationSeries::open(
            dir.path(),
            "nnsc",
            dt(2012, 3, 30, 0, 0),
            dt(2012, 4, 1, 0, 0),
            UnitSystem::Native,
            &SeriesOptions::default(),
        );
        match result {
            Err(WeaError::InconsistentSamplingInterval { expected, found, .. }) => {
                assert_eq!((expected, found), (10, 60));
            }
            other => panic!("Expected InconsistentSamplingInterval, got {:?}", other),
        }
    }

    #[test]
    fn test_column_resolved_per_file() {
        let dir = station_dir();
        let station = dir.path().join("nnsc");
        // April reorders its columns
        write_test_file(&station.join("nnsc0412.wea"), 10, &["AVA", "TIM", "DAY"], |ts, code| {
            test_day_time(ts, code).unwrap_or(-10.0)
        })
        .unwrap();
        // May lacks AVA entirely
        write_test_file(&station.join("nnsc0512.wea"), 10, &["DAY", "TIM"], |ts, code| {
            test_day_time(ts, code).unwrap_or(0.0)
        })
        .unwrap();

        let series = open(dir.path(), dt(2012, 3, 31, 23, 50), dt(2012, 4, 1, 0, 10));
        let tim = series.get_var("TIM", &ElementCatalog::new()).unwrap();
        assert_eq!(times(&tim), vec!["2350", "0000", "0010"]);

        let series = open(dir.path(), dt(2012, 4, 30, 23, 50), dt(2012, 5, 1, 0, 10));
        match series.get_var("AVA", &ElementCatalog::new()) {
            Err(WeaError::UnknownVariable { file, code }) => {
                assert!(file.ends_with("nnsc0512.wea"));
                assert_eq!(code, "AVA");
            }
            other => panic!("Expected UnknownVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_unit_conversion_skips_missing() {
        let dir = tempdir().unwrap();
        let station = dir.path().join("abcd");
        std::fs::create_dir(&station).unwrap();
        write_test_file(&station.join("abcd0112.wea"), 60, &PCODES, |ts, code| {
            match test_day_time(ts, code) {
                Some(v) => v,
                None if chrono::Timelike::hour(&ts) == 3 => DEFAULT_MISSING_SENTINEL,
                None => 100.0,
            }
        })
        .unwrap();

        let mut catalog = ElementCatalog::new();
        catalog.insert_element(
            "AVA",
            ElementMetadata {
                name: "Average air temperature".to_string(),
                units: Some("Deg C".to_string()),
                ..Default::default()
            },
        );
        catalog.insert_conversion(
            "Deg C",
            "E",
            ConversionEntry {
                multiplier: 1.8,
                offset: 32.0,
                units: "Deg F".to_string(),
            },
        );

        let mut series = StationSeries::open(
            dir.path(),
            "abcd",
            dt(2012, 1, 1, 1, 0),
            dt(2012, 1, 1, 4, 0),
            UnitSystem::parse("E"),
            &SeriesOptions::default(),
        )
        .unwrap();
        let ava = series.get_var("ava", &catalog).unwrap();
        assert_eq!(ava.units.as_deref(), Some("Deg F"));
        assert_eq!(ava.samples, vec![212.0, 212.0, DEFAULT_MISSING_SENTINEL, 212.0]);

        series.set_unit_system(UnitSystem::Native);
        let ava = series.get_var("AVA", &catalog).unwrap();
        assert_eq!(ava.units.as_deref(), Some("Deg C"));
        assert_eq!(ava.samples, vec![100.0, 100.0, DEFAULT_MISSING_SENTINEL, 100.0]);

        // No conversion registered for this system: native values and unit
        series.set_unit_system(UnitSystem::parse("Q"));
        let ava = series.get_var("AVA", &catalog).unwrap();
        assert_eq!(ava.units.as_deref(), Some("Deg C"));
        assert_eq!(ava.samples[0], 100.0);
    }

    #[test]
    fn test_query_defaults_to_every_code() {
        let dir = station_dir();
        let result = query(
            dir.path(),
            "nnsc",
            dt(2011, 12, 7, 15, 0),
            dt(2011, 12, 7, 16, 0),
            None,
            UnitSystem::Native,
            &ElementCatalog::new(),
            &SeriesOptions::default(),
        )
        .unwrap();
        let codes: Vec<&String> = result.per_element.keys().collect();
        assert_eq!(codes, vec!["AVA", "DAY", "TIM"]);
        assert_eq!(result.per_element["DAY"].samples, vec![341.0; 7]);
    }
}
