//! Station metadata discovered from the data directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::{is_valid_filename, station_id, year_month_from_filename, YearMonth};
use crate::error::{Result, WeaError};

/// Which months a station has files for
#[derive(Debug, Clone)]
pub struct StationMeta {
    station: String,
    data_dir: PathBuf,
}

impl StationMeta {
    /// Fails with `InvalidParameter` for ids that are not a plain directory name
    pub fn new(data_root: &Path, station: &str) -> Result<Self> {
        let station = station_id(station)?;
        Ok(Self {
            data_dir: data_root.join(&station),
            station,
        })
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Every month with a data file, oldest first
    pub fn date_list(&self) -> Result<Vec<YearMonth>> {
        let entries =
            fs::read_dir(&self.data_dir).map_err(|e| WeaError::file_unavailable(&self.data_dir, e))?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_valid_filename(name, &self.station) {
                dates.push(year_month_from_filename(Path::new(name))?);
            }
        }
        dates.sort();

        debug!(
            station = %self.station,
            months = dates.len(),
            "Listed station months"
        );
        Ok(dates)
    }

    /// Newest month with data
    pub fn latest_year_month(&self) -> Result<Option<YearMonth>> {
        Ok(self.date_list()?.last().copied())
    }

    /// Last calendar day of the newest month with data
    pub fn latest_month(&self) -> Result<Option<NaiveDate>> {
        let Some(ym) = self.latest_year_month()? else {
            return Ok(None);
        };
        let last_day = ym.days()?;
        Ok(NaiveDate::from_ymd_opt(ym.year, ym.month, last_day))
    }
}
