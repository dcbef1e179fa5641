//! Decoder for a single monthly `.wea` observation file.
//!
//! A file is a fixed little-endian header followed by a row-major block of
//! 32-bit floats, one row per observation and one column per element code.
//! Files are memory-mapped by default so months that are opened but barely
//! read never get materialized.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::{s, Array1, Array2};
use serde::Serialize;

use crate::calendar::{year_month_from_filename, YearMonth};
use crate::error::{Result, WeaError};
use crate::logging::log_file_open_stats;

/// Default value at or above which an observation counts as missing
pub const DEFAULT_MISSING_SENTINEL: f32 = 1.0e7;

/// Bytes in the header before the element-code table
pub const FIXED_HEADER_BYTES: usize = 2 + 4 + 2 + 2 + 2 + 2 + 16;

/// Characters per element code
pub const PCODE_LEN: usize = 3;

/// Columns holding day-of-year and time-of-day rather than observations
pub const TIMESTAMP_COLUMNS: usize = 2;

const VALUE_BYTES: usize = 4;

/// Sampling factors for each supported observation interval
const SAMPLING_FACTORS: [(u32, (u32, u32)); 11] = [
    (1440, (1, 24)),
    (360, (1, 6)),
    (240, (1, 4)),
    (60, (1, 1)),
    (30, (2, 1)),
    (20, (3, 1)),
    (15, (4, 1)),
    (10, (6, 1)),
    (5, (12, 1)),
    (2, (30, 1)),
    (1, (60, 1)),
];

/// Look up `(fac1, fac2)` for an observation interval in minutes
pub fn sampling_factors(oi: u32) -> Option<(u32, u32)> {
    SAMPLING_FACTORS
        .iter()
        .find(|(interval, _)| *interval == oi)
        .map(|(_, factors)| *factors)
}

/// Whether a stored value denotes "no observation"
pub fn is_missing(value: f32, sentinel: f32) -> bool {
    // NaN compares false, so it is treated as missing too
    !(value < sentinel)
}

/// Parsed file header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    /// Leading flag word
    pub tr: i16,
    /// Total minutes as stored on disk; never used for layout
    pub stored_minutes: f32,
    /// Total minutes in the file's month, recomputed from the calendar
    pub pr: u32,
    /// Observation interval in minutes
    pub oi: u32,
    /// Number of elements (columns)
    pub ne: usize,
    /// Rain gauge type
    pub rgt: i16,
    /// Wind sensor height
    pub wsh: i16,
    /// Element codes in column order
    pub pcodes: Vec<String>,
    pub fac1: u32,
    pub fac2: u32,
}

impl Header {
    /// Parse a header from `reader`, recomputing `pr` from `year_month`
    pub fn read_from<R: Read>(reader: &mut R, year_month: YearMonth, path: &Path) -> Result<Self> {
        let truncated = |_: std::io::Error| WeaError::MalformedFile {
            path: path.to_path_buf(),
            message: "header is truncated".to_string(),
        };

        let tr = reader.read_i16::<LittleEndian>().map_err(truncated)?;
        let stored_minutes = reader.read_f32::<LittleEndian>().map_err(truncated)?;
        let raw_oi = reader.read_i16::<LittleEndian>().map_err(truncated)?;
        let raw_ne = reader.read_i16::<LittleEndian>().map_err(truncated)?;
        let rgt = reader.read_i16::<LittleEndian>().map_err(truncated)?;
        let wsh = reader.read_i16::<LittleEndian>().map_err(truncated)?;
        let mut reserved = [0u8; 16];
        reader.read_exact(&mut reserved).map_err(truncated)?;

        let oi = u32::try_from(raw_oi).ok().filter(|oi| *oi > 0);
        let (oi, (fac1, fac2)) = match oi.and_then(|oi| sampling_factors(oi).map(|f| (oi, f))) {
            Some(found) => found,
            None => {
                return Err(WeaError::UnsupportedSamplingInterval {
                    path: path.to_path_buf(),
                    oi: raw_oi,
                })
            }
        };

        let ne = usize::try_from(raw_ne).map_err(|_| WeaError::MalformedFile {
            path: path.to_path_buf(),
            message: format!("negative element count {}", raw_ne),
        })?;

        let mut table = vec![0u8; ne * PCODE_LEN];
        reader.read_exact(&mut table).map_err(truncated)?;
        let pcodes = table
            .chunks(PCODE_LEN)
            .map(|code| code.iter().map(|&b| b as char).collect::<String>())
            .collect();

        let pr = year_month.minutes()?;
        if pr % oi != 0 {
            return Err(WeaError::MalformedFile {
                path: path.to_path_buf(),
                message: format!("{} minutes do not divide into {}-minute records", pr, oi),
            });
        }

        Ok(Self {
            tr,
            stored_minutes,
            pr,
            oi,
            ne,
            rgt,
            wsh,
            pcodes,
            fac1,
            fac2,
        })
    }

    /// Number of records in the file
    pub fn rows(&self) -> usize {
        (self.pr / self.oi) as usize
    }

    /// Byte offset where the data block begins
    pub fn data_offset(&self) -> usize {
        FIXED_HEADER_BYTES + self.ne * PCODE_LEN
    }

    /// Bytes occupied by the data block
    pub fn data_len(&self) -> usize {
        self.rows() * self.ne * VALUE_BYTES
    }

    /// Column holding `code`, if present
    pub fn column_index(&self, code: &str) -> Option<usize> {
        self.pcodes.iter().position(|p| p == code)
    }
}

/// Where a file's data matrix lives
#[derive(Debug)]
enum DataSource {
    /// Mapped read-only; values decoded on access
    Mapped(Mmap),
    /// Fully decoded into memory
    Loaded(Array2<f32>),
}

/// The most recent record in a file with no missing observations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestRecord {
    /// Row index within the file
    pub row: usize,
    /// Every element of the row keyed by code
    pub values: BTreeMap<String, f32>,
}

/// One opened monthly observation file
#[derive(Debug)]
pub struct WeaFile {
    path: PathBuf,
    year_month: YearMonth,
    header: Header,
    source: DataSource,
}

impl WeaFile {
    /// Open a file with memory-mapped data access
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let year_month = year_month_from_filename(path)?;
        let file = File::open(path).map_err(|e| WeaError::file_unavailable(path, e))?;

        // SAFETY: files are treated as immutable for the lifetime of a query
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| WeaError::file_unavailable(path, e))?;
        let header = Header::read_from(&mut &mmap[..], year_month, path)?;

        let required = header.data_offset() + header.data_len();
        if mmap.len() < required {
            return Err(WeaError::MalformedFile {
                path: path.to_path_buf(),
                message: format!("expected at least {} bytes, found {}", required, mmap.len()),
            });
        }

        log_file_open_stats(path, &header, "mapped");

        Ok(Self {
            path: path.to_path_buf(),
            year_month,
            header,
            source: DataSource::Mapped(mmap),
        })
    }

    /// Open a file and decode its entire data matrix up front
    pub fn open_eager(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let year_month = year_month_from_filename(path)?;
        let file = File::open(path).map_err(|e| WeaError::file_unavailable(path, e))?;
        let mut reader = BufReader::new(file);
        let header = Header::read_from(&mut reader, year_month, path)?;

        let mut values = vec![0f32; header.rows() * header.ne];
        reader
            .read_f32_into::<LittleEndian>(&mut values)
            .map_err(|e| WeaError::MalformedFile {
                path: path.to_path_buf(),
                message: format!("data block is truncated: {}", e),
            })?;
        let data = Array2::from_shape_vec((header.rows(), header.ne), values).map_err(|e| {
            WeaError::MalformedFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        log_file_open_stats(path, &header, "eager");

        Ok(Self {
            path: path.to_path_buf(),
            year_month,
            header,
            source: DataSource::Loaded(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The calendar month this file covers
    pub fn year_month(&self) -> YearMonth {
        self.year_month
    }

    pub fn rows(&self) -> usize {
        self.header.rows()
    }

    /// Resolve `code` to its column, naming this file when it is absent
    pub fn column_index(&self, code: &str) -> Result<usize> {
        self.header
            .column_index(code)
            .ok_or_else(|| WeaError::UnknownVariable {
                file: self.path.clone(),
                code: code.to_string(),
            })
    }

    /// A single value; callers keep `row` and `col` in bounds
    fn value(&self, row: usize, col: usize) -> f32 {
        match &self.source {
            DataSource::Mapped(mmap) => {
                let offset = self.header.data_offset() + (row * self.header.ne + col) * VALUE_BYTES;
                LittleEndian::read_f32(&mmap[offset..offset + VALUE_BYTES])
            }
            DataSource::Loaded(data) => data[[row, col]],
        }
    }

    /// Rows `range` of column `col`, clipped to the rows the file holds
    pub fn column_slice(&self, col: usize, range: RangeInclusive<usize>) -> Array1<f32> {
        let rows = self.rows();
        let (start, end) = range.into_inner();
        if col >= self.header.ne || rows == 0 || start > end || start >= rows {
            return Array1::zeros(0);
        }
        let end = end.min(rows - 1);

        match &self.source {
            DataSource::Loaded(data) => data.slice(s![start..=end, col]).to_owned(),
            DataSource::Mapped(_) => (start..=end).map(|row| self.value(row, col)).collect(),
        }
    }

    /// Every value of element `code`
    pub fn column(&self, code: &str) -> Result<Array1<f32>> {
        let col = self.column_index(code)?;
        Ok(self.column_slice(col, 0..=self.rows().saturating_sub(1)))
    }

    /// One full record
    pub fn row(&self, row: usize) -> Array1<f32> {
        (0..self.header.ne).map(|col| self.value(row, col)).collect()
    }

    /// Scan from the newest record backwards for one with every observation
    /// strictly below `missing_sentinel`, ignoring the day/time columns.
    pub fn latest_valid_record(&self, missing_sentinel: f32) -> Result<LatestRecord> {
        let ne = self.header.ne;
        for row in (0..self.rows()).rev() {
            let complete =
                (TIMESTAMP_COLUMNS..ne).all(|col| !is_missing(self.value(row, col), missing_sentinel));
            if complete {
                let values = self
                    .header
                    .pcodes
                    .iter()
                    .enumerate()
                    .map(|(col, code)| (code.clone(), self.value(row, col)))
                    .collect();
                return Ok(LatestRecord { row, values });
            }
        }

        Err(WeaError::NoValidRecord {
            path: self.path.clone(),
        })
    }
}

/// Write a `.wea` file for tests; values come from `value(timestamp, code)`
#[cfg(test)]
pub(crate) fn write_test_file<F>(path: &Path, oi: i16, pcodes: &[&str], value: F) -> Result<()>
where
    F: Fn(chrono::NaiveDateTime, &str) -> f32,
{
    use byteorder::WriteBytesExt;
    use std::io::Write;

    let year_month = year_month_from_filename(path)?;
    let anchor = year_month.anchor()?;
    let rows = year_month.minutes()? / oi as u32;

    let mut out = std::io::BufWriter::new(File::create(path)?);
    out.write_i16::<LittleEndian>(1)?;
    // Deliberately wrong; readers must recompute it
    out.write_f32::<LittleEndian>(-1.0)?;
    out.write_i16::<LittleEndian>(oi)?;
    out.write_i16::<LittleEndian>(pcodes.len() as i16)?;
    out.write_i16::<LittleEndian>(2)?;
    out.write_i16::<LittleEndian>(10)?;
    out.write_all(&[0u8; 16])?;
    for code in pcodes {
        out.write_all(code.as_bytes())?;
    }
    for row in 0..rows {
        let ts = anchor + chrono::Duration::minutes((row * oi as u32) as i64);
        for code in pcodes {
            out.write_f32::<LittleEndian>(value(ts, code))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Day-of-year / time-of-day columns for a timestamp, as stored on disk
#[cfg(test)]
pub(crate) fn test_day_time(ts: chrono::NaiveDateTime, code: &str) -> Option<f32> {
    use chrono::{Datelike, Timelike};
    match code {
        "DAY" => Some(ts.ordinal() as f32),
        "TIM" => Some((ts.hour() * 100 + ts.minute()) as f32),
        _ => None,
    }
}
