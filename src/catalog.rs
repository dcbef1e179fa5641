//! Element metadata and linear unit conversions.
//!
//! The catalog is loaded once at start-up from three comma-separated tables
//! and is read-only afterwards, so it is shared between requests behind an
//! `Arc` without locking.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, WeaError};

/// Selector for the on-disk unit system
pub const NATIVE_SYSTEM: &str = "N";

/// Decimal places used when an element has no recognised format code
pub const DEFAULT_DECIMALS: usize = 6;

/// Unit system requested by a caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum UnitSystem {
    /// Values exactly as stored
    #[default]
    Native,
    /// A named target system such as "M" or "E"
    Named(String),
}

impl UnitSystem {
    /// Parse a selector; empty or "N" means native
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if selector.is_empty() || selector.eq_ignore_ascii_case(NATIVE_SYSTEM) {
            UnitSystem::Native
        } else {
            UnitSystem::Named(selector.to_string())
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, UnitSystem::Native)
    }

    pub fn label(&self) -> &str {
        match self {
            UnitSystem::Native => NATIVE_SYSTEM,
            UnitSystem::Named(name) => name,
        }
    }
}

/// How an element's values are rendered for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayFormat {
    pub decimals: usize,
}

impl DisplayFormat {
    /// Map a catalog format code to a display format
    pub fn from_code(code: i32) -> Self {
        let decimals = match code {
            2 | 4 | 6 | 9 => 0,
            3 | 5 => 1,
            1 | 8 => 2,
            7 | 10 => 3,
            _ => DEFAULT_DECIMALS,
        };
        Self { decimals }
    }

    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals, value)
    }
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
        }
    }
}

/// Descriptive metadata for one element code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementMetadata {
    pub name: String,
    /// Native unit label, if known
    pub units: Option<String>,
    pub format: DisplayFormat,
    pub scaling_max: Option<f64>,
    pub scaling_min: Option<f64>,
}

impl Default for ElementMetadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            units: None,
            format: DisplayFormat::default(),
            scaling_max: None,
            scaling_min: None,
        }
    }
}

/// A linear conversion `value * multiplier + offset` into `units`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionEntry {
    pub multiplier: f64,
    pub offset: f64,
    pub units: String,
}

impl ConversionEntry {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.multiplier + self.offset
    }
}

/// Element and conversion tables
#[derive(Debug, Clone, Default)]
pub struct ElementCatalog {
    elements: HashMap<String, ElementMetadata>,
    conversions: HashMap<(String, String), ConversionEntry>,
}

impl ElementCatalog {
    /// An empty catalog: every element is unknown and nothing converts
    pub fn new() -> Self {
        Self::default()
    }

    /// Load whichever of the three tables are configured
    pub fn load(
        elements: Option<&Path>,
        wea_elements: Option<&Path>,
        conversions: Option<&Path>,
    ) -> Result<Self> {
        let mut catalog = Self::new();
        if let Some(path) = elements {
            catalog.parse_elements(&read_table(path)?)?;
        }
        if let Some(path) = wea_elements {
            catalog.parse_wea_elements(&read_table(path)?);
        }
        if let Some(path) = conversions {
            catalog.parse_conversions(&read_table(path)?)?;
        }

        info!(
            operation = "catalog_load",
            elements = catalog.elements.len(),
            conversions = catalog.conversions.len(),
            "Element catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse `pcode, "name", scale_max, scale_min, unused, fmt` lines
    pub fn parse_elements(&mut self, content: &str) -> Result<()> {
        for line in data_lines(content) {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 6 {
                return Err(WeaError::Catalog {
                    message: format!("expected 6 fields in elements line: {}", line),
                });
            }
            let scaling_max = parse_number(fields[2], line)?;
            let scaling_min = parse_number(fields[3], line)?;
            let format = fields[5]
                .parse::<i32>()
                .map(DisplayFormat::from_code)
                .unwrap_or_default();

            let entry = self.elements.entry(fields[0].to_string()).or_default();
            entry.name = fields[1].trim_matches('"').trim().to_string();
            entry.scaling_max = Some(scaling_max);
            entry.scaling_min = Some(scaling_min);
            entry.format = format;
        }
        Ok(())
    }

    /// Parse `pcode, units, desc1, desc2, long description` lines.
    ///
    /// These supplement units and replace names; malformed lines are skipped.
    pub fn parse_wea_elements(&mut self, content: &str) {
        for line in data_lines(content) {
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 5 {
                debug!(line = line, "Skipping malformed wea_elements line");
                continue;
            }
            let entry = self.elements.entry(fields[0].trim().to_string()).or_default();
            entry.units = Some(fields[1].trim().to_string()).filter(|u| !u.is_empty());
            entry.name = fields[4].to_string();
        }
    }

    /// Parse `system, from_unit, to_unit, multiplier, offset` lines
    pub fn parse_conversions(&mut self, content: &str) -> Result<()> {
        for line in data_lines(content) {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 5 {
                return Err(WeaError::Catalog {
                    message: format!("expected 5 fields in conversions line: {}", line),
                });
            }
            self.insert_conversion(
                fields[1],
                fields[0],
                ConversionEntry {
                    multiplier: parse_number(fields[3], line)?,
                    offset: parse_number(fields[4], line)?,
                    units: fields[2].to_string(),
                },
            );
        }
        Ok(())
    }

    pub fn insert_element(&mut self, code: impl Into<String>, element: ElementMetadata) {
        self.elements.insert(code.into(), element);
    }

    /// Register a conversion from `units` into `system`
    pub fn insert_conversion(&mut self, units: &str, system: &str, entry: ConversionEntry) {
        self.conversions
            .insert((units.to_string(), system.to_string()), entry);
    }

    pub fn lookup_element(&self, code: &str) -> Option<&ElementMetadata> {
        self.elements.get(code)
    }

    /// Conversion for values in `units` into `system`; absent means "leave as is"
    pub fn lookup_conversion(&self, units: &str, system: &str) -> Option<&ConversionEntry> {
        self.conversions.get(&(units.to_string(), system.to_string()))
    }

    /// Native unit of `code` and the conversion into `system`, if any
    pub fn conversion_for(
        &self,
        code: &str,
        system: &UnitSystem,
    ) -> (Option<&str>, Option<&ConversionEntry>) {
        let units = self.lookup_element(code).and_then(|e| e.units.as_deref());
        let conversion = match (units, system) {
            (Some(units), UnitSystem::Named(name)) => self.lookup_conversion(units, name),
            _ => None,
        };
        (units, conversion)
    }

    /// Unit label `code` is reported in under `system`
    pub fn unit_for(&self, code: &str, system: &UnitSystem) -> Option<String> {
        match self.conversion_for(code, system) {
            (_, Some(conversion)) => Some(conversion.units.clone()),
            (units, None) => units.map(str::to_string),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn read_table(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Unable to read catalog table");
        WeaError::Catalog {
            message: format!("{}: {}", path.display(), e),
        }
    })
}

/// Lines after the header, trimmed, skipping blanks
fn data_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn parse_number(field: &str, line: &str) -> Result<f64> {
    field.parse().map_err(|_| WeaError::Catalog {
        message: format!("invalid number {:?} in line: {}", field, line),
    })
}
