/// Core data types for the CUGN gridding and extrema pipeline.
///
/// This module defines the shared table model and error type imported by
/// all other modules. Apart from column bookkeeping on `GridTable` it holds
/// no analysis logic and no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Dissolved oxygen (umol/kg), the variable gridded by default.
pub const COL_DOXY: &str = "doxy";

/// Oxygen saturation, `doxy / O2sol`.
pub const COL_SO: &str = "SO";

/// Buoyancy frequency in cycles per hour.
pub const COL_N: &str = "N";

/// Oxygen solubility (umol/kg), supplied with the raw dataset.
pub const COL_OC: &str = "OC";

/// Potential density anomaly (kg/m^3).
pub const COL_SIGMA0: &str = "sigma0";

/// Chlorophyll-a fluorescence.
pub const COL_CHLA: &str = "chla";

/// Sample depth in metres, filled from the dataset's depth levels.
pub const COL_Z: &str = "z";

pub const COL_LON: &str = "lon";
pub const COL_LAT: &str = "lat";

/// Suffix appended to a column name by percentile annotation.
pub const PERCENTILE_SUFFIX: &str = "_p";

// ---------------------------------------------------------------------------
// Grid table
// ---------------------------------------------------------------------------

/// Flat table mapping every retained sample to its grid cell.
///
/// One row per (depth level, profile) sample. The fixed fields are always
/// present and equal in length; `time` stays empty until the table has been
/// filled from a dataset (see `analysis::grid::fill_in_grid`). Numeric
/// columns such as `doxy`, `doxy_p`, `SO` or `lon` live in `columns` and are
/// added in place as the pipeline runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridTable {
    /// Depth level index into the dataset's depth axis (0 = 10 m).
    pub depth: Vec<usize>,
    /// Profile identifier as stored in the dataset.
    pub profile: Vec<i64>,
    /// 0-based grid row (x-axis bin).
    pub row: Vec<usize>,
    /// 0-based grid column (y-axis bin).
    pub col: Vec<usize>,
    /// Profile timestamp per row; empty until filled.
    #[serde(default)]
    pub time: Vec<DateTime<Utc>>,
    #[serde(default, with = "crate::ingest::nan_null::columns")]
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl GridTable {
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Borrow a numeric column, failing with `MissingColumn` if absent.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| CugnError::MissingColumn(name.to_string()))
    }

    /// Insert or replace a numeric column. The column must be row-aligned.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(CugnError::ShapeMismatch(format!(
                "column '{}' has {} values for a table of {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Row timestamps, failing if the table has not been filled yet.
    pub fn times(&self) -> Result<&[DateTime<Utc>]> {
        if self.time.len() != self.len() {
            return Err(CugnError::MissingColumn("time".to_string()));
        }
        Ok(&self.time)
    }

    /// New table holding the given rows, in the given order, with every
    /// column carried along.
    pub fn take(&self, rows: &[usize]) -> GridTable {
        let pick_usize = |v: &[usize]| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
        GridTable {
            depth: pick_usize(&self.depth),
            profile: rows.iter().map(|&i| self.profile[i]).collect(),
            row: pick_usize(&self.row),
            col: pick_usize(&self.col),
            time: if self.time.len() == self.len() {
                rows.iter().map(|&i| self.time[i]).collect()
            } else {
                Vec::new()
            },
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), rows.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> GridTable {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &keep)| keep)
            .map(|(i, _)| i)
            .collect();
        self.take(&rows)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised anywhere in the gridding / annual-cycle / extrema pipeline.
#[derive(Debug, Error)]
pub enum CugnError {
    /// Unknown variable, mode or statistic key, or an unusable parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Line label not present in `lines::LINE_REGISTRY`.
    #[error("unknown line: {0}")]
    UnknownLine(String),
    /// Harmonic coefficient table violates its shape invariants.
    #[error("malformed harmonic table: {0}")]
    MalformedTable(String),
    /// NaN or infinite evaluation input.
    #[error("non-finite {what} at index {index}")]
    NonFiniteInput { what: &'static str, index: usize },
    #[error("depth level {level} outside harmonic table with {levels} levels")]
    LevelOutOfRange { level: usize, levels: usize },
    #[error("missing column: {0}")]
    MissingColumn(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// Duplicate, missing or non-injective join keys.
    #[error("join integrity check failed: {0}")]
    JoinIntegrity(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A file body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for CugnError {
    fn from(e: serde_json::Error) -> Self {
        CugnError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for CugnError {
    fn from(e: toml::de::Error) -> Self {
        CugnError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CugnError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
