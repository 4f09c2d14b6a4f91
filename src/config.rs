//! Run configuration.
//!
//! All data locations and analysis cut-offs live in one `CugnConfig` value
//! that is passed explicitly to the I/O and analysis entry points. It is
//! read from a TOML file, or from the environment (`CUGN` names the data
//! directory, `.env` files are honoured) when no file is given.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::lines::Line;
use crate::logging::LogLevel;
use crate::model::{COL_CHLA, COL_N, COL_OC, CugnError, Result};

/// Environment variable naming the data directory.
pub const DATA_PATH_ENV: &str = "CUGN";

/// DBSCAN parameters for grouping extrema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    /// Neighbourhood radius in scaled units (km-equivalent).
    pub eps: f64,
    pub min_samples: usize,
    /// Multiplier applied to elapsed days.
    pub time_scale: f64,
    /// Divisor applied to depth in metres.
    pub z_scale: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 3.0,
            min_samples: 1,
            time_scale: 3.0,
            z_scale: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CugnConfig {
    /// Directory holding datasets, grid tables and annual-cycle tables.
    pub data_path: PathBuf,
    /// Profiles further than this from the line (km) are dropped before gridding.
    pub max_offset_km: f64,
    /// Grid cells need strictly more samples than this for the control grid.
    pub min_counts: usize,
    /// Deepest level (inclusive) considered for low-saturation extrema.
    pub shallow_level_max: usize,
    pub high_so: f64,
    pub low_so: f64,
    /// Percentile pre-filter for `high` extrema.
    pub high_perc: f64,
    /// Percentile pre-filter for `low` extrema.
    pub low_perc: f64,
    /// Columns whose cell-local percentiles are joined onto extrema.
    pub feature_columns: Vec<String>,
    /// Oxygen-solubility variable of the raw dataset, used for `SO`.
    pub solubility_column: String,
    pub clusters: ClusterParams,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for CugnConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("."),
            max_offset_km: 90.0,
            min_counts: 50,
            shallow_level_max: 1,
            high_so: 1.1,
            low_so: 0.9,
            high_perc: 80.0,
            low_perc: 49.0,
            feature_columns: vec![COL_N.to_string(), COL_CHLA.to_string()],
            solubility_column: COL_OC.to_string(),
            clusters: ClusterParams::default(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// File locations for one line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFiles {
    /// Raw dataset, before `SO`/`N` are derived.
    pub rawfile: PathBuf,
    /// Processed ("potential") dataset read by the gridder.
    pub datafile: PathBuf,
    pub gridtbl_file_full: PathBuf,
    pub gridtbl_file_control: PathBuf,
    pub edges_file: PathBuf,
    pub anncyc_file: PathBuf,
}

impl CugnConfig {
    /// Parse a TOML configuration string. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Defaults with `data_path` taken from `CUGN` (after loading `.env`).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let data_path = std::env::var(DATA_PATH_ENV).map_err(|_| {
            CugnError::InvalidArgument(format!("{} must be set to the data directory", DATA_PATH_ENV))
        })?;
        Ok(Self {
            data_path: PathBuf::from(data_path),
            ..Self::default()
        })
    }

    pub fn log_level(&self) -> Result<LogLevel> {
        self.log_level.parse()
    }

    pub fn line_files(&self, line: &Line) -> LineFiles {
        let tag = line.file_tag();
        let root = &self.data_path;
        LineFiles {
            rawfile: root.join(format!("CUGN_line_{}.json", tag)),
            datafile: root.join(format!("CUGN_potential_line_{}.json", tag)),
            gridtbl_file_full: root.join(format!("full_grid_line{}.json", tag)),
            gridtbl_file_control: root.join(format!("doxy_grid_line{}.json", tag)),
            edges_file: root.join(format!("doxy_edges_line{}.json", tag)),
            anncyc_file: root.join(format!("anncyc{}.json", line.anncyc_tag())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::line;

    #[test]
    fn test_defaults_match_published_cuts() {
        let cfg = CugnConfig::default();
        assert_eq!(cfg.max_offset_km, 90.0);
        assert_eq!(cfg.min_counts, 50);
        assert_eq!(cfg.high_so, 1.1);
        assert_eq!(cfg.low_so, 0.9);
        assert_eq!(cfg.feature_columns, vec!["N", "chla"]);
        assert_eq!(cfg.solubility_column, "OC");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = CugnConfig::from_toml_str(
            r#"
            data_path = "/data/cugn"
            min_counts = 0

            [clusters]
            eps = 5.0
            "#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.data_path, PathBuf::from("/data/cugn"));
        assert_eq!(cfg.min_counts, 0);
        assert_eq!(cfg.clusters.eps, 5.0);
        assert_eq!(cfg.clusters.min_samples, 1, "unset cluster keys keep defaults");
        assert_eq!(cfg.max_offset_km, 90.0);
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let err = CugnConfig::from_toml_str("min_counts = \"many\"").unwrap_err();
        assert!(matches!(err, CugnError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn test_line_files_use_two_character_tag() {
        let cfg = CugnConfig {
            data_path: PathBuf::from("/data"),
            ..Default::default()
        };
        let files = cfg.line_files(line("66.7").unwrap());
        assert_eq!(files.rawfile, PathBuf::from("/data/CUGN_line_66.json"));
        assert_eq!(files.datafile, PathBuf::from("/data/CUGN_potential_line_66.json"));
        assert_eq!(files.gridtbl_file_control, PathBuf::from("/data/doxy_grid_line66.json"));
        assert_eq!(files.anncyc_file, PathBuf::from("/data/anncyc66.json"));
    }

    #[test]
    fn test_log_level_string_is_validated() {
        let cfg = CugnConfig {
            log_level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(cfg.log_level().is_err());
    }
}
