/// Oxygen-saturation extrema and their grouping into events.
///
/// Submodules:
/// - `join`: injective composite-key join back onto the full grid table.
/// - `clusters`: DBSCAN grouping and per-cluster statistics.
///
/// The entry point is `select_extrema`, which takes a filled grid table
/// (see `analysis::grid::fill_in_grid`) and returns the extrema rows with
/// feature percentiles, calendar fields, line geometry and cluster labels
/// attached.

pub mod clusters;
pub mod join;

use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::analysis::percentile::find_perc;
use crate::config::CugnConfig;
use crate::geometry::calc_dist_offset;
use crate::lines::Line;
use crate::logging::{self, Stage};
use crate::model::{
    COL_DOXY, COL_LAT, COL_LON, COL_SO, CugnError, GridTable, PERCENTILE_SUFFIX, Result,
};

use clusters::{COL_DIST, ClusterStats};

pub const COL_YEAR: &str = "year";
pub const COL_DOY: &str = "doy";
pub const COL_OFFSET: &str = "offset";
pub const COL_CLUSTER: &str = "cluster";

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// Which tail of the saturation distribution to pull out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremaMode {
    /// Supersaturated samples from the upper-percentile population.
    High,
    /// Shallow undersaturated samples from the lower-percentile population.
    Low,
    /// `Low` thresholds applied to the whole table.
    LowNoPerc,
    /// `High` thresholds applied to the whole table.
    HiNoPerc,
}

impl ExtremaMode {
    pub fn key(self) -> &'static str {
        match self {
            ExtremaMode::High => "high",
            ExtremaMode::Low => "low",
            ExtremaMode::LowNoPerc => "low_noperc",
            ExtremaMode::HiNoPerc => "hi_noperc",
        }
    }

    /// Percentile pre-filter, or `None` when the whole table is used.
    pub fn prefilter(self, cfg: &CugnConfig) -> Option<f64> {
        match self {
            ExtremaMode::High => Some(cfg.high_perc),
            ExtremaMode::Low => Some(cfg.low_perc),
            ExtremaMode::LowNoPerc | ExtremaMode::HiNoPerc => None,
        }
    }

    fn is_high(self) -> bool {
        matches!(self, ExtremaMode::High | ExtremaMode::HiNoPerc)
    }
}

impl FromStr for ExtremaMode {
    type Err = CugnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high" => Ok(ExtremaMode::High),
            "low" => Ok(ExtremaMode::Low),
            "low_noperc" => Ok(ExtremaMode::LowNoPerc),
            "hi_noperc" => Ok(ExtremaMode::HiNoPerc),
            other => Err(CugnError::InvalidArgument(format!(
                "unknown extremum mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExtremaMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Rows whose cell-local oxygen percentile is beyond `perc`.
///
/// Above 50 the upper tail is kept (`doxy_p > perc`), otherwise the lower
/// tail (`doxy_p < perc`).
pub fn gen_outliers(table: &GridTable, perc: f64) -> Result<GridTable> {
    if !(0.0..=100.0).contains(&perc) {
        return Err(CugnError::InvalidArgument(format!(
            "percentile {} outside [0, 100]",
            perc
        )));
    }
    let p = table.column(&format!("{}{}", COL_DOXY, PERCENTILE_SUFFIX))?;
    let keep: Vec<bool> = if perc > 50.0 {
        p.iter().map(|&v| v > perc).collect()
    } else {
        p.iter().map(|&v| v < perc).collect()
    };
    Ok(table.filter(&keep))
}

/// Extrema of one line, ready for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtremaSet {
    pub mode: ExtremaMode,
    pub table: GridTable,
    /// Cluster label per row of `table`; `clusters::NOISE` for none.
    pub labels: Vec<i64>,
    pub clusters: Vec<ClusterStats>,
}

/// Select the saturation extrema of a filled grid table.
///
/// `grid_tbl` gains a `<feature>_p` column for every configured feature
/// column; those percentiles are joined onto the extrema by
/// `depth * 100000 + profile`, which must match every extremum exactly once.
pub fn select_extrema(
    grid_tbl: &mut GridTable,
    line: &Line,
    mode: ExtremaMode,
    cfg: &CugnConfig,
) -> Result<ExtremaSet> {
    let population = match mode.prefilter(cfg) {
        Some(perc) => gen_outliers(grid_tbl, perc)?,
        None => grid_tbl.clone(),
    };

    let so = population.column(COL_SO)?;
    let extrem: Vec<bool> = if mode.is_high() {
        so.iter().map(|&v| v > cfg.high_so).collect()
    } else {
        so.iter()
            .zip(&population.depth)
            .map(|(&v, &d)| v < cfg.low_so && d <= cfg.shallow_level_max)
            .collect()
    };
    let mut table = population.filter(&extrem);

    for feature in &cfg.feature_columns {
        find_perc(grid_tbl, feature)?;
    }
    let ids = join::match_ids(&join::table_keys(&table)?, &join::table_keys(grid_tbl)?)?;
    for feature in &cfg.feature_columns {
        let name = format!("{}{}", feature, PERCENTILE_SUFFIX);
        let full = grid_tbl.column(&name)?;
        let joined = ids.iter().map(|&i| full[i]).collect();
        table.set_column(&name, joined)?;
    }

    let times = table.times()?;
    let year = times.iter().map(|t| f64::from(t.year())).collect();
    let doy = times.iter().map(|t| f64::from(t.ordinal())).collect();
    table.set_column(COL_YEAR, year)?;
    table.set_column(COL_DOY, doy)?;

    let (dist, offset) = calc_dist_offset(line, table.column(COL_LON)?, table.column(COL_LAT)?);
    table.set_column(COL_DIST, dist)?;
    table.set_column(COL_OFFSET, offset)?;

    let labels = clusters::generate_clusters(&table, &cfg.clusters)?;
    table.set_column(COL_CLUSTER, labels.iter().map(|&l| l as f64).collect())?;
    let cluster_stats = clusters::cluster_stats(&table, &labels)?;

    logging::info(
        Stage::Extrema,
        Some(line.label),
        &format!(
            "Selected {} '{}' extrema from {} candidates ({} grid rows)",
            table.len(),
            mode,
            population.len(),
            grid_tbl.len()
        ),
    );
    logging::info(
        Stage::Cluster,
        Some(line.label),
        &format!("Grouped extrema into {} clusters", cluster_stats.len()),
    );

    Ok(ExtremaSet {
        mode,
        table,
        labels,
        clusters: cluster_stats,
    })
}
