//! Anomalies relative to the annual cycle, and their seasonal statistics.

use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::annual_cycle::{HarmonicTable, Variable, calc_for_grid};
use super::stats;
use crate::geometry::calc_dist_offset;
use crate::lines::Line;
use crate::model::{COL_LAT, COL_LON, GridTable, Result};

/// Name of the climatology column stored for `column`.
pub fn annual_column(column: &str) -> String {
    format!("ann_{}", column)
}

/// Name of the anomaly column stored for `column`.
pub fn anomaly_column(column: &str) -> String {
    format!("{}a", column)
}

/// Evaluate the climatology of `variable` on every row of `table` and store
/// it as `ann_<column>`, plus the anomaly `<column>a = column - ann_<column>`.
///
/// The table must already be filled (time, lon, lat and `column`).
pub fn add_anomaly(
    table: &mut GridTable,
    line: &Line,
    column: &str,
    variable: Variable,
    harmonic: &HarmonicTable,
) -> Result<()> {
    let annual = calc_for_grid(table, line, variable, harmonic)?;
    let anomaly = table
        .column(column)?
        .iter()
        .zip(&annual)
        .map(|(v, a)| v - a)
        .collect();
    table.set_column(&annual_column(column), annual)?;
    table.set_column(&anomaly_column(column), anomaly)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Meteorological season of a calendar month (1..=12).
    pub fn from_month(month: u32) -> Season {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Season::Winter => write!(f, "Winter"),
            Season::Spring => write!(f, "Spring"),
            Season::Summer => write!(f, "Summer"),
            Season::Fall => write!(f, "Fall"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub season: Season,
    pub n: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub skew: Option<f64>,
}

/// Distribution of the `<column>a` anomaly per season, over rows no deeper
/// than `max_level` and no further than `max_dist_km` offshore.
///
/// Always returns the four seasons in DJF, MAM, JJA, SON order; a season
/// with no finite anomalies has `n == 0` and no moments.
pub fn seasonal_summary(
    table: &GridTable,
    line: &Line,
    column: &str,
    max_level: usize,
    max_dist_km: f64,
) -> Result<Vec<SeasonSummary>> {
    let anom = table.column(&anomaly_column(column))?;
    let times = table.times()?;
    let (dist, _) = calc_dist_offset(line, table.column(COL_LON)?, table.column(COL_LAT)?);

    Ok(Season::ALL
        .iter()
        .map(|&season| {
            let values: Vec<f64> = (0..table.len())
                .filter(|&i| {
                    table.depth[i] <= max_level
                        && dist[i] <= max_dist_km
                        && Season::from_month(times[i].month()) == season
                        && anom[i].is_finite()
                })
                .map(|i| anom[i])
                .collect();
            SeasonSummary {
                season,
                n: values.len(),
                mean: stats::mean(&values),
                std: stats::std(&values),
                skew: stats::skew(&values),
            }
        })
        .collect())
}
