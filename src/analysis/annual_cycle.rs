//! Harmonic annual-cycle climatology.
//!
//! A `HarmonicTable` holds, per variable, harmonic fits
//! `constant + sum_k (sin_k sin(k phi) + cos_k cos(k phi))` for every depth
//! level and cross-shelf distance bin. Between two bin centres the
//! climatology is the distance-weighted blend of the two neighbouring
//! fits, each evaluated at the same phase; outside the outermost centres
//! the nearest fit is used unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, Array3, s};
use serde::{Deserialize, Serialize};

use crate::geometry::calc_dist_offset;
use crate::lines::Line;
use crate::logging::{self, Stage};
use crate::model::{COL_LAT, COL_LON, CugnError, GridTable, Result};

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const DAYS_PER_YEAR: f64 = 365.25;

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// Physical quantities with a fitted annual cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Variable {
    Temperature,
    Salinity,
    Fluorescence,
    /// Dissolved oxygen, umol/kg.
    OxygenUmolKg,
    /// Saturated oxygen.
    OxygenSaturated,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Temperature,
        Variable::Salinity,
        Variable::Fluorescence,
        Variable::OxygenUmolKg,
        Variable::OxygenSaturated,
    ];

    /// Short key used in table files and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            Variable::Temperature => "t",
            Variable::Salinity => "s",
            Variable::Fluorescence => "fl",
            Variable::OxygenUmolKg => "oxumolkg",
            Variable::OxygenSaturated => "ox",
        }
    }
}

impl FromStr for Variable {
    type Err = CugnError;

    fn from_str(s: &str) -> Result<Self> {
        Variable::ALL
            .into_iter()
            .find(|v| v.key() == s)
            .ok_or_else(|| CugnError::InvalidArgument(format!("annual-cycle variable '{}'", s)))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Coefficient tables
// ---------------------------------------------------------------------------

/// Harmonic coefficients of one variable.
///
/// `constant` is `(levels, bins)`; `sin` and `cos` are
/// `(levels, bins, max_harmonic)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicFit {
    constant: Array2<f64>,
    sin: Array3<f64>,
    cos: Array3<f64>,
}

impl HarmonicFit {
    pub fn new(constant: Array2<f64>, sin: Array3<f64>, cos: Array3<f64>) -> Result<Self> {
        if sin.dim() != cos.dim() {
            return Err(CugnError::MalformedTable(format!(
                "sin shape {:?} differs from cos shape {:?}",
                sin.dim(),
                cos.dim()
            )));
        }
        let (nl, nb, _) = sin.dim();
        if constant.dim() != (nl, nb) {
            return Err(CugnError::MalformedTable(format!(
                "constant shape {:?} does not match harmonics ({}, {})",
                constant.dim(),
                nl,
                nb
            )));
        }
        Ok(Self { constant, sin, cos })
    }

    pub fn n_levels(&self) -> usize {
        self.constant.nrows()
    }

    pub fn n_bins(&self) -> usize {
        self.constant.ncols()
    }

    pub fn max_harmonic(&self) -> usize {
        self.sin.dim().2
    }

    /// Fit at (`level`, `bin`) evaluated against a design row.
    fn eval_bin(&self, level: usize, bin: usize, design: &Array1<f64>) -> f64 {
        let k = self.max_harmonic();
        self.constant[[level, bin]]
            + self.sin.slice(s![level, bin, ..]).dot(&design.slice(s![1..=k]))
            + self.cos.slice(s![level, bin, ..]).dot(&design.slice(s![k + 1..]))
    }
}

/// Annual-cycle fits for every variable of a line, on shared distance bins.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicTable {
    /// Strictly increasing distance-bin centres, km from shore.
    centers: Vec<f64>,
    fits: BTreeMap<Variable, HarmonicFit>,
}

impl HarmonicTable {
    pub fn new(centers: Vec<f64>) -> Result<Self> {
        if centers.is_empty() {
            return Err(CugnError::MalformedTable("no distance bins".to_string()));
        }
        if centers.iter().any(|c| !c.is_finite()) || centers.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(CugnError::MalformedTable(
                "distance-bin centres must be finite and strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            centers,
            fits: BTreeMap::new(),
        })
    }

    /// Add (or replace) the fit for `variable`.
    pub fn insert(&mut self, variable: Variable, fit: HarmonicFit) -> Result<()> {
        if fit.n_bins() != self.centers.len() {
            return Err(CugnError::MalformedTable(format!(
                "fit for '{}' has {} distance bins, table has {}",
                variable,
                fit.n_bins(),
                self.centers.len()
            )));
        }
        self.fits.insert(variable, fit);
        Ok(())
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn fit(&self, variable: Variable) -> Result<&HarmonicFit> {
        self.fits.get(&variable).ok_or_else(|| {
            CugnError::InvalidArgument(format!("no annual cycle for '{}' in table", variable))
        })
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.fits.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Fractional-year phase of a Unix time, in radians.
pub fn phase(unix_seconds: f64) -> f64 {
    2.0 * std::f64::consts::PI * unix_seconds / (SECONDS_PER_DAY * DAYS_PER_YEAR)
}

/// `[1, sin(phi), .., sin(K phi), cos(phi), .., cos(K phi)]`
pub fn design_row(phi: f64, max_harmonic: usize) -> Array1<f64> {
    let mut g = Array1::ones(1 + 2 * max_harmonic);
    for k in 1..=max_harmonic {
        let kf = k as f64;
        g[k] = (phi * kf).sin();
        g[k + max_harmonic] = (phi * kf).cos();
    }
    g
}

/// Evaluate the climatology of `variable` at depth `level` for each
/// (time, distance) pair.
///
/// `times` are Unix seconds and `distances` km from shore. Distances at or
/// inside the first centre use the first bin alone, at or beyond the last
/// centre the last bin alone; anything between is interpolated linearly
/// between the two bracketing bin evaluations.
pub fn evaluate(
    table: &HarmonicTable,
    variable: Variable,
    level: usize,
    times: &[f64],
    distances: &[f64],
) -> Result<Vec<f64>> {
    if times.len() != distances.len() {
        return Err(CugnError::ShapeMismatch(format!(
            "{} times for {} distances",
            times.len(),
            distances.len()
        )));
    }
    let fit = table.fit(variable)?;
    if level >= fit.n_levels() {
        return Err(CugnError::LevelOutOfRange {
            level,
            levels: fit.n_levels(),
        });
    }
    if let Some(index) = times.iter().position(|t| !t.is_finite()) {
        return Err(CugnError::NonFiniteInput { what: "time", index });
    }
    if let Some(index) = distances.iter().position(|d| !d.is_finite()) {
        return Err(CugnError::NonFiniteInput { what: "distance", index });
    }

    let xc = table.centers();
    let last = xc.len() - 1;
    let k = fit.max_harmonic();

    times
        .iter()
        .zip(distances)
        .map(|(&t, &d)| -> Result<f64> {
            let g = design_row(phase(t), k);
            if d <= xc[0] {
                return Ok(fit.eval_bin(level, 0, &g));
            }
            if d >= xc[last] {
                return Ok(fit.eval_bin(level, last, &g));
            }
            // First interval whose ends straddle (or touch) d.
            let ip = (0..last)
                .find(|&i| (xc[i] - d) * (xc[i + 1] - d) <= 0.0)
                .ok_or_else(|| {
                    CugnError::MalformedTable(format!("no distance bin brackets {} km", d))
                })?;
            let dx = xc[ip + 1] - xc[ip];
            if dx <= 0.0 {
                return Err(CugnError::MalformedTable(format!(
                    "zero-width distance bin at index {}",
                    ip
                )));
            }
            let lower = fit.eval_bin(level, ip, &g);
            let upper = fit.eval_bin(level, ip + 1, &g);
            Ok((lower * (xc[ip + 1] - d) + upper * (d - xc[ip])) / dx)
        })
        .collect()
}

/// Climatology of `variable` at every row of a filled grid table, in row
/// order.
///
/// Rows are grouped by depth level; each group is evaluated at its rows'
/// Unix times and cross-shelf distances from `line`.
pub fn calc_for_grid(
    grid: &GridTable,
    line: &Line,
    variable: Variable,
    table: &HarmonicTable,
) -> Result<Vec<f64>> {
    let times = grid.times()?;
    let (dist, _) = calc_dist_offset(line, grid.column(COL_LON)?, grid.column(COL_LAT)?);
    let unix: Vec<f64> = times
        .iter()
        .map(|t| t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) * 1e-9)
        .collect();

    let mut levels: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &level) in grid.depth.iter().enumerate() {
        levels.entry(level).or_default().push(i);
    }

    let mut annual = vec![0.0; grid.len()];
    for (level, rows) in &levels {
        let t: Vec<f64> = rows.iter().map(|&i| unix[i]).collect();
        let d: Vec<f64> = rows.iter().map(|&i| dist[i]).collect();
        let vals = evaluate(table, variable, *level, &t, &d)?;
        for (&i, v) in rows.iter().zip(vals) {
            annual[i] = v;
        }
    }

    logging::debug(
        Stage::AnnualCycle,
        Some(line.label),
        &format!(
            "Evaluated '{}' climatology for {} rows over {} levels",
            variable,
            grid.len(),
            levels.len()
        ),
    );
    Ok(annual)
}
