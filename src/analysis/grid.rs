//! Gridding of glider samples onto a 2-D (axis-pair) histogram.
//!
//! Every finite `(x, y, variable)` sample of the dataset is binned by its
//! x and y axis values; the grid keeps counts and a per-cell statistic of
//! the variable. `build_grid_table` flattens the retained samples into a
//! `GridTable` of (depth, profile, row, col, value) rows.

use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::analysis::percentile::find_perc;
use crate::analysis::stats;
use crate::geometry::calc_dist_offset;
use crate::ingest::dataset::ProfileDataset;
use crate::lines::Line;
use crate::logging::{self, Stage};
use crate::model::{COL_DOXY, COL_LAT, COL_LON, COL_Z, CugnError, GridTable, Result};

/// Number of bins per axis when no explicit edges are given.
pub const DEFAULT_NBINS: usize = 50;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Per-cell statistic of the gridded variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Median,
    Std,
    Min,
    Max,
    Count,
}

impl FromStr for Statistic {
    type Err = CugnError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "std" => Ok(Statistic::Std),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "count" => Ok(Statistic::Count),
            other => Err(CugnError::InvalidArgument(format!("statistic '{}'", other))),
        }
    }
}

impl Statistic {
    fn apply(self, values: &[f64]) -> f64 {
        let out = match self {
            Statistic::Mean => stats::mean(values),
            Statistic::Median => stats::median(values),
            Statistic::Std => stats::std(values),
            Statistic::Min => values.iter().copied().reduce(f64::min),
            Statistic::Max => values.iter().copied().reduce(f64::max),
            Statistic::Count => Some(values.len() as f64),
        };
        out.unwrap_or(f64::NAN)
    }
}

/// What to grid and how.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Dataset variable on the x axis (grid rows).
    pub x_axis: String,
    /// Dataset variable on the y axis (grid columns).
    pub y_axis: String,
    pub stat: Statistic,
    pub variable: String,
    /// Explicit (x, y) bin edges; equal-width bins over the data otherwise.
    pub bins: Option<(Vec<f64>, Vec<f64>)>,
    /// Deepest level to include, in metres (inclusive).
    pub max_depth: Option<f64>,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            x_axis: "SA".to_string(),
            y_axis: "sigma0".to_string(),
            stat: Statistic::Mean,
            variable: COL_DOXY.to_string(),
            bins: None,
            max_depth: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GridResult {
    /// Statistic of the variable per cell; NaN for empty cells.
    pub stat: Array2<f64>,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Array2<usize>,
    /// Shape `(2, n_good)`: 1-based (row, col) of each good sample, in
    /// depth-major order over the good mask.
    pub grid_indices: Array2<usize>,
    /// Variable value of each good sample, same order as `grid_indices`.
    pub values: Vec<f64>,
    /// `(depth, profile)` mask of the samples that were binned.
    pub good: Array2<bool>,
}

impl GridResult {
    /// Counts normalised to a probability density over the (x, y) plane.
    pub fn pdf(&self) -> Array2<f64> {
        let total: usize = self.counts.sum();
        let dx = self.x_edges[1] - self.x_edges[0];
        let dy = self.y_edges[1] - self.y_edges[0];
        let norm = total as f64 * dx * dy;
        self.counts.mapv(|c| if norm > 0.0 { c as f64 / norm } else { 0.0 })
    }
}

/// Bin edges and counts of the control grid, kept alongside its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEdges {
    pub x_axis: String,
    pub y_axis: String,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Vec<Vec<usize>>,
    /// `GridResult::pdf` of the same grid.
    #[serde(default)]
    pub pdf: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Binning
// ---------------------------------------------------------------------------

fn validate_edges(name: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(CugnError::InvalidArgument(format!(
            "{} edges must be at least two strictly increasing values",
            name
        )));
    }
    Ok(())
}

fn linspace_edges(values: impl Iterator<Item = f64>, nbins: usize) -> Option<Vec<f64>> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() {
        return None;
    }
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let step = (hi - lo) / nbins as f64;
    let mut edges: Vec<f64> = (0..nbins).map(|i| lo + step * i as f64).collect();
    edges.push(hi);
    Some(edges)
}

/// Bin of `v`, with the last edge closed. `None` outside the edges.
fn bin_index(edges: &[f64], v: f64) -> Option<usize> {
    let last = *edges.last()?;
    if !(v >= edges[0] && v <= last) {
        return None;
    }
    if v == last {
        return Some(edges.len() - 2);
    }
    Some(edges.partition_point(|&e| e <= v) - 1)
}

/// Bin every finite sample of `spec.variable` on the `(x_axis, y_axis)` plane.
pub fn gen_grid(ds: &ProfileDataset, spec: &GridSpec) -> Result<GridResult> {
    let xs = ds.variable(&spec.x_axis)?;
    let ys = ds.variable(&spec.y_axis)?;
    let vals = ds.variable(&spec.variable)?;
    let (nz, np) = vals.dim();

    let depth_ok: Vec<bool> = ds
        .depth
        .iter()
        .map(|&z| spec.max_depth.is_none_or(|m| z <= m))
        .collect();
    let finite = |iz: usize, ip: usize| {
        depth_ok[iz]
            && xs[[iz, ip]].is_finite()
            && ys[[iz, ip]].is_finite()
            && vals[[iz, ip]].is_finite()
    };

    let (x_edges, y_edges) = match &spec.bins {
        Some((xe, ye)) => (xe.clone(), ye.clone()),
        None => {
            let cands = || (0..nz).flat_map(move |iz| (0..np).map(move |ip| (iz, ip)));
            let xe = linspace_edges(
                cands().filter(|&(z, p)| finite(z, p)).map(|(z, p)| xs[[z, p]]),
                DEFAULT_NBINS,
            );
            let ye = linspace_edges(
                cands().filter(|&(z, p)| finite(z, p)).map(|(z, p)| ys[[z, p]]),
                DEFAULT_NBINS,
            );
            match (xe, ye) {
                (Some(xe), Some(ye)) => (xe, ye),
                _ => {
                    return Err(CugnError::InvalidArgument(format!(
                        "no finite ({}, {}, {}) samples to grid",
                        spec.x_axis, spec.y_axis, spec.variable
                    )));
                }
            }
        }
    };
    validate_edges(&spec.x_axis, &x_edges)?;
    validate_edges(&spec.y_axis, &y_edges)?;
    let (nx, ny) = (x_edges.len() - 1, y_edges.len() - 1);

    let mut good = Array2::from_elem((nz, np), false);
    let mut counts = Array2::<usize>::zeros((nx, ny));
    let mut cell_values: Vec<Vec<f64>> = vec![Vec::new(); nx * ny];
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();

    for iz in 0..nz {
        for ip in 0..np {
            if !finite(iz, ip) {
                continue;
            }
            let (Some(r), Some(c)) = (
                bin_index(&x_edges, xs[[iz, ip]]),
                bin_index(&y_edges, ys[[iz, ip]]),
            ) else {
                continue;
            };
            good[[iz, ip]] = true;
            counts[[r, c]] += 1;
            cell_values[r * ny + c].push(vals[[iz, ip]]);
            rows.push(r + 1);
            cols.push(c + 1);
            values.push(vals[[iz, ip]]);
        }
    }

    let stat = Array2::from_shape_fn((nx, ny), |(r, c)| {
        let cell = &cell_values[r * ny + c];
        if cell.is_empty() { f64::NAN } else { spec.stat.apply(cell) }
    });

    let n_good = values.len();
    let mut flat = rows;
    flat.extend(cols);
    let grid_indices = Array2::from_shape_vec((2, n_good), flat)
        .map_err(|e| CugnError::ShapeMismatch(e.to_string()))?;

    Ok(GridResult {
        stat,
        x_edges,
        y_edges,
        counts,
        grid_indices,
        values,
        good,
    })
}

// ---------------------------------------------------------------------------
// Grid table
// ---------------------------------------------------------------------------

/// Grid the profiles of `ds` lying within `max_offset_km` of `line` and
/// flatten the result into a table.
///
/// Only cells holding more than `min_counts` samples are kept. The table
/// gets a `doxy_p` percentile column; the edges carry the full counts.
pub fn build_grid_table(
    line: &Line,
    ds: &ProfileDataset,
    spec: &GridSpec,
    min_counts: usize,
    max_offset_km: f64,
) -> Result<(GridTable, GridEdges)> {
    let (_, offset) = calc_dist_offset(line, &ds.lon, &ds.lat);
    let ok_off: Vec<bool> = offset
        .iter()
        .map(|o| o.is_finite() && o.abs() < max_offset_km)
        .collect();
    let ds = ds.select_profiles(&ok_off)?;

    let grid = gen_grid(&ds, spec)?;

    let mut tbl = GridTable::default();
    for ((iz, ip), &is_good) in grid.good.indexed_iter() {
        if is_good {
            tbl.depth.push(iz);
            tbl.profile.push(ds.profile[ip]);
        }
    }
    tbl.row = grid.grid_indices.row(0).iter().map(|&r| r - 1).collect();
    tbl.col = grid.grid_indices.row(1).iter().map(|&c| c - 1).collect();
    tbl.set_column(&spec.variable, grid.values.clone())?;

    let keep: Vec<bool> = (0..tbl.len())
        .map(|i| grid.counts[[tbl.row[i], tbl.col[i]]] > min_counts)
        .collect();
    let mut tbl = tbl.filter(&keep);

    find_perc(&mut tbl, &spec.variable)?;

    logging::info(
        Stage::Grid,
        Some(line.label),
        &format!(
            "Gridded {} of {} samples from {} profiles (min_counts={})",
            tbl.len(),
            grid.values.len(),
            ds.n_profile(),
            min_counts
        ),
    );

    let edges = GridEdges {
        x_axis: spec.x_axis.clone(),
        y_axis: spec.y_axis.clone(),
        counts: grid.counts.outer_iter().map(|r| r.to_vec()).collect(),
        pdf: grid.pdf().outer_iter().map(|r| r.to_vec()).collect(),
        x_edges: grid.x_edges,
        y_edges: grid.y_edges,
    };
    Ok((tbl, edges))
}

/// Join per-sample dataset values onto the table rows.
///
/// Adds `time`, `lon`, `lat`, `z` (depth in metres) and one column per
/// dataset variable, each taken at the row's (depth level, profile).
pub fn fill_in_grid(table: &mut GridTable, ds: &ProfileDataset) -> Result<()> {
    let lookup = ds.profile_lookup();
    let mut pidx = Vec::with_capacity(table.len());
    for (&iz, &prof) in table.depth.iter().zip(&table.profile) {
        let ip = *lookup.get(&prof).ok_or_else(|| {
            CugnError::JoinIntegrity(format!("profile {} not in dataset", prof))
        })?;
        if iz >= ds.n_depth() {
            return Err(CugnError::ShapeMismatch(format!(
                "depth level {} beyond the dataset's {} levels",
                iz,
                ds.n_depth()
            )));
        }
        pidx.push(ip);
    }

    table.time = pidx.iter().map(|&ip| ds.time[ip]).collect();
    table.set_column(COL_LON, pidx.iter().map(|&ip| ds.lon[ip]).collect())?;
    table.set_column(COL_LAT, pidx.iter().map(|&ip| ds.lat[ip]).collect())?;
    let z = table.depth.iter().map(|&iz| ds.depth[iz]).collect();
    table.set_column(COL_Z, z)?;

    for (name, field) in &ds.variables {
        let col = table
            .depth
            .iter()
            .zip(&pidx)
            .map(|(&iz, &ip)| field[[iz, ip]])
            .collect();
        table.set_column(name, col)?;
    }
    Ok(())
}
