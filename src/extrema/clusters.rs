//! Grouping of extrema into events.
//!
//! Extrema are clustered with DBSCAN in a scaled (distance, time, depth)
//! space: distance in km, elapsed days times `time_scale`, and depth in
//! metres divided by `z_scale`. With the default scales a 3 km radius links
//! samples a day apart or two depth levels apart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::annual_cycle::SECONDS_PER_DAY;
use crate::analysis::stats;
use crate::config::ClusterParams;
use crate::model::{COL_LAT, COL_LON, COL_SO, COL_Z, CugnError, GridTable, Result};

/// Label given to points that belong to no cluster.
pub const NOISE: i64 = -1;

/// Column holding the distance along the line in km.
pub const COL_DIST: &str = "dist";

fn dist2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Density-based clustering.
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within `eps`. Clusters grow from core points and are
/// numbered from 0 in order of discovery; everything unreachable is
/// `NOISE`. Points with a NaN coordinate are never neighbours.
pub fn dbscan(points: &[[f64; 3]], eps: f64, min_samples: usize) -> Vec<i64> {
    let eps2 = eps * eps;
    let neighbours = |i: usize| -> Vec<usize> {
        (0..points.len())
            .filter(|&j| j == i || dist2(&points[i], &points[j]) <= eps2)
            .collect()
    };

    let mut labels: Vec<Option<i64>> = vec![None; points.len()];
    let mut next = 0;
    for i in 0..points.len() {
        if labels[i].is_some() {
            continue;
        }
        let seeds = neighbours(i);
        if seeds.len() < min_samples {
            labels[i] = Some(NOISE);
            continue;
        }

        labels[i] = Some(next);
        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            match labels[j] {
                Some(NOISE) => labels[j] = Some(next),
                Some(_) => continue,
                None => {
                    labels[j] = Some(next);
                    let more = neighbours(j);
                    if more.len() >= min_samples {
                        queue.extend(
                            more.into_iter()
                                .filter(|&k| matches!(labels[k], None | Some(NOISE))),
                        );
                    }
                }
            }
        }
        next += 1;
    }
    labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect()
}

fn elapsed_days(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 / SECONDS_PER_DAY
}

/// Cluster the rows of a filled extrema table.
///
/// Needs `time`, `dist` and `z` on every row.
pub fn generate_clusters(table: &GridTable, params: &ClusterParams) -> Result<Vec<i64>> {
    if !(params.eps > 0.0 && params.time_scale > 0.0 && params.z_scale > 0.0) {
        return Err(CugnError::InvalidArgument(format!(
            "cluster scales must be positive: {:?}",
            params
        )));
    }
    let times = table.times()?;
    let dist = table.column(COL_DIST)?;
    let z = table.column(COL_Z)?;

    let points: Vec<[f64; 3]> = (0..table.len())
        .map(|i| {
            [
                dist[i],
                elapsed_days(&times[i]) * params.time_scale,
                z[i] / params.z_scale,
            ]
        })
        .collect();
    Ok(dbscan(&points, params.eps, params.min_samples.max(1)))
}

/// Summary of one cluster of extrema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub label: i64,
    pub size: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_days: f64,
    pub mean_dist: Option<f64>,
    pub max_z: Option<f64>,
    pub mean_lon: Option<f64>,
    pub mean_lat: Option<f64>,
    /// Peak saturation, when the table carries `SO`.
    pub max_so: Option<f64>,
}

fn nanmax(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.filter(|v| v.is_finite()).reduce(f64::max)
}

/// Per-cluster statistics, ordered by label. Noise is skipped.
pub fn cluster_stats(table: &GridTable, labels: &[i64]) -> Result<Vec<ClusterStats>> {
    if labels.len() != table.len() {
        return Err(CugnError::ShapeMismatch(format!(
            "{} cluster labels for {} rows",
            labels.len(),
            table.len()
        )));
    }
    let times = table.times()?;
    let dist = table.column(COL_DIST)?;
    let z = table.column(COL_Z)?;
    let lon = table.column(COL_LON)?;
    let lat = table.column(COL_LAT)?;
    let so = table.column(COL_SO).ok();

    let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        if label != NOISE {
            members.entry(label).or_default().push(i);
        }
    }

    let mut out = Vec::with_capacity(members.len());
    for (label, rows) in members {
        let pick = |col: &[f64]| rows.iter().map(|&i| col[i]).collect::<Vec<f64>>();
        let (Some(start), Some(end)) = (
            rows.iter().map(|&i| times[i]).min(),
            rows.iter().map(|&i| times[i]).max(),
        ) else {
            continue;
        };
        out.push(ClusterStats {
            label,
            size: rows.len(),
            start,
            end,
            duration_days: (end - start).num_seconds() as f64 / SECONDS_PER_DAY,
            mean_dist: stats::mean(&pick(dist)),
            max_z: nanmax(rows.iter().map(|&i| z[i])),
            mean_lon: stats::mean(&pick(lon)),
            mean_lat: stats::mean(&pick(lat)),
            max_so: so.and_then(|so| nanmax(rows.iter().map(|&i| so[i]))),
        });
    }
    Ok(out)
}
