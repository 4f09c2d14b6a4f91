/// Integration tests for the grid -> extrema pipeline
///
/// These tests verify:
/// 1. A dataset grids into a flat table with cell-local `doxy_p`
/// 2. Profiles far off the line are cut before gridding
/// 3. The table survives a JSON round trip and fills from the dataset
/// 4. High extrema are selected, joined to feature percentiles and clustered
/// 5. A duplicated (depth, profile) row aborts the join
/// 6. A raw dataset without SO/N processes, grids and yields extrema
///
/// Run with: cargo test --test extrema_pipeline

use cugn_analysis::analysis::derived::add_derived;
use cugn_analysis::analysis::grid::{GridSpec, build_grid_table, fill_in_grid};
use cugn_analysis::config::CugnConfig;
use cugn_analysis::extrema::{ExtremaMode, select_extrema};
use cugn_analysis::extrema::clusters::NOISE;
use cugn_analysis::ingest::dataset::ProfileDataset;
use cugn_analysis::ingest::{load_grid_table, write_json};
use cugn_analysis::lines::line;
use cugn_analysis::model::{COL_CHLA, COL_DOXY, COL_N, COL_OC, COL_SO, CugnError, GridTable};

use approx::assert_abs_diff_eq;
use chrono::{Duration, TimeZone, Utc};
use ndarray::Array2;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const N_ON_LINE: usize = 8;

/// Three levels by nine profiles near the inshore end of line 90, as
/// delivered: oxygen, solubility and density but no SO or N. The first
/// eight sit on the line; the last is well off it and carries the highest
/// oxygen of all.
fn line90_raw() -> ProfileDataset {
    let l = line("90.0").unwrap();
    let np = N_ON_LINE + 1;
    let t0 = Utc.with_ymd_and_hms(2020, 8, 25, 0, 0, 0).unwrap();

    let doxy = Array2::from_shape_fn((3, np), |(iz, ip)| {
        if ip == N_ON_LINE {
            500.0
        } else {
            200.0 + 4.0 * (iz * N_ON_LINE + ip) as f64
        }
    });
    let oc = Array2::from_elem((3, np), 250.0);
    let sigma0 = Array2::from_shape_fn((3, np), |(iz, _)| 24.5 + 0.5 * iz as f64);

    let mut variables = BTreeMap::new();
    variables.insert(COL_OC.to_string(), oc);
    variables.insert(
        COL_CHLA.to_string(),
        Array2::from_shape_fn((3, np), |(iz, ip)| 0.1 * ip as f64 + iz as f64),
    );
    variables.insert("SA".to_string(), Array2::from_elem((3, np), 33.5));
    variables.insert("sigma0".to_string(), sigma0);
    variables.insert(COL_DOXY.to_string(), doxy);

    let mut lon = vec![l.inshore.0 - 0.1; np];
    let mut lat = vec![l.inshore.1 - 0.05; np];
    lon[N_ON_LINE] = -117.0;
    lat[N_ON_LINE] = 35.0;

    ProfileDataset {
        depth: vec![10.0, 20.0, 30.0],
        profile: (0..np as i64).map(|p| 1000 + p).collect(),
        time: (0..np as i64).map(|i| t0 + Duration::hours(3 * i)).collect(),
        lon,
        lat,
        mission: vec![61; np],
        variables,
    }
}

/// `line90_raw` with SO and N derived.
fn line90_dataset() -> ProfileDataset {
    let mut ds = line90_raw();
    add_derived(&mut ds, line("90.0").unwrap(), COL_OC).unwrap();
    ds
}

/// One (SA, sigma0) cell holding every sample.
fn single_cell_spec() -> GridSpec {
    GridSpec {
        bins: Some((vec![33.0, 34.0], vec![24.0, 26.0])),
        ..GridSpec::default()
    }
}

fn filled_table() -> GridTable {
    let l = line("90.0").unwrap();
    let ds = line90_dataset();
    let (mut tbl, _) = build_grid_table(l, &ds, &single_cell_spec(), 0, 90.0).unwrap();
    fill_in_grid(&mut tbl, &ds).unwrap();
    tbl
}

// ---------------------------------------------------------------------------
// Gridding
// ---------------------------------------------------------------------------

#[test]
fn test_grid_table_drops_off_line_profile() {
    let l = line("90.0").unwrap();
    let (tbl, edges) = build_grid_table(l, &line90_dataset(), &single_cell_spec(), 0, 90.0).unwrap();

    assert_eq!(tbl.len(), 3 * N_ON_LINE, "off-line profile must be cut");
    assert!(!tbl.profile.contains(&(1000 + N_ON_LINE as i64)));
    assert_eq!(edges.counts, vec![vec![3 * N_ON_LINE]]);

    let p = tbl.column("doxy_p").unwrap();
    let top = p.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(top, 100.0);
    assert!(p.iter().all(|&x| x > 0.0 && x <= 100.0));
}

#[test]
fn test_min_counts_is_strict() {
    let l = line("90.0").unwrap();
    let (tbl, _) =
        build_grid_table(l, &line90_dataset(), &single_cell_spec(), 3 * N_ON_LINE, 90.0).unwrap();
    assert!(tbl.is_empty(), "a cell needs more than min_counts samples");
}

#[test]
fn test_table_round_trips_and_fills() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doxy_grid_line90.json");
    let l = line("90.0").unwrap();
    let ds = line90_dataset();
    let (tbl, _) = build_grid_table(l, &ds, &single_cell_spec(), 0, 90.0).unwrap();
    write_json(&path, &tbl).unwrap();

    let mut back = load_grid_table(&path).unwrap();
    assert_eq!(back.depth, tbl.depth);
    assert_eq!(back.profile, tbl.profile);
    assert_eq!((back.row.clone(), back.col.clone()), (tbl.row.clone(), tbl.col.clone()));
    for (a, b) in back.column("doxy_p").unwrap().iter().zip(tbl.column("doxy_p").unwrap()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
    fill_in_grid(&mut back, &ds).unwrap();
    assert_eq!(back.times().unwrap().len(), back.len());
    assert_eq!(back.column("z").unwrap()[0], 10.0);
    assert_abs_diff_eq!(back.column(COL_SO).unwrap()[0], 0.8, epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Extrema
// ---------------------------------------------------------------------------

#[test]
fn test_high_extrema_end_to_end() {
    let l = line("90.0").unwrap();
    let mut tbl = filled_table();
    let cfg = CugnConfig::default();
    let set = select_extrema(&mut tbl, l, ExtremaMode::High, &cfg).unwrap();

    // 24 distinct values in one cell: ranks 20..=24 clear the 80th
    // percentile, and all of those have doxy >= 276, i.e. SO > 1.1.
    assert_eq!(set.table.len(), 5);
    assert!(set.table.depth.iter().all(|&d| d == 2));
    assert_eq!(set.table.profile, vec![1003, 1004, 1005, 1006, 1007]);

    for name in ["N_p", "chla_p", "year", "doy", "dist", "offset", "cluster"] {
        assert!(set.table.has_column(name), "missing {}", name);
    }
    let n_p = set.table.column("N_p").unwrap();
    assert!(n_p.iter().all(|&p| p == n_p[0]), "uniform N ties across the cell");

    assert!(set.labels.iter().all(|&c| c == 0), "one event, 3 h apart");
    assert_eq!(set.clusters.len(), 1);
    let c = &set.clusters[0];
    assert_eq!(c.size, 5);
    assert_eq!(c.max_z, Some(30.0));
    assert_abs_diff_eq!(c.max_so.unwrap(), 292.0 / 250.0, epsilon = 1e-12);
    assert_abs_diff_eq!(c.duration_days, 0.5, epsilon = 1e-12);
}

#[test]
fn test_low_noperc_keeps_shallow_undersaturated_rows() {
    let mut tbl = filled_table();
    let set = select_extrema(
        &mut tbl,
        line("90.0").unwrap(),
        ExtremaMode::LowNoPerc,
        &CugnConfig::default(),
    )
    .unwrap();
    // SO < 0.9 means doxy < 225: k = 0..=6 on level 0 only.
    assert_eq!(set.table.len(), 7);
    assert!(set.table.depth.iter().all(|&d| d == 0));
    assert!(set.labels.iter().all(|&c| c != NOISE));
}

#[test]
fn test_duplicated_row_is_integrity_error() {
    let mut tbl = filled_table();
    let mut rows: Vec<usize> = (0..tbl.len()).collect();
    rows.push(tbl.len() - 1);
    let mut dup = tbl.take(&rows);

    let err = select_extrema(
        &mut dup,
        line("90.0").unwrap(),
        ExtremaMode::HiNoPerc,
        &CugnConfig::default(),
    )
    .unwrap_err();
    assert!(
        matches!(err, CugnError::JoinIntegrity(_)),
        "duplicate keys must abort, got {:?}",
        err
    );

    // The untouched table still joins cleanly.
    assert!(select_extrema(
        &mut tbl,
        line("90.0").unwrap(),
        ExtremaMode::HiNoPerc,
        &CugnConfig::default()
    )
    .is_ok());
}

#[test]
fn test_raw_dataset_processes_into_extrema() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CugnConfig {
        data_path: dir.path().to_path_buf(),
        ..CugnConfig::default()
    };
    let l = line("90.0").unwrap();
    let files = cfg.line_files(l);

    let raw = line90_raw();
    assert!(!raw.variables.contains_key(COL_SO) && !raw.variables.contains_key(COL_N));
    write_json(&files.rawfile, &raw).unwrap();

    let mut ds = ProfileDataset::load(&files.rawfile).unwrap();
    assert_eq!(add_derived(&mut ds, l, &cfg.solubility_column).unwrap(), 0);
    write_json(&files.datafile, &ds).unwrap();

    let ds = ProfileDataset::load(&files.datafile).unwrap();
    let (grid_tbl, _) = build_grid_table(l, &ds, &single_cell_spec(), 0, cfg.max_offset_km).unwrap();
    write_json(&files.gridtbl_file_control, &grid_tbl).unwrap();

    let mut tbl = load_grid_table(&files.gridtbl_file_control).unwrap();
    fill_in_grid(&mut tbl, &ds).unwrap();
    let set = select_extrema(&mut tbl, l, ExtremaMode::High, &cfg)
        .expect("SO and N come from processing, not the input file");
    assert_eq!(set.table.profile, vec![1003, 1004, 1005, 1006, 1007]);
    assert_eq!(set.clusters.len(), 1);
}

#[test]
fn test_unknown_mode_is_invalid_argument() {
    assert!(matches!(
        "medium".parse::<ExtremaMode>(),
        Err(CugnError::InvalidArgument(_))
    ));
}
