//! Cell-local percentile ranks.
//!
//! A sample's percentile is its rank among the samples sharing its grid
//! cell, scaled to (0, 100]. Tied values share the average of the ranks
//! they span, so identical inputs always receive identical percentiles.
//! NaN samples are left out of the ranking and receive NaN.

use std::collections::HashMap;

use crate::model::{GridTable, PERCENTILE_SUFFIX, Result};

/// Percentiles `100 * average_rank / n` for one cell's values, where `n`
/// counts the non-NaN values and ranks are 1-based.
pub fn cell_percentiles(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| !values[i].is_nan())
        .collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let n = order.len() as f64;
    let mut out = vec![f64::NAN; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Ranks start+1 ..= end share their mean.
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = 100.0 * avg_rank / n;
        }
        start = end;
    }
    out
}

/// Adds `<column>_p` to `table`: the percentile of each row's `column`
/// value among the rows in the same (row, col) grid cell.
pub fn find_perc(table: &mut GridTable, column: &str) -> Result<()> {
    let values = table.column(column)?;

    let mut cells: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for i in 0..table.len() {
        cells.entry((table.row[i], table.col[i])).or_default().push(i);
    }

    let mut perc = vec![f64::NAN; table.len()];
    for members in cells.values() {
        let cell_vals: Vec<f64> = members.iter().map(|&i| values[i]).collect();
        for (&i, p) in members.iter().zip(cell_percentiles(&cell_vals)) {
            perc[i] = p;
        }
    }

    table.set_column(&format!("{}{}", column, PERCENTILE_SUFFIX), perc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{COL_DOXY, CugnError};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_distinct_values_rank_strictly_increasing() {
        let p = cell_percentiles(&[10.0, 20.0, 30.0]);
        assert_abs_diff_eq!(p[0], 100.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 200.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 100.0, epsilon = 1e-12);
        assert!(p.iter().all(|&x| x > 0.0 && x <= 100.0));
    }

    #[test]
    fn test_ranking_ignores_input_order() {
        let p = cell_percentiles(&[30.0, 10.0, 20.0]);
        assert!(p[1] < p[2] && p[2] < p[0]);
        assert_eq!(p[0], 100.0);
    }

    #[test]
    fn test_ties_share_average_rank() {
        // Ranks 2 and 3 are tied -> both get 2.5 / 4.
        let p = cell_percentiles(&[1.0, 5.0, 5.0, 9.0]);
        assert_eq!(p[1], p[2], "tied values must get identical percentiles");
        assert_abs_diff_eq!(p[1], 62.5, epsilon = 1e-12);
        assert_abs_diff_eq!(p[0], 25.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[3], 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_tied_cell_is_midpoint() {
        let p = cell_percentiles(&[7.0; 4]);
        assert!(p.iter().all(|&x| x == 62.5), "got {:?}", p);
    }

    #[test]
    fn test_nan_is_excluded_from_ranking() {
        let p = cell_percentiles(&[2.0, f64::NAN, 1.0]);
        assert!(p[1].is_nan());
        assert_eq!(p[0], 100.0);
        assert_eq!(p[2], 50.0);
    }

    #[test]
    fn test_find_perc_ranks_within_each_cell_only() {
        let mut tbl = GridTable {
            depth: vec![0; 5],
            profile: vec![1, 2, 3, 4, 5],
            row: vec![0, 0, 0, 1, 1],
            col: vec![0, 0, 0, 0, 0],
            ..Default::default()
        };
        tbl.set_column(COL_DOXY, vec![10.0, 30.0, 20.0, 500.0, 1.0])
            .unwrap();
        find_perc(&mut tbl, COL_DOXY).unwrap();

        let p = tbl.column("doxy_p").unwrap();
        assert_abs_diff_eq!(p[0], 100.0 / 3.0, epsilon = 1e-12);
        assert_eq!(p[1], 100.0);
        assert_eq!(p[3], 100.0, "500 is the top of its own two-sample cell");
        assert_eq!(p[4], 50.0);
    }

    #[test]
    fn test_find_perc_requires_column() {
        let mut tbl = GridTable::default();
        assert!(matches!(
            find_perc(&mut tbl, "chla"),
            Err(CugnError::MissingColumn(_))
        ));
    }
}
