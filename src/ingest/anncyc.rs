//! Loaders for harmonic annual-cycle tables.
//!
//! The evaluator only sees `HarmonicTable`; where the coefficients come
//! from is behind `HarmonicSource`. The JSON layout is
//!
//! ```text
//! { "xcenter": [..],
//!   "variables": { "t": { "constant": [[..]], "sin": [[[..]]], "cos": [[[..]]] }, .. } }
//! ```
//!
//! with `constant[level][bin]` and `sin/cos[level][bin][harmonic]`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::analysis::annual_cycle::{HarmonicFit, HarmonicTable, Variable};
use crate::config::CugnConfig;
use crate::lines::Line;
use crate::logging::{self, Stage};
use crate::model::{CugnError, Result};

/// Anything that can produce the annual-cycle table of a line.
pub trait HarmonicSource {
    fn load(&self, line: &Line) -> Result<HarmonicTable>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicFileFit {
    pub constant: Vec<Vec<f64>>,
    pub sin: Vec<Vec<Vec<f64>>>,
    pub cos: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicFile {
    pub xcenter: Vec<f64>,
    pub variables: BTreeMap<String, HarmonicFileFit>,
}

fn to_array2(name: &str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let nr = rows.len();
    let nc = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != nc) {
        return Err(CugnError::MalformedTable(format!("ragged '{}' array", name)));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nr, nc), flat).map_err(|e| CugnError::MalformedTable(e.to_string()))
}

fn to_array3(name: &str, cube: Vec<Vec<Vec<f64>>>) -> Result<Array3<f64>> {
    let nl = cube.len();
    let nb = cube.first().map_or(0, |b| b.len());
    let nk = cube
        .first()
        .and_then(|b| b.first())
        .map_or(0, |h| h.len());
    for (level, bins) in cube.iter().enumerate() {
        if bins.len() != nb {
            return Err(CugnError::MalformedTable(format!(
                "'{}' level {} has {} bins, expected {}",
                name,
                level,
                bins.len(),
                nb
            )));
        }
        if let Some(bin) = bins.iter().position(|h| h.len() != nk) {
            return Err(CugnError::MalformedTable(format!(
                "'{}' level {} bin {} has {} harmonics, expected {}",
                name,
                level,
                bin,
                bins[bin].len(),
                nk
            )));
        }
    }
    let flat: Vec<f64> = cube.into_iter().flatten().flatten().collect();
    Array3::from_shape_vec((nl, nb, nk), flat).map_err(|e| CugnError::MalformedTable(e.to_string()))
}

impl TryFrom<HarmonicFile> for HarmonicTable {
    type Error = CugnError;

    fn try_from(file: HarmonicFile) -> Result<Self> {
        let mut table = HarmonicTable::new(file.xcenter)?;
        for (key, fit) in file.variables {
            let variable: Variable = key.parse()?;
            let fit = HarmonicFit::new(
                to_array2("constant", fit.constant)?,
                to_array3("sin", fit.sin)?,
                to_array3("cos", fit.cos)?,
            )?;
            table.insert(variable, fit)?;
        }
        Ok(table)
    }
}

/// Reads `anncyc<NN>.json` from the configured data directory.
#[derive(Debug, Clone)]
pub struct JsonHarmonicSource {
    root: PathBuf,
}

impl JsonHarmonicSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(cfg: &CugnConfig) -> Self {
        Self::new(cfg.data_path.clone())
    }

    pub fn path_for(&self, line: &Line) -> PathBuf {
        self.root.join(format!("anncyc{}.json", line.anncyc_tag()))
    }
}

impl HarmonicSource for JsonHarmonicSource {
    fn load(&self, line: &Line) -> Result<HarmonicTable> {
        let path = self.path_for(line);
        let file: HarmonicFile = super::read_json(&path)?;
        let table = HarmonicTable::try_from(file)?;
        logging::info(
            Stage::AnnualCycle,
            Some(line.label),
            &format!(
                "Loaded annual cycle with {} distance bins from {}",
                table.centers().len(),
                path.display()
            ),
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::annual_cycle::evaluate;
    use crate::lines::line;

    fn two_bin_file() -> HarmonicFile {
        let mut variables = BTreeMap::new();
        variables.insert(
            "t".to_string(),
            HarmonicFileFit {
                constant: vec![vec![10.0, 20.0]],
                sin: vec![vec![vec![1.0], vec![2.0]]],
                cos: vec![vec![vec![0.0], vec![0.0]]],
            },
        );
        HarmonicFile {
            xcenter: vec![0.0, 100.0],
            variables,
        }
    }

    #[test]
    fn test_file_converts_to_table() {
        let table = HarmonicTable::try_from(two_bin_file()).unwrap();
        assert_eq!(table.centers(), &[0.0, 100.0]);
        let v = evaluate(&table, Variable::Temperature, 0, &[0.0], &[50.0]).unwrap();
        assert!((v[0] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_harmonic_order_is_malformed() {
        let mut file = two_bin_file();
        file.variables.get_mut("t").unwrap().sin[0][1] = vec![2.0, 0.5];
        let err = HarmonicTable::try_from(file).unwrap_err();
        assert!(matches!(err, CugnError::MalformedTable(_)), "got {:?}", err);
    }

    #[test]
    fn test_unknown_variable_key_is_invalid_argument() {
        let mut file = two_bin_file();
        let fit = file.variables.remove("t").unwrap();
        file.variables.insert("pressure".to_string(), fit);
        assert!(matches!(
            HarmonicTable::try_from(file),
            Err(CugnError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_json_source_reads_line_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonHarmonicSource::new(dir.path());
        let l = line("66.7").unwrap();
        assert!(source.path_for(l).ends_with("anncyc66.json"));
        super::super::write_json(&source.path_for(l), &two_bin_file()).unwrap();
        let table = source.load(l).unwrap();
        assert_eq!(table.variables().collect::<Vec<_>>(), vec![Variable::Temperature]);
    }
}
