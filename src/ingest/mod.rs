/// Data ingestion for the CUGN pipeline.
///
/// NetCDF, Parquet and MATLAB readers are outside this crate; their
/// in-memory structures are exchanged as JSON documents instead.
///
/// Submodules:
/// - `dataset`: the (depth x profile) glider dataset.
/// - `anncyc`: loaders for harmonic annual-cycle tables.
/// - `nan_null`: NaN-as-null serde adapters for stored arrays.

pub mod anncyc;
pub mod dataset;
pub mod nan_null;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::logging::{self, Stage};
use crate::model::{GridTable, Result};

/// Deserialize a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    logging::debug(Stage::Io, None, &format!("Loaded: {}", path.display()));
    Ok(value)
}

/// Serialize `value` as JSON to `path`, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    logging::info(Stage::Io, None, &format!("Wrote: {}", path.display()));
    Ok(())
}

/// Load a grid table and check that its fixed fields and columns align.
pub fn load_grid_table(path: &Path) -> Result<GridTable> {
    let tbl: GridTable = read_json(path)?;
    let n = tbl.len();
    let aligned = tbl.profile.len() == n
        && tbl.row.len() == n
        && tbl.col.len() == n
        && (tbl.time.is_empty() || tbl.time.len() == n)
        && tbl.columns.values().all(|c| c.len() == n);
    if !aligned {
        return Err(crate::model::CugnError::ShapeMismatch(format!(
            "grid table {} has misaligned columns",
            path.display()
        )));
    }
    Ok(tbl)
}
