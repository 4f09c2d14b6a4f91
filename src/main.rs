//! cugn: gridding, annual-cycle and extrema pipeline for CUGN glider lines.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cugn_analysis::analysis::annual_cycle::Variable;
use cugn_analysis::analysis::anomaly::{add_anomaly, seasonal_summary};
use cugn_analysis::analysis::derived::add_derived;
use cugn_analysis::analysis::grid::{GridSpec, build_grid_table, fill_in_grid};
use cugn_analysis::config::CugnConfig;
use cugn_analysis::extrema::{ExtremaMode, select_extrema};
use cugn_analysis::ingest::anncyc::{HarmonicSource, JsonHarmonicSource};
use cugn_analysis::ingest::dataset::ProfileDataset;
use cugn_analysis::ingest::{load_grid_table, write_json};
use cugn_analysis::lines::{self, Line};
use cugn_analysis::logging::{self, Stage};
use cugn_analysis::model::{CugnError, GridTable, Result};
use cugn_analysis::verify;

#[derive(Parser)]
#[command(name = "cugn")]
#[command(about = "Grid CUGN glider lines, remove the annual cycle and find oxygen extrema")]
#[command(version)]
struct Cli {
    /// TOML configuration file. Without it, defaults are used and the data
    /// directory comes from the CUGN environment variable.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive SO and N from a raw line dataset, blank off-line excursions
    /// and write the potential dataset.
    Process {
        /// Line label, e.g. 90.0.
        line: String,
    },

    /// Build the control and full grid tables for a line.
    BuildGrid {
        line: String,
    },

    /// Add annual-cycle and anomaly columns to a grid table.
    Annual {
        line: String,

        /// Annual-cycle variable: t, s, fl, oxumolkg or ox.
        variable: String,

        /// Table column the climatology is removed from (e.g. doxy, SO).
        column: String,

        /// Use the full grid table instead of the control one.
        #[arg(long)]
        full: bool,

        /// Print per-season anomaly statistics for the shallow inshore rows.
        #[arg(long)]
        summary: bool,

        /// Output path (JSON). Defaults to ann_<column>_line<NN>.json in the data directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Select oxygen-saturation extrema and cluster them.
    Extrema {
        line: String,

        /// One of high, low, low_noperc, hi_noperc.
        mode: String,

        #[arg(long)]
        full: bool,

        /// Output path (JSON). Defaults to extrema_<mode>_line<NN>.json in the data directory.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check that every line's data files exist and parse.
    Verify,
}

/// Deepest level and furthest distance used by `annual --summary`.
const SUMMARY_MAX_LEVEL: usize = 4;
const SUMMARY_MAX_DIST_KM: f64 = 50.0;

fn load_config(path: Option<&Path>) -> Result<CugnConfig> {
    match path {
        Some(p) => CugnConfig::load(p),
        None => CugnConfig::from_env(),
    }
}

/// Grid table plus dataset, joined.
fn load_filled(cfg: &CugnConfig, line: &Line, full: bool) -> Result<GridTable> {
    let files = cfg.line_files(line);
    let grid_file = if full {
        files.gridtbl_file_full
    } else {
        files.gridtbl_file_control
    };
    logging::info(
        Stage::Io,
        Some(line.label),
        &format!("Loading: {}", grid_file.display()),
    );
    let mut grid_tbl = load_grid_table(&grid_file)?;
    let ds = ProfileDataset::load(&files.datafile)?;
    fill_in_grid(&mut grid_tbl, &ds)?;
    Ok(grid_tbl)
}

fn process(cfg: &CugnConfig, line: &Line) -> Result<()> {
    let files = cfg.line_files(line);
    let mut ds = ProfileDataset::load(&files.rawfile)?;
    add_derived(&mut ds, line, &cfg.solubility_column)?;
    write_json(&files.datafile, &ds)
}

fn build_grid(cfg: &CugnConfig, line: &Line) -> Result<()> {
    let files = cfg.line_files(line);
    let ds = ProfileDataset::load(&files.datafile)?;
    let spec = GridSpec::default();

    let (control, edges) = build_grid_table(line, &ds, &spec, cfg.min_counts, cfg.max_offset_km)?;
    write_json(&files.gridtbl_file_control, &control)?;
    write_json(&files.edges_file, &edges)?;

    let (full, _) = build_grid_table(line, &ds, &spec, 0, cfg.max_offset_km)?;
    write_json(&files.gridtbl_file_full, &full)?;
    Ok(())
}

fn annual(
    cfg: &CugnConfig,
    line: &Line,
    variable: Variable,
    column: &str,
    full: bool,
    summary: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut grid_tbl = load_filled(cfg, line, full)?;
    let harmonic = JsonHarmonicSource::from_config(cfg).load(line)?;
    add_anomaly(&mut grid_tbl, line, column, variable, &harmonic)?;

    if summary {
        for s in seasonal_summary(&grid_tbl, line, column, SUMMARY_MAX_LEVEL, SUMMARY_MAX_DIST_KM)? {
            println!(
                "{:<7} N={:<6} mean={:>8.3} std={:>8.3} skew={:>6.2}",
                s.season.to_string(),
                s.n,
                s.mean.unwrap_or(f64::NAN),
                s.std.unwrap_or(f64::NAN),
                s.skew.unwrap_or(f64::NAN)
            );
        }
    }

    let output = output.unwrap_or_else(|| {
        cfg.data_path
            .join(format!("ann_{}_line{}.json", column, line.file_tag()))
    });
    write_json(&output, &grid_tbl)
}

fn extrema(
    cfg: &CugnConfig,
    line: &Line,
    mode: ExtremaMode,
    full: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut grid_tbl = load_filled(cfg, line, full)?;
    let set = select_extrema(&mut grid_tbl, line, mode, cfg)?;
    let output = output.unwrap_or_else(|| {
        cfg.data_path
            .join(format!("extrema_{}_line{}.json", mode, line.file_tag()))
    });
    write_json(&output, &set)
}

/// A failed command, with enough context for `logging::log_failure`.
struct Failure {
    stage: Stage,
    line: String,
    operation: &'static str,
    err: CugnError,
}

fn run(cli: Cli, cfg: &CugnConfig) -> std::result::Result<(), Failure> {
    match cli.command {
        Commands::Process { line } => {
            let fail = |err| Failure {
                stage: Stage::Grid,
                line: line.clone(),
                operation: "process",
                err,
            };
            let l = lines::line(&line).map_err(fail)?;
            process(cfg, l).map_err(fail)
        }
        Commands::BuildGrid { line } => {
            let fail = |err| Failure {
                stage: Stage::Grid,
                line: line.clone(),
                operation: "build-grid",
                err,
            };
            let l = lines::line(&line).map_err(fail)?;
            build_grid(cfg, l).map_err(fail)
        }
        Commands::Annual {
            line,
            variable,
            column,
            full,
            summary,
            output,
        } => {
            let fail = |err| Failure {
                stage: Stage::AnnualCycle,
                line: line.clone(),
                operation: "annual",
                err,
            };
            let l = lines::line(&line).map_err(fail)?;
            let variable: Variable = variable.parse().map_err(fail)?;
            annual(cfg, l, variable, &column, full, summary, output).map_err(fail)
        }
        Commands::Extrema {
            line,
            mode,
            full,
            output,
        } => {
            let fail = |err| Failure {
                stage: Stage::Extrema,
                line: line.clone(),
                operation: "extrema",
                err,
            };
            let l = lines::line(&line).map_err(fail)?;
            let mode: ExtremaMode = mode.parse().map_err(fail)?;
            extrema(cfg, l, mode, full, output).map_err(fail)
        }
        Commands::Verify => {
            let source = JsonHarmonicSource::from_config(cfg);
            let report = verify::run_verification(cfg, &source);
            verify::print_summary(&report);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("cugn: could not load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let level = match cfg.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("cugn: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(level, cfg.log_file.as_deref(), true);

    match run(cli, &cfg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(f) => {
            logging::log_failure(f.stage, Some(&f.line), f.operation, &f.err);
            ExitCode::FAILURE
        }
    }
}
