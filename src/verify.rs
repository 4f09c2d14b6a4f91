//! Data File Verification Module
//!
//! Checks, for every registered line, that the dataset, grid tables, grid
//! edges and annual-cycle table named by the configuration exist and parse.
//!
//! Run this before an analysis session to see which lines are usable.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analysis::grid::GridEdges;
use crate::config::CugnConfig;
use crate::ingest::anncyc::HarmonicSource;
use crate::ingest::dataset::ProfileDataset;
use crate::ingest::{load_grid_table, read_json};
use crate::lines::{LINE_REGISTRY, Line};
use crate::logging::{self, Stage};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub line_results: Vec<LineVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub lines_total: usize,
    pub lines_ready: usize,
    pub lines_partial: usize,
    pub lines_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineVerification {
    pub line: String,
    pub name: String,
    pub status: VerificationStatus,
    pub dataset_ok: bool,
    pub profile_count: usize,
    pub control_grid_ok: bool,
    pub control_grid_rows: usize,
    pub full_grid_ok: bool,
    pub edges_ok: bool,
    pub annual_cycle_ok: bool,
    pub annual_cycle_variables: Vec<String>,
    /// One message per file that is missing or unreadable.
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    /// Every file is present and parses.
    Success,
    /// The dataset loads but some derived product is missing.
    PartialSuccess,
    /// The dataset itself is unusable.
    Failed,
}

// ============================================================================
// Per-line checks
// ============================================================================

pub fn verify_line(cfg: &CugnConfig, line: &Line, source: &dyn HarmonicSource) -> LineVerification {
    let files = cfg.line_files(line);
    let mut result = LineVerification {
        line: line.label.to_string(),
        name: line.name.to_string(),
        status: VerificationStatus::Failed,
        dataset_ok: false,
        profile_count: 0,
        control_grid_ok: false,
        control_grid_rows: 0,
        full_grid_ok: false,
        edges_ok: false,
        annual_cycle_ok: false,
        annual_cycle_variables: Vec::new(),
        problems: Vec::new(),
    };

    match ProfileDataset::load(&files.datafile) {
        Ok(ds) => {
            result.dataset_ok = true;
            result.profile_count = ds.n_profile();
        }
        Err(e) => result
            .problems
            .push(format!("{}: {}", files.datafile.display(), e)),
    }

    match load_grid_table(&files.gridtbl_file_control) {
        Ok(tbl) => {
            result.control_grid_ok = true;
            result.control_grid_rows = tbl.len();
        }
        Err(e) => result
            .problems
            .push(format!("{}: {}", files.gridtbl_file_control.display(), e)),
    }

    match load_grid_table(&files.gridtbl_file_full) {
        Ok(_) => result.full_grid_ok = true,
        Err(e) => result
            .problems
            .push(format!("{}: {}", files.gridtbl_file_full.display(), e)),
    }

    match read_json::<GridEdges>(&files.edges_file) {
        Ok(_) => result.edges_ok = true,
        Err(e) => result
            .problems
            .push(format!("{}: {}", files.edges_file.display(), e)),
    }

    match source.load(line) {
        Ok(table) => {
            result.annual_cycle_ok = true;
            result.annual_cycle_variables = table.variables().map(|v| v.to_string()).collect();
        }
        Err(e) => result.problems.push(format!("annual cycle: {}", e)),
    }

    result.status = if !result.dataset_ok {
        VerificationStatus::Failed
    } else if result.problems.is_empty() {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };
    result
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(cfg: &CugnConfig, source: &dyn HarmonicSource) -> VerificationReport {
    let mut report = VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        line_results: Vec::new(),
        summary: VerificationSummary {
            lines_total: LINE_REGISTRY.len(),
            ..Default::default()
        },
    };

    println!("Verifying CUGN line files in {} ...", cfg.data_path.display());
    for line in LINE_REGISTRY {
        print!("  {} ... ", line.label);
        let result = verify_line(cfg, line, source);

        match result.status {
            VerificationStatus::Success => {
                println!(
                    "✓ OK ({} profiles, {} grid rows)",
                    result.profile_count, result.control_grid_rows
                );
                report.summary.lines_ready += 1;
            }
            VerificationStatus::PartialSuccess => {
                println!("⚠ Partial ({} problems)", result.problems.len());
                report.summary.lines_partial += 1;
            }
            VerificationStatus::Failed => {
                println!(
                    "✗ FAILED: {}",
                    result.problems.first().map(String::as_str).unwrap_or("Unknown")
                );
                report.summary.lines_failed += 1;
            }
        }
        for problem in &result.problems {
            logging::warn(Stage::Io, Some(line.label), problem);
        }

        report.line_results.push(result);
    }

    logging::log_run_summary(
        Stage::Io,
        report.summary.lines_total,
        report.summary.lines_ready,
        report.summary.lines_failed,
    );
    report
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Lines ready:      {}/{}",
        report.summary.lines_ready, report.summary.lines_total
    );
    println!("Lines partial:    {}", report.summary.lines_partial);
    println!("Lines failed:     {}", report.summary.lines_failed);
    println!();

    for result in &report.line_results {
        if result.status == VerificationStatus::Success {
            continue;
        }
        println!("{} ({}):", result.line, result.name);
        for problem in &result.problems {
            println!("  - {}", problem);
        }
    }
    println!("═══════════════════════════════════════════════════════════");
}
