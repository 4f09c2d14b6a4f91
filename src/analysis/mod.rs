/// Numerical core of the CUGN pipeline.
///
/// Submodules:
/// - `grid`: 2-D histogramming of samples and the flat grid table.
/// - `percentile`: cell-local percentile ranks.
/// - `annual_cycle`: harmonic climatology evaluation.
/// - `anomaly`: annual-cycle removal and seasonal summaries.
/// - `derived`: oxygen saturation, buoyancy frequency, excursion masks.
/// - `stats`: NaN-aware summary statistics.

pub mod annual_cycle;
pub mod anomaly;
pub mod derived;
pub mod grid;
pub mod percentile;
pub mod stats;
