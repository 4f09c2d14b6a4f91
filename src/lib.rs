//! Gridding, annual-cycle removal and oxygen-saturation extrema for
//! California Underwater Glider Network (CUGN) transects.

pub mod analysis;
pub mod config;
pub mod extrema;
pub mod geometry;
pub mod ingest;
pub mod lines;
pub mod logging;
pub mod model;
pub mod verify;
